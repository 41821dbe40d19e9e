use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::PrimaryKey;

/// What kind of programming a time slot is reserved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotKind {
    /// A presenter or dj is expected in the studio.
    Live,
    /// The playout system fills the slot on its own.
    Automation,
    /// The slot is reserved for technical work, nobody broadcasts.
    Maintenance,
}

impl SlotKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "live" => Some(Self::Live),
            "automation" => Some(Self::Automation),
            "maintenance" => Some(Self::Maintenance),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Automation => "automation",
            Self::Maintenance => "maintenance",
        }
    }
}

/// A calendar window granting a specific user broadcast rights.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSlot {
    pub id: PrimaryKey,
    pub name: String,
    /// The user this slot belongs to
    pub assigned_user: PrimaryKey,
    /// An optional stand-in, shown in the schedule but not gating anything
    pub backup_user: Option<PrimaryKey>,
    pub weekday: Weekday,
    pub starts_at: NaiveTime,
    pub ends_at: NaiveTime,
    pub recurring: bool,
    pub kind: SlotKind,
    pub active: bool,
}

impl TimeSlot {
    /// Whether this slot authorizes the user to go live at the given moment.
    /// Both edges of the window are inclusive.
    pub fn authorizes(&self, user_id: PrimaryKey, weekday: Weekday, time: NaiveTime) -> bool {
        self.active
            && self.kind == SlotKind::Live
            && self.assigned_user == user_id
            && self.weekday == weekday
            && self.starts_at <= time
            && time <= self.ends_at
    }
}

/// Converts a weekday to the station's 0 = Sunday index, as stored.
pub fn weekday_index(weekday: Weekday) -> i16 {
    weekday.num_days_from_sunday() as i16
}

/// The inverse of [weekday_index].
pub fn weekday_from_index(index: i16) -> Option<Weekday> {
    use Weekday::*;

    [Sun, Mon, Tue, Wed, Thu, Fri, Sat]
        .get(usize::try_from(index).ok()?)
        .copied()
}
