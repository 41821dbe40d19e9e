use std::sync::Arc;

use chrono::{DateTime, Datelike, Local};
use log::warn;

use onair_core::{PrimaryKey, TimeSlot};

use crate::Database;

/// Decides whether the wall clock authorizes a user to broadcast.
pub struct ScheduleGate<Db> {
    db: Arc<Db>,
}

impl<Db> ScheduleGate<Db>
where
    Db: Database,
{
    pub fn new(db: &Arc<Db>) -> Self {
        Self { db: db.clone() }
    }

    /// The slot authorizing the user to broadcast right now, if any.
    /// A failed read gates to "not authorized".
    pub async fn current_slot(&self, user_id: PrimaryKey) -> Option<TimeSlot> {
        self.slot_at(user_id, Local::now()).await
    }

    /// Like [Self::current_slot], at an explicit moment. When several
    /// slots overlap, the one starting earliest wins, ties broken by
    /// lowest id.
    pub async fn slot_at(&self, user_id: PrimaryKey, at: DateTime<Local>) -> Option<TimeSlot> {
        let weekday = at.weekday();
        let time = at.time();

        let slots = match self.db.slots_for_day(weekday).await {
            Ok(slots) => slots,
            Err(e) => {
                warn!("Failed to read the schedule, gating closed: {e}");
                return None;
            }
        };

        slots
            .into_iter()
            .filter(|slot| slot.authorizes(user_id, weekday, time))
            .min_by_key(|slot| (slot.starts_at, slot.id))
    }

    /// Every slot scheduled for today, for the console's schedule view.
    pub async fn today(&self) -> Vec<TimeSlot> {
        let now = Local::now();

        match self.db.slots_for_day(now.weekday()).await {
            Ok(slots) => slots,
            Err(e) => {
                warn!("Failed to read the schedule: {e}");
                vec![]
            }
        }
    }

    /// Every slot assigned to the user, as owner or backup.
    pub async fn slots_for_user(&self, user_id: PrimaryKey) -> Vec<TimeSlot> {
        match self.db.slots_for_user(user_id).await {
            Ok(slots) => slots,
            Err(e) => {
                warn!("Failed to read the schedule: {e}");
                vec![]
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db::memory::MemoryDatabase;

    use chrono::{NaiveTime, TimeZone, Weekday};
    use onair_core::SlotKind;

    fn slot(id: PrimaryKey, user: PrimaryKey, start: (u32, u32), end: (u32, u32)) -> TimeSlot {
        TimeSlot {
            id,
            name: format!("Slot {id}"),
            assigned_user: user,
            backup_user: None,
            // 2026-08-04 is a tuesday
            weekday: Weekday::Tue,
            starts_at: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            ends_at: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
            recurring: true,
            kind: SlotKind::Live,
            active: true,
        }
    }

    fn tuesday_at(hour: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 8, 4, hour, 30, 0).unwrap()
    }

    #[tokio::test]
    async fn test_matching_slot_authorizes() {
        let db = Arc::new(MemoryDatabase::new());
        let gate = ScheduleGate::new(&db);

        db.add_slot(slot(1, 7, (6, 0), (9, 0)));

        let found = gate.slot_at(7, tuesday_at(7)).await;
        assert_eq!(found.map(|s| s.id), Some(1));

        assert_eq!(gate.slot_at(7, tuesday_at(10)).await, None, "outside hours");
        assert_eq!(gate.slot_at(8, tuesday_at(7)).await, None, "someone else");
    }

    #[tokio::test]
    async fn test_overlapping_slots_resolve_to_the_earliest_start() {
        let db = Arc::new(MemoryDatabase::new());
        let gate = ScheduleGate::new(&db);

        db.add_slot(slot(1, 7, (7, 0), (10, 0)));
        db.add_slot(slot(2, 7, (6, 0), (9, 0)));

        let found = gate.slot_at(7, tuesday_at(8)).await;
        assert_eq!(found.map(|s| s.id), Some(2));
    }

    #[tokio::test]
    async fn test_gate_fails_closed_on_read_errors() {
        let db = Arc::new(MemoryDatabase::new());
        let gate = ScheduleGate::new(&db);

        db.add_slot(slot(1, 7, (0, 0), (23, 59)));
        db.set_failing(true);

        assert_eq!(gate.slot_at(7, tuesday_at(7)).await, None);
    }
}
