use serde::{Deserialize, Serialize};

/// A role assigned to a station user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Dj,
    Presenter,
    Listener,
}

impl Role {
    /// Parses a stored role name. Unknown names resolve to nothing
    /// so a bad row never grants anything.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "admin" => Some(Self::Admin),
            "dj" => Some(Self::Dj),
            "presenter" => Some(Self::Presenter),
            "listener" => Some(Self::Listener),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Dj => "dj",
            Self::Presenter => "presenter",
            Self::Listener => "listener",
        }
    }

    /// The capabilities this role grants on its own.
    fn capabilities(&self) -> Capabilities {
        match self {
            Self::Admin => Capabilities::all(),
            Self::Dj => Capabilities {
                can_go_live: true,
                can_control_microphone: true,
                can_control_music: true,
                can_trigger_jingles: true,
                can_switch_modes: true,
                can_manage_audio: true,
                ..Capabilities::none()
            },
            Self::Presenter => Capabilities {
                can_go_live: true,
                can_control_microphone: true,
                can_trigger_jingles: true,
                ..Capabilities::none()
            },
            Self::Listener => Capabilities::none(),
        }
    }
}

/// What a user's roles allow them to do in the broadcast console.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub can_go_live: bool,
    pub can_control_microphone: bool,
    pub can_control_music: bool,
    pub can_trigger_jingles: bool,
    pub can_switch_modes: bool,
    pub can_emergency_override: bool,
    pub can_manage_audio: bool,
    pub can_view_analytics: bool,
}

impl Capabilities {
    /// The empty capability set. Failed resolution falls back to this.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self {
            can_go_live: true,
            can_control_microphone: true,
            can_control_music: true,
            can_trigger_jingles: true,
            can_switch_modes: true,
            can_emergency_override: true,
            can_manage_audio: true,
            can_view_analytics: true,
        }
    }

    /// Resolves the capability set granted by a set of roles.
    /// Capabilities only accumulate, so the order of roles is irrelevant.
    pub fn from_roles(roles: &[Role]) -> Self {
        roles
            .iter()
            .fold(Self::none(), |set, role| set.union(role.capabilities()))
    }

    fn union(self, other: Self) -> Self {
        Self {
            can_go_live: self.can_go_live || other.can_go_live,
            can_control_microphone: self.can_control_microphone || other.can_control_microphone,
            can_control_music: self.can_control_music || other.can_control_music,
            can_trigger_jingles: self.can_trigger_jingles || other.can_trigger_jingles,
            can_switch_modes: self.can_switch_modes || other.can_switch_modes,
            can_emergency_override: self.can_emergency_override || other.can_emergency_override,
            can_manage_audio: self.can_manage_audio || other.can_manage_audio,
            can_view_analytics: self.can_view_analytics || other.can_view_analytics,
        }
    }
}
