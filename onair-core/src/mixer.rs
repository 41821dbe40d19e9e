//! Mapping from raw hardware controller messages to mixer state.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// MIDI status high nibbles the bridge understands.
const CONTROL_CHANGE: u8 = 0xB0;
const NOTE_ON: u8 = 0x90;

/// Transport pad notes. The first two pads on most dj surfaces.
const GO_LIVE_NOTE: u8 = 36;
const STOP_NOTE: u8 = 37;

/// A decoded message from a hardware controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixerMessage {
    /// A fader or knob moved.
    Control { controller: u8, value: u8 },
    /// The go live pad was hit.
    GoLive,
    /// The stop pad was hit.
    Stop,
}

impl MixerMessage {
    /// Decodes a raw message. Anything the bridge does not understand,
    /// including note releases, decodes to nothing.
    pub fn parse(raw: &[u8]) -> Option<Self> {
        let (&status, data) = raw.split_first()?;

        match (status & 0xF0, data) {
            (CONTROL_CHANGE, &[controller, value, ..]) => {
                Some(Self::Control { controller, value })
            }
            (NOTE_ON, &[note, velocity, ..]) if velocity > 0 => match note {
                GO_LIVE_NOTE => Some(Self::GoLive),
                STOP_NOTE => Some(Self::Stop),
                _ => None,
            },
            _ => None,
        }
    }
}

/// The mixer parameter a controller number is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MixerControl {
    Crossfader,
    MasterVolume,
    ChannelOneVolume,
    ChannelTwoVolume,
    MicLevel,
}

impl MixerControl {
    /// The fixed controller map of the supported mixer surface.
    pub fn from_controller(controller: u8) -> Option<Self> {
        match controller {
            1 => Some(Self::Crossfader),
            7 => Some(Self::MasterVolume),
            14 => Some(Self::ChannelOneVolume),
            15 => Some(Self::ChannelTwoVolume),
            16 => Some(Self::MicLevel),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Crossfader => "crossfader",
            Self::MasterVolume => "master-volume",
            Self::ChannelOneVolume => "channel-one-volume",
            Self::ChannelTwoVolume => "channel-two-volume",
            Self::MicLevel => "mic-level",
        }
    }
}

/// Normalizes a 7-bit controller value to a 0-100 level.
pub fn normalize_level(value: u8) -> u8 {
    ((value.min(127) as f32 / 127.) * 100.).round() as u8
}

/// A recognized movement of a mixer control.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlChange {
    pub control: MixerControl,
    /// The normalized 0-100 level
    pub level: u8,
    pub at: DateTime<Utc>,
}

/// The last known state of the connected mixer surface.
/// Rebuilt entirely from incoming controller messages, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MixerState {
    pub crossfader: u8,
    pub channel_one_volume: u8,
    pub channel_two_volume: u8,
    pub master_volume: u8,
    pub mic_level: u8,
    pub live: bool,
    pub last_change: Option<ControlChange>,
}

impl MixerState {
    /// Applies a decoded message, returning the control delta when the
    /// controller number is one the fixed map recognizes.
    pub fn apply(&mut self, message: MixerMessage, at: DateTime<Utc>) -> Option<ControlChange> {
        match message {
            MixerMessage::Control { controller, value } => {
                let control = MixerControl::from_controller(controller)?;
                let level = normalize_level(value);

                match control {
                    MixerControl::Crossfader => self.crossfader = level,
                    MixerControl::MasterVolume => self.master_volume = level,
                    MixerControl::ChannelOneVolume => self.channel_one_volume = level,
                    MixerControl::ChannelTwoVolume => self.channel_two_volume = level,
                    MixerControl::MicLevel => self.mic_level = level,
                }

                let change = ControlChange { control, level, at };
                self.last_change = Some(change);

                Some(change)
            }
            MixerMessage::GoLive => {
                self.live = true;
                None
            }
            MixerMessage::Stop => {
                self.live = false;
                None
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn apply(state: &mut MixerState, raw: &[u8]) -> Option<ControlChange> {
        let message = MixerMessage::parse(raw)?;
        state.apply(message, Utc::now())
    }

    #[test]
    fn test_master_volume_normalizes_to_both_endpoints() {
        let mut state = MixerState::default();

        apply(&mut state, &[0xB0, 7, 127]);
        assert_eq!(state.master_volume, 100);

        apply(&mut state, &[0xB0, 7, 0]);
        assert_eq!(state.master_volume, 0);
    }

    #[test]
    fn test_midpoint_rounds_to_fifty() {
        assert_eq!(normalize_level(64), 50);
    }

    #[test]
    fn test_channel_faders_map_to_their_channels() {
        let mut state = MixerState::default();

        apply(&mut state, &[0xB0, 14, 127]);
        apply(&mut state, &[0xB0, 15, 64]);

        assert_eq!(state.channel_one_volume, 100);
        assert_eq!(state.channel_two_volume, 50);
    }

    #[test]
    fn test_unmapped_controllers_produce_no_change() {
        let mut state = MixerState::default();

        let change = apply(&mut state, &[0xB0, 20, 127]);

        assert_eq!(change, None);
        assert_eq!(state.last_change, None);
    }

    #[test]
    fn test_control_changes_record_the_last_movement() {
        let mut state = MixerState::default();

        let change = apply(&mut state, &[0xB0, 1, 127]).unwrap();

        assert_eq!(change.control, MixerControl::Crossfader);
        assert_eq!(change.level, 100);
        assert_eq!(state.last_change, Some(change));
    }

    #[test]
    fn test_transport_pads_toggle_the_live_flag() {
        let mut state = MixerState::default();

        apply(&mut state, &[0x90, 36, 127]);
        assert!(state.live);

        apply(&mut state, &[0x90, 37, 127]);
        assert!(!state.live);
    }

    #[test]
    fn test_note_releases_and_garbage_are_ignored() {
        assert_eq!(MixerMessage::parse(&[0x80, 36, 0]), None);
        assert_eq!(MixerMessage::parse(&[0x90, 36, 0]), None, "zero velocity");
        assert_eq!(MixerMessage::parse(&[0x90, 40, 127]), None, "unmapped note");
        assert_eq!(MixerMessage::parse(&[0xB0]), None, "truncated message");
        assert_eq!(MixerMessage::parse(&[]), None);
    }

    #[test]
    fn test_status_channel_is_ignored() {
        // Controllers on any midi channel should map the same
        let mut state = MixerState::default();

        apply(&mut state, &[0xB3, 7, 127]);

        assert_eq!(state.master_volume, 100);
    }
}
