use serde::{Deserialize, Serialize};
use std::fmt;

/// States of the DASH client state machine, one unit per client session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DashClientState {
    /// Initial state, and the re-entry point after any per-segment state
    Idle,
    /// The manifest was fetched
    MpdDone,
    /// The audio initialization segment was fetched
    AudioInitSegDone,
    /// The video initialization segment was fetched
    VideoInitSegDone,
    /// An audio media segment was fetched
    AudioMediaSegDone,
    /// A video media segment was fetched
    VideoMediaSegDone,
}

impl DashClientState {
    pub const ALL: [DashClientState; 6] = [
        Self::Idle,
        Self::MpdDone,
        Self::AudioInitSegDone,
        Self::VideoInitSegDone,
        Self::AudioMediaSegDone,
        Self::VideoMediaSegDone,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::MpdDone => "MPD_DONE",
            Self::AudioInitSegDone => "AUDIO_INIT_SEG_DONE",
            Self::VideoInitSegDone => "VIDEO_INIT_SEG_DONE",
            Self::AudioMediaSegDone => "AUDIO_MEDIA_SEG_DONE",
            Self::VideoMediaSegDone => "VIDEO_MEDIA_SEG_DONE",
        }
    }

    /// Check if the client is waiting for a media segment
    pub fn awaits_media_segment(&self) -> bool {
        matches!(self, Self::AudioInitSegDone | Self::VideoInitSegDone)
    }
}

impl fmt::Display for DashClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DashClientState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| format!("Invalid DASH client state: {s}"))
    }
}

impl Default for DashClientState {
    fn default() -> Self {
        Self::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_string_conversion() {
        assert_eq!(DashClientState::MpdDone.to_string(), "MPD_DONE");
        assert_eq!(
            "VIDEO_MEDIA_SEG_DONE".parse::<DashClientState>().unwrap(),
            DashClientState::VideoMediaSegDone
        );
        assert!("mpd_done".parse::<DashClientState>().is_err());
    }

    #[test]
    fn test_state_serde() {
        let json = serde_json::to_string(&DashClientState::AudioInitSegDone).unwrap();
        assert_eq!(json, "\"AUDIO_INIT_SEG_DONE\"");
        let parsed: DashClientState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, DashClientState::AudioInitSegDone);
    }

    #[test]
    fn test_waiting_for_media_segment() {
        assert!(DashClientState::AudioInitSegDone.awaits_media_segment());
        assert!(!DashClientState::Idle.awaits_media_segment());
        assert_eq!(DashClientState::default(), DashClientState::Idle);
    }
}
