use serde::{Deserialize, Serialize};
use std::fmt;

use super::states::DashClientState;

/// Events of the DASH client state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DashClientEvent {
    /// Return to idle from any progress state
    Idle,
    /// Audio manifest received
    GetMpdAudio,
    /// Video manifest received
    GetMpdVideo,
    /// Audio initialization segment received
    GetAudioInitSeg,
    /// Video initialization segment received
    GetVideoInitSeg,
    /// Audio media segment received
    GetAudioMediaSeg,
    /// Video media segment received
    GetVideoMediaSeg,
    /// A media segment did not arrive in time
    MediaSegTimeout,
}

impl DashClientEvent {
    pub const ALL: [DashClientEvent; 8] = [
        Self::Idle,
        Self::GetMpdAudio,
        Self::GetMpdVideo,
        Self::GetAudioInitSeg,
        Self::GetVideoInitSeg,
        Self::GetAudioMediaSeg,
        Self::GetVideoMediaSeg,
        Self::MediaSegTimeout,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::GetMpdAudio => "GET_MPD_AUDIO",
            Self::GetMpdVideo => "GET_MPD_VIDEO",
            Self::GetAudioInitSeg => "GET_AUDIO_INIT_SEG",
            Self::GetVideoInitSeg => "GET_VIDEO_INIT_SEG",
            Self::GetAudioMediaSeg => "GET_AUDIO_MEDIA_SEG",
            Self::GetVideoMediaSeg => "GET_VIDEO_MEDIA_SEG",
            Self::MediaSegTimeout => "MEDIA_SEG_TIMEOUT",
        }
    }

    /// States this event may be fired from
    pub fn from_states(&self) -> &'static [DashClientState] {
        use DashClientState::*;
        match self {
            Self::Idle => &[
                MpdDone,
                AudioInitSegDone,
                VideoInitSegDone,
                AudioMediaSegDone,
                VideoMediaSegDone,
            ],
            Self::GetMpdAudio | Self::GetMpdVideo => &[Idle],
            Self::GetAudioInitSeg | Self::GetVideoInitSeg => &[MpdDone],
            Self::GetAudioMediaSeg => &[AudioInitSegDone],
            Self::GetVideoMediaSeg => &[VideoInitSegDone],
            Self::MediaSegTimeout => &[AudioInitSegDone, VideoInitSegDone],
        }
    }

    pub fn to_state(&self) -> DashClientState {
        match self {
            Self::Idle | Self::MediaSegTimeout => DashClientState::Idle,
            Self::GetMpdAudio | Self::GetMpdVideo => DashClientState::MpdDone,
            Self::GetAudioInitSeg => DashClientState::AudioInitSegDone,
            Self::GetVideoInitSeg => DashClientState::VideoInitSegDone,
            Self::GetAudioMediaSeg => DashClientState::AudioMediaSegDone,
            Self::GetVideoMediaSeg => DashClientState::VideoMediaSegDone,
        }
    }

    /// Check if this event starts waiting for a media segment
    pub fn awaits_media_segment(&self) -> bool {
        self.to_state().awaits_media_segment()
    }
}

impl fmt::Display for DashClientEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DashClientEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| format!("Invalid DASH client event: {s}"))
    }
}
