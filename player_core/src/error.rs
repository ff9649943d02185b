// Typed errors with thiserror. Surface meaningful messages to JS.
// Only playlist-level failures reach the top-level view; viewer failures stay local.

use thiserror::Error;

use crate::types::SlideIndex;

/// Why a playlist could not be obtained.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaylistFetchError {
    /// 404: the token in the URL does not name a playlist.
    #[error("Playlist not found for this token")]
    NotFound,

    #[error("Playlist request failed with status {0}")]
    Status(u16),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid playlist document: {0}")]
    Parse(String),

    #[error("Invalid slide at index {index}: {reason}")]
    InvalidSlide { index: usize, reason: String },
}

impl PlaylistFetchError {
    /// Whether this failure should be presented as a missing or invalid token
    /// rather than a generic load error.
    pub fn is_missing_token(&self) -> bool {
        matches!(self, PlaylistFetchError::NotFound)
    }
}

impl From<serde_json::Error> for PlaylistFetchError {
    fn from(err: serde_json::Error) -> Self {
        PlaylistFetchError::Parse(err.to_string())
    }
}

/// Player error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlayerError {
    #[error("No playlist is loaded")]
    NoPlaylist,

    #[error("Navigation is disabled while the current slide is loading")]
    NavigationLocked,

    #[error("Slide index {index} out of range for playlist of {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Fetch ticket is stale")]
    StaleTicket,

    #[error("Unknown key binding: {0}")]
    UnboundKey(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for PlayerError {
    fn from(err: serde_json::Error) -> Self {
        PlayerError::Serialization(err.to_string())
    }
}

impl PlayerError {
    pub fn out_of_range(index: SlideIndex, len: usize) -> Self {
        PlayerError::IndexOutOfRange {
            index: index.as_usize(),
            len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = PlayerError::InvalidConfig("missing field".to_string());
        assert!(err.to_string().contains("missing field"));

        let err = PlaylistFetchError::InvalidSlide {
            index: 3,
            reason: "no source".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid slide at index 3: no source");
    }

    #[test]
    fn only_not_found_is_missing_token() {
        assert!(PlaylistFetchError::NotFound.is_missing_token());
        assert!(!PlaylistFetchError::Status(500).is_missing_token());
        assert!(!PlaylistFetchError::Network("offline".into()).is_missing_token());
    }
}
