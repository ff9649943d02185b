// Keyboard navigation bindings.

use serde::{Deserialize, Serialize};

use crate::error::PlayerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NavigationKey {
    Previous,
    Next,
}

impl NavigationKey {
    /// Map a DOM `KeyboardEvent.key` value. Anything else is unbound.
    pub fn from_key(key: &str) -> Result<Self, PlayerError> {
        match key {
            "ArrowLeft" => Ok(NavigationKey::Previous),
            "ArrowRight" => Ok(NavigationKey::Next),
            other => Err(PlayerError::UnboundKey(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrows_map_to_navigation() {
        assert_eq!(NavigationKey::from_key("ArrowLeft"), Ok(NavigationKey::Previous));
        assert_eq!(NavigationKey::from_key("ArrowRight"), Ok(NavigationKey::Next));
        assert_eq!(
            NavigationKey::from_key("Enter"),
            Err(PlayerError::UnboundKey("Enter".into()))
        );
    }
}
