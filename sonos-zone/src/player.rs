//! Zone player identity

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Attribute holding the player's UUID
pub const ATTR_UUID: &str = "uuid";
/// Attribute holding the device description URL
pub const ATTR_LOCATION: &str = "location";
/// Attribute set to `"true"` on the coordinator of a zone
pub const ATTR_COORDINATOR: &str = "coordinator";

/// A named device identity with free-form string attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZonePlayer {
    name: String,
    attributes: BTreeMap<String, String>,
}

/// Shared handle to a zone player
pub type ZonePlayerPtr = Arc<ZonePlayer>;

impl ZonePlayer {
    /// Create a player without attributes
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Set an attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Mark the player as coordinator (or not)
    pub fn with_coordinator(self, coordinator: bool) -> Self {
        self.with_attribute(ATTR_COORDINATOR, if coordinator { "true" } else { "false" })
    }

    /// Wrap into a shareable handle
    pub fn into_ptr(self) -> ZonePlayerPtr {
        Arc::new(self)
    }

    /// Get the player name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get an attribute value
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Get all attributes
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    /// Get the UUID attribute
    pub fn uuid(&self) -> Option<&str> {
        self.attribute(ATTR_UUID)
    }

    /// Get the location attribute
    pub fn location(&self) -> Option<&str> {
        self.attribute(ATTR_LOCATION)
    }

    /// Check if this player holds the coordinator role
    pub fn is_coordinator(&self) -> bool {
        self.attribute(ATTR_COORDINATOR) == Some("true")
    }
}

impl fmt::Display for ZonePlayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_player() {
        let player = ZonePlayer::new("Kitchen");
        assert_eq!(player.name(), "Kitchen");
        assert!(player.attributes().is_empty());
        assert!(!player.is_coordinator());
        assert_eq!(player.to_string(), "Kitchen");
    }

    #[test]
    fn test_attributes() {
        let player = ZonePlayer::new("Kitchen")
            .with_attribute(ATTR_UUID, "RINCON_000E58A01234")
            .with_attribute(ATTR_LOCATION, "http://192.168.1.10:1400/xml/device_description.xml");
        assert_eq!(player.uuid(), Some("RINCON_000E58A01234"));
        assert!(player.location().unwrap().ends_with("device_description.xml"));
        assert_eq!(player.attribute("missing"), None);
    }

    #[test]
    fn test_coordinator_flag() {
        assert!(ZonePlayer::new("A").with_coordinator(true).is_coordinator());
        assert!(!ZonePlayer::new("A").with_coordinator(false).is_coordinator());
        assert!(!ZonePlayer::new("A")
            .with_attribute(ATTR_COORDINATOR, "yes")
            .is_coordinator());
    }
}
