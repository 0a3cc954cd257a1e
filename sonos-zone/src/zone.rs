//! Zone snapshot

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::player::ZonePlayerPtr;

/// Separator used when composing a zone name from its players
pub const ZONE_NAME_SEPARATOR: &str = " + ";

/// One playback group: an ordered list of players and a group identifier
///
/// A zone is a read-only snapshot. A topology change upstream produces a new
/// `Zone`; existing ones are never edited, so readers may keep iterating
/// over a zone they hold. The coordinator is looked up on every access
/// instead of being stored, and players carry no reference back to their
/// zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    group: String,
    players: Vec<ZonePlayerPtr>,
}

/// Shared handle to a zone
pub type ZonePtr = Arc<Zone>;

impl Zone {
    /// Create a zone from its group identifier and players
    pub fn new(group: impl Into<String>, players: Vec<ZonePlayerPtr>) -> Self {
        Self {
            group: group.into(),
            players,
        }
    }

    /// Wrap into a shareable handle
    pub fn into_ptr(self) -> ZonePtr {
        Arc::new(self)
    }

    /// Get the group identifier
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Get the players, in topology order
    pub fn players(&self) -> &[ZonePlayerPtr] {
        &self.players
    }

    /// Number of players
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Check if the zone has no player
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Iterate over the players
    pub fn iter(&self) -> std::slice::Iter<'_, ZonePlayerPtr> {
        self.players.iter()
    }

    /// First player holding the coordinator role, if any
    pub fn coordinator(&self) -> Option<ZonePlayerPtr> {
        self.players.iter().find(|p| p.is_coordinator()).cloned()
    }

    /// Check if a player with this name belongs to the zone
    pub fn contains(&self, name: &str) -> bool {
        self.players.iter().any(|p| p.name() == name)
    }

    /// Display name of the zone: the coordinator first, then the other
    /// players in order, joined with `" + "`
    pub fn zone_name(&self) -> String {
        let coordinator = self.coordinator();
        let others = self
            .players
            .iter()
            .filter(|p| !coordinator.as_ref().is_some_and(|c| Arc::ptr_eq(c, p)));

        coordinator
            .iter()
            .chain(others)
            .map(|p| p.name())
            .collect::<Vec<_>>()
            .join(ZONE_NAME_SEPARATOR)
    }
}

impl<'a> IntoIterator for &'a Zone {
    type Item = &'a ZonePlayerPtr;
    type IntoIter = std::slice::Iter<'a, ZonePlayerPtr>;

    fn into_iter(self) -> Self::IntoIter {
        self.players.iter()
    }
}
