//! Zone and zone player snapshots
//!
//! A [`Zone`] is one playback group: an ordered list of [`ZonePlayer`]s and a
//! group identifier. Zones are built from topology reported upstream and are
//! never mutated; a topology change produces new zones.
//!
//! ```
//! use sonos_zone::{Zone, ZonePlayer};
//!
//! let zone = Zone::new(
//!     "RINCON_B:12",
//!     vec![
//!         ZonePlayer::new("Kitchen").into_ptr(),
//!         ZonePlayer::new("Living Room").with_coordinator(true).into_ptr(),
//!     ],
//! );
//!
//! assert_eq!(zone.coordinator().unwrap().name(), "Living Room");
//! assert_eq!(zone.zone_name(), "Living Room + Kitchen");
//! ```

pub mod player;
pub mod zone;

pub use player::{ZonePlayer, ZonePlayerPtr, ATTR_COORDINATOR, ATTR_LOCATION, ATTR_UUID};
pub use zone::{Zone, ZonePtr, ZONE_NAME_SEPARATOR};
