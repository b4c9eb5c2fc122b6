//! UTC to local-time conversion for lap timestamps.
//!
//! Activity files record UTC. Local times are resolved from a lap's position
//! through a [`TimezoneLookup`]. When local time is requested but no lookup is
//! available the run degrades to UTC; that is reported once, not per lap.

use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;

use crate::types::Position;

/// Resolves a geographic position to a timezone.
pub trait TimezoneLookup: Send + Sync {
    /// Returns the zone for the position, or `None` if it cannot be resolved.
    fn resolve(&self, position: Position) -> Option<Tz>;
}

/// Resolves every position to one configured zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedTimezone(pub Tz);

impl FixedTimezone {
    /// Parses an IANA zone name such as `America/Chicago`.
    pub fn from_name(name: &str) -> Option<Self> {
        name.trim().parse::<Tz>().ok().map(Self)
    }
}

impl TimezoneLookup for FixedTimezone {
    fn resolve(&self, _position: Position) -> Option<Tz> {
        Some(self.0)
    }
}

/// Resolves positions with the embedded timezone boundary dataset.
#[cfg(feature = "geo-tz")]
pub struct GeoTimezone {
    finder: tzf_rs::DefaultFinder,
}

#[cfg(feature = "geo-tz")]
impl GeoTimezone {
    pub fn new() -> Self {
        Self {
            finder: tzf_rs::DefaultFinder::new(),
        }
    }
}

#[cfg(feature = "geo-tz")]
impl Default for GeoTimezone {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "geo-tz")]
impl TimezoneLookup for GeoTimezone {
    fn resolve(&self, position: Position) -> Option<Tz> {
        let name = self.finder.get_tz_name(position.longitude, position.latitude);
        if name.is_empty() {
            return None;
        }
        name.parse::<Tz>().ok()
    }
}

/// Converts lap timestamps for display, honoring the local-time setting.
pub struct LapClock {
    lookup: Option<Box<dyn TimezoneLookup>>,
    local_time: bool,
}

impl LapClock {
    /// A clock that always reports UTC.
    pub fn utc() -> Self {
        Self {
            lookup: None,
            local_time: false,
        }
    }

    /// A clock that converts to the zone of each lap's position.
    ///
    /// With `lookup` absent, local time is degraded to UTC and a warning is
    /// logged here, once for the whole run.
    pub fn local(lookup: Option<Box<dyn TimezoneLookup>>) -> Self {
        if lookup.is_none() {
            tracing::warn!("no timezone lookup available, reporting lap times in UTC");
        }
        Self {
            lookup,
            local_time: true,
        }
    }

    /// True when local time was requested but cannot be provided.
    pub const fn is_degraded(&self) -> bool {
        self.local_time && self.lookup.is_none()
    }

    /// Converts `instant` to the local time at `position`, or leaves it in UTC.
    pub fn convert(&self, instant: DateTime<Utc>, position: Option<Position>) -> DateTime<FixedOffset> {
        if !self.local_time {
            return instant.fixed_offset();
        }
        let zone = self
            .lookup
            .as_ref()
            .zip(position)
            .and_then(|(lookup, position)| lookup.resolve(position));
        match zone {
            Some(zone) => instant.with_timezone(&zone).fixed_offset(),
            None => instant.fixed_offset(),
        }
    }
}

impl Default for LapClock {
    fn default() -> Self {
        Self::utc()
    }
}

impl std::fmt::Debug for LapClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LapClock")
            .field("local_time", &self.local_time)
            .field("has_lookup", &self.lookup.is_some())
            .finish()
    }
}
