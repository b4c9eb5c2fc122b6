//! Heart-rate zone binning.
//!
//! A [`ZoneSpec`] is a list of boundaries `e0 < e1 < ... < en`, naming zones
//! `Z0..Zn-1` by position. Zones are closed on the right, `(e[i], e[i+1]]`,
//! with the first zone also closed on the left, so `[e0, en]` is covered
//! without gaps and a boundary value belongs to the zone below it.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

/// Errors in a zone specification. Always fatal, before any source is read.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("zones need at least 2 boundaries, got {count}")]
    TooFewEdges { count: usize },

    #[error("invalid zone boundary {value:?}: expected a whole number of beats per minute")]
    InvalidEdge { value: String },

    #[error("duplicate zone boundary {value}")]
    DuplicateEdge { value: u16 },
}

/// Ordered heart-rate zone boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneSpec {
    edges: Vec<u16>,
}

impl ZoneSpec {
    /// Builds a spec from boundaries in any order.
    ///
    /// Boundaries are sorted; fewer than two, or any repeated value, is an error.
    pub fn new(edges: impl Into<Vec<u16>>) -> Result<Self, ConfigError> {
        let mut edges = edges.into();
        if edges.len() < 2 {
            return Err(ConfigError::TooFewEdges { count: edges.len() });
        }
        edges.sort_unstable();
        if let Some(pair) = edges.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(ConfigError::DuplicateEdge { value: pair[0] });
        }
        Ok(Self { edges })
    }

    pub fn edges(&self) -> &[u16] {
        &self.edges
    }

    /// Number of zones (one less than the number of boundaries).
    pub fn zone_count(&self) -> usize {
        self.edges.len() - 1
    }

    pub fn zone_name(index: usize) -> String {
        format!("Z{index}")
    }

    pub fn zone_names(&self) -> Vec<String> {
        (0..self.zone_count()).map(Self::zone_name).collect()
    }

    /// Index of the zone containing `bpm`, or `None` outside `[e0, en]`.
    pub fn zone_of(&self, bpm: u16) -> Option<usize> {
        let first = self.edges[0];
        let last = self.edges[self.edges.len() - 1];
        if bpm < first || bpm > last {
            return None;
        }
        if bpm == first {
            return Some(0);
        }
        // First boundary >= bpm closes the zone it belongs to
        let upper = self.edges.partition_point(|&edge| edge < bpm);
        Some(upper - 1)
    }
}

impl Default for ZoneSpec {
    fn default() -> Self {
        Self {
            edges: vec![0, 100, 123, 136, 146, 154, 300],
        }
    }
}

impl FromStr for ZoneSpec {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let edges = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<u16>().map_err(|_| ConfigError::InvalidEdge {
                    value: part.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(edges)
    }
}

impl fmt::Display for ZoneSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.edges.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join(","))
    }
}

/// Per-zone sample counts and the fractions derived from them.
///
/// Fractions are undefined (`None`) when no sample fell inside the zones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneDistribution {
    spec: ZoneSpec,
    counts: Vec<usize>,
    out_of_range: usize,
}

impl ZoneDistribution {
    /// An empty distribution over `spec`.
    pub fn empty(spec: &ZoneSpec) -> Self {
        Self {
            spec: spec.clone(),
            counts: vec![0; spec.zone_count()],
            out_of_range: 0,
        }
    }

    pub fn spec(&self) -> &ZoneSpec {
        &self.spec
    }

    /// Samples that fell inside a zone.
    pub fn binned(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Samples outside `[e0, en]`, excluded from the fractions.
    pub const fn out_of_range(&self) -> usize {
        self.out_of_range
    }

    pub fn is_defined(&self) -> bool {
        self.binned() > 0
    }

    pub fn count(&self, zone: usize) -> usize {
        self.counts.get(zone).copied().unwrap_or(0)
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn fraction(&self, zone: usize) -> Option<f64> {
        let binned = self.binned();
        if binned == 0 || zone >= self.counts.len() {
            return None;
        }
        Some(self.counts[zone] as f64 / binned as f64)
    }

    /// Fraction for a zone by name (`"Z1"`).
    pub fn fraction_of(&self, name: &str) -> Option<f64> {
        let index = name.strip_prefix('Z')?.parse::<usize>().ok()?;
        self.fraction(index)
    }

    /// Fractions for every zone in order; empty when undefined.
    pub fn fractions(&self) -> Vec<f64> {
        (0..self.counts.len())
            .filter_map(|zone| self.fraction(zone))
            .collect()
    }

    /// Adds another distribution's counts. Both must share a spec.
    pub fn merge(&mut self, other: &Self) {
        debug_assert_eq!(self.spec, other.spec);
        for (mine, theirs) in self.counts.iter_mut().zip(&other.counts) {
            *mine += theirs;
        }
        self.out_of_range += other.out_of_range;
    }
}

impl Serialize for ZoneDistribution {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        #[derive(Serialize)]
        struct Zone {
            name: String,
            lower_bpm: u16,
            upper_bpm: u16,
            samples: usize,
            fraction: Option<f64>,
        }

        #[derive(Serialize)]
        struct Distribution {
            zones: Vec<Zone>,
            binned: usize,
            out_of_range: usize,
        }

        let edges = self.spec.edges();
        let zones = (0..self.counts.len())
            .map(|zone| Zone {
                name: ZoneSpec::zone_name(zone),
                lower_bpm: edges[zone],
                upper_bpm: edges[zone + 1],
                samples: self.counts[zone],
                fraction: self.fraction(zone),
            })
            .collect();
        Distribution {
            zones,
            binned: self.binned(),
            out_of_range: self.out_of_range,
        }
        .serialize(serializer)
    }
}

/// Bins heart-rate samples into zones.
///
/// Samples outside the spec's range are counted separately and logged rather
/// than assigned to the nearest zone.
pub fn bin_heart_rates(samples: &[u16], spec: &ZoneSpec) -> ZoneDistribution {
    let mut distribution = ZoneDistribution::empty(spec);
    for &bpm in samples {
        match spec.zone_of(bpm) {
            Some(zone) => distribution.counts[zone] += 1,
            None => distribution.out_of_range += 1,
        }
    }
    if distribution.out_of_range > 0 {
        tracing::warn!(
            out_of_range = distribution.out_of_range,
            zones = %spec,
            "heart-rate samples outside zone boundaries"
        );
    }
    distribution
}
