//! Half-split lap metrics and cardiac drift.
//!
//! # Algorithm Summary
//!
//! 1. Split the trackpoint sequence at `floor(total_time / 2) - 1`
//! 2. Derive whole-lap and per-half speed, either from cumulative distance or
//!    from a constant treadmill pace
//! 3. Average heart rate per half, excluding the split trackpoint
//! 4. Drift is the relative change of speed/heart-rate from first to second half
//!
//! Degenerate laps never fail: the split is replaced by a
//! [`ZeroDivisionHazard`] and every other field is still reported.

use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use crate::activity::Lap;
use crate::timezone::LapClock;
use crate::types::SourceId;
use crate::units::{pace_to_speed_m_per_s, speed_to_pace_min_per_mile};

/// Where lap speeds come from.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SpeedSource {
    /// Cumulative distance divided by reported time.
    #[default]
    GpsDerived,
    /// A fixed speed in m/s, used for treadmill runs.
    ConstantOverride(f64),
}

impl SpeedSource {
    /// Treadmill mode from a pace in minutes per mile; `None` means GPS.
    pub fn from_treadmill_pace(pace_min_per_mile: Option<f64>) -> Self {
        pace_min_per_mile.map_or(Self::GpsDerived, |pace| {
            Self::ConstantOverride(pace_to_speed_m_per_s(pace))
        })
    }
}

/// Why drift could not be computed for a lap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroDivisionHazard {
    /// The lap has no trackpoints.
    NoTrackpoints,
    /// The lap reports zero total time.
    ZeroTime,
    /// A half has no heart-rate samples.
    EmptyHeartRateSegment(Half),
    /// A half has heart-rate samples, but they average zero bpm.
    ZeroHeartRate(Half),
    /// The first-half speed/heart-rate ratio is zero (typically zero distance).
    ZeroFirstHalfRatio,
}

impl fmt::Display for ZeroDivisionHazard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoTrackpoints => write!(f, "lap has no trackpoints"),
            Self::ZeroTime => write!(f, "lap has zero total time"),
            Self::EmptyHeartRateSegment(half) => {
                write!(f, "{half} half has no heart-rate samples")
            }
            Self::ZeroHeartRate(half) => write!(f, "{half} half averages zero bpm"),
            Self::ZeroFirstHalfRatio => write!(f, "first half has zero speed"),
        }
    }
}

/// One half of a lap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Half {
    First,
    Second,
}

impl fmt::Display for Half {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::First => write!(f, "first"),
            Self::Second => write!(f, "second"),
        }
    }
}

/// Metrics of one half of a lap.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HalfMetrics {
    /// Distance covered; `None` when speed is overridden.
    pub distance_m: Option<f64>,
    pub speed_m_s: f64,
    pub pace_min_per_mile: f64,
    pub avg_bpm: f64,
    pub speed_bpm_ratio: f64,
}

/// The first/second half decomposition of a lap.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HalfSplit {
    /// Index of the trackpoint the lap is split at.
    pub half_index: usize,
    pub first: HalfMetrics,
    pub second: HalfMetrics,
    /// `(second ratio - first ratio) / first ratio`.
    pub drift_ratio: f64,
}

/// Derived metrics for one lap.
#[derive(Debug, Clone, PartialEq)]
pub struct LapMetrics {
    pub source_id: SourceId,
    pub lap_number: usize,
    pub start_time: Option<DateTime<FixedOffset>>,
    pub end_time: Option<DateTime<FixedOffset>>,
    /// Seconds between first and last trackpoint.
    pub duration_s: Option<f64>,
    pub trackpoint_count: usize,
    /// Reported lap time, used for halving.
    pub total_time_s: f64,
    pub reported_distance_m: Option<f64>,
    pub total_distance_m: Option<f64>,
    pub avg_bpm: Option<f64>,
    pub speed_m_s: Option<f64>,
    pub pace_min_per_mile: Option<f64>,
    pub split: Result<HalfSplit, ZeroDivisionHazard>,
}

impl LapMetrics {
    pub fn drift_ratio(&self) -> Option<f64> {
        self.split.as_ref().ok().map(|split| split.drift_ratio)
    }

    pub fn hazard(&self) -> Option<ZeroDivisionHazard> {
        self.split.as_ref().err().copied()
    }
}

// The split serializes as `split` (null on hazard) plus `hazard` (null on success).
impl Serialize for LapMetrics {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("LapMetrics", 15)?;
        state.serialize_field("source_id", &self.source_id)?;
        state.serialize_field("lap_number", &self.lap_number)?;
        state.serialize_field("start_time", &self.start_time)?;
        state.serialize_field("end_time", &self.end_time)?;
        state.serialize_field("duration_s", &self.duration_s)?;
        state.serialize_field("trackpoint_count", &self.trackpoint_count)?;
        state.serialize_field("total_time_s", &self.total_time_s)?;
        state.serialize_field("reported_distance_m", &self.reported_distance_m)?;
        state.serialize_field("total_distance_m", &self.total_distance_m)?;
        state.serialize_field("avg_bpm", &self.avg_bpm)?;
        state.serialize_field("speed_m_s", &self.speed_m_s)?;
        state.serialize_field("pace_min_per_mile", &self.pace_min_per_mile)?;
        state.serialize_field("split", &self.split.as_ref().ok())?;
        state.serialize_field("drift_ratio", &self.drift_ratio())?;
        state.serialize_field("hazard", &self.hazard())?;
        state.end()
    }
}

/// Configuration for lap metrics.
#[derive(Debug, Default)]
pub struct MetricsConfig {
    pub speed_source: SpeedSource,
    pub clock: LapClock,
}

/// Computes whole-lap and half-split metrics for a lap.
pub fn compute_lap_metrics(lap: &Lap, config: &MetricsConfig) -> LapMetrics {
    let position = lap.start_position;
    let start_time = lap
        .start_time()
        .map(|t| config.clock.convert(t, position));
    let end_time = lap.end_time().map(|t| config.clock.convert(t, position));

    let total_distance_m = distance_between(lap, 0, lap.trackpoints.len().saturating_sub(1));
    let speed_m_s = match config.speed_source {
        SpeedSource::ConstantOverride(speed) => Some(speed),
        SpeedSource::GpsDerived => total_distance_m
            .filter(|_| lap.total_time_s > 0.0)
            .map(|distance| distance / lap.total_time_s),
    };

    let split = half_split(lap, config.speed_source);
    if let Err(hazard) = &split {
        tracing::warn!(
            source = %lap.source_id,
            lap = lap.number,
            %hazard,
            "drift omitted for lap"
        );
    }

    LapMetrics {
        source_id: lap.source_id.clone(),
        lap_number: lap.number,
        start_time,
        end_time,
        duration_s: lap.computed_duration_s(),
        trackpoint_count: lap.trackpoints.len(),
        total_time_s: lap.total_time_s,
        reported_distance_m: lap.reported_distance_m,
        total_distance_m,
        avg_bpm: mean(lap.heart_rates()),
        speed_m_s,
        pace_min_per_mile: speed_m_s.map(speed_to_pace_min_per_mile),
        split,
    }
}

/// Trackpoint index splitting the lap into halves.
///
/// `floor(total_time / 2) - 1`, clamped to the trackpoint range. Halving uses
/// the reported time, not the trackpoint timestamps.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn half_index(total_time_s: f64, trackpoint_count: usize) -> usize {
    let last = trackpoint_count.saturating_sub(1);
    let half = (total_time_s / 2.0).floor() - 1.0;
    if half <= 0.0 {
        0
    } else {
        (half as usize).min(last)
    }
}

fn half_split(lap: &Lap, speed_source: SpeedSource) -> Result<HalfSplit, ZeroDivisionHazard> {
    let count = lap.trackpoints.len();
    if count == 0 {
        return Err(ZeroDivisionHazard::NoTrackpoints);
    }
    if lap.total_time_s <= 0.0 {
        return Err(ZeroDivisionHazard::ZeroTime);
    }

    let h = half_index(lap.total_time_s, count);
    let half_time = lap.total_time_s / 2.0;

    // Both halves divide by half the reported time; the second half is
    // anchored at the split trackpoint itself.
    let first = half_metrics(
        distance_between(lap, 0, h),
        mean(lap.trackpoints[..h].iter().filter_map(|tp| tp.heart_rate_bpm)),
        speed_source,
        half_time,
        Half::First,
    )?;
    let second = half_metrics(
        distance_between(lap, h, count - 1),
        mean(lap.trackpoints[h + 1..].iter().filter_map(|tp| tp.heart_rate_bpm)),
        speed_source,
        half_time,
        Half::Second,
    )?;

    if first.speed_bpm_ratio == 0.0 {
        return Err(ZeroDivisionHazard::ZeroFirstHalfRatio);
    }
    let drift_ratio = (second.speed_bpm_ratio - first.speed_bpm_ratio) / first.speed_bpm_ratio;

    Ok(HalfSplit {
        half_index: h,
        first,
        second,
        drift_ratio,
    })
}

/// Builds one half's metrics, or the hazard that leaves its ratio undefined.
fn half_metrics(
    distance_m: Option<f64>,
    avg_bpm: Option<f64>,
    speed_source: SpeedSource,
    half_time_s: f64,
    half: Half,
) -> Result<HalfMetrics, ZeroDivisionHazard> {
    let avg_bpm = avg_bpm.ok_or(ZeroDivisionHazard::EmptyHeartRateSegment(half))?;
    if avg_bpm <= 0.0 {
        return Err(ZeroDivisionHazard::ZeroHeartRate(half));
    }
    let (distance_m, speed_m_s) = match speed_source {
        SpeedSource::ConstantOverride(speed) => (None, speed),
        SpeedSource::GpsDerived => {
            let distance = distance_m.unwrap_or(0.0);
            (Some(distance), distance / half_time_s)
        }
    };
    Ok(HalfMetrics {
        distance_m,
        speed_m_s,
        pace_min_per_mile: speed_to_pace_min_per_mile(speed_m_s),
        avg_bpm,
        speed_bpm_ratio: speed_m_s / avg_bpm,
    })
}

fn distance_between(lap: &Lap, from: usize, to: usize) -> Option<f64> {
    let start = lap.trackpoints.get(from)?;
    let end = lap.trackpoints.get(to)?;
    Some(end.cumulative_distance_m - start.cumulative_distance_m)
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: impl Iterator<Item = u16>) -> Option<f64> {
    let (sum, count) = values.fold((0u64, 0u64), |(sum, count), v| {
        (sum + u64::from(v), count + 1)
    });
    if count == 0 {
        None
    } else {
        Some(sum as f64 / count as f64)
    }
}
