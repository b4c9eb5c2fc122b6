//! Lap extraction from activity documents.
//!
//! Extraction is all-or-nothing per document: any malformed value fails the
//! whole document, so callers never see partially parsed laps.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::activity::{ActivityDocument, Lap, LapFields, Trackpoint, TrackpointFields};
use crate::types::{Position, SourceId, ValidationError};

/// Errors turning an [`ActivityDocument`] into laps.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// A lap carries no total-time field.
    #[error("lap {lap} has no total time")]
    MissingTotalTime { lap: usize },

    /// A numeric field could not be parsed.
    #[error("lap {lap}: invalid {field} value {value:?}")]
    InvalidNumber {
        lap: usize,
        field: &'static str,
        value: String,
    },

    /// A trackpoint timestamp could not be parsed.
    #[error("lap {lap}: invalid timestamp {value:?}")]
    InvalidTimestamp {
        lap: usize,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    /// A trackpoint position was out of range.
    #[error("lap {lap}: invalid position")]
    InvalidPosition {
        lap: usize,
        #[source]
        source: ValidationError,
    },
}

/// Extracts every lap of a document, in document order.
pub fn extract_laps(
    source_id: &SourceId,
    document: &ActivityDocument,
) -> Result<Vec<Lap>, ExtractError> {
    let mut laps = Vec::with_capacity(document.laps.len());
    // Cumulative distance reached by the previous laps
    let mut carried_distance = 0.0;
    for (idx, fields) in document.laps.iter().enumerate() {
        let lap = extract_lap(source_id, idx + 1, fields, carried_distance)?;
        if let Some(last) = lap.trackpoints.last() {
            carried_distance = last.cumulative_distance_m;
        }
        laps.push(lap);
    }
    Ok(laps)
}

/// Extracts every heart-rate sample of a document, in document order.
///
/// Unlike [`extract_laps`], this needs no lap totals or timestamps, so it
/// accepts documents that only carry heart-rate data.
pub fn extract_heart_rates(document: &ActivityDocument) -> Result<Vec<u16>, ExtractError> {
    let mut samples = Vec::new();
    for (idx, lap) in document.laps.iter().enumerate() {
        for point in &lap.trackpoints {
            if let Some(text) = point.heart_rate_bpm.as_deref() {
                samples.push(parse_number(idx + 1, "heart rate", text)?);
            }
        }
    }
    Ok(samples)
}

fn extract_lap(
    source_id: &SourceId,
    number: usize,
    fields: &LapFields,
    carried_distance: f64,
) -> Result<Lap, ExtractError> {
    let total_time_s: f64 = match fields.total_time_seconds.as_deref() {
        Some(text) => parse_number(number, "total time", text)?,
        None => return Err(ExtractError::MissingTotalTime { lap: number }),
    };
    if !total_time_s.is_finite() || total_time_s < 0.0 {
        return Err(ExtractError::InvalidNumber {
            lap: number,
            field: "total time",
            value: total_time_s.to_string(),
        });
    }
    let reported_distance_m = fields
        .distance_meters
        .as_deref()
        .map(|text| parse_number(number, "lap distance", text))
        .transpose()?;

    let mut readings = Vec::with_capacity(fields.trackpoints.len());
    for point in &fields.trackpoints {
        if let Some(reading) = extract_trackpoint(number, point)? {
            readings.push(reading);
        }
    }

    // Distances are cumulative over the activity. Leading gaps take the lap's
    // first reading, later gaps keep the last one; a lap without any reading
    // stays where the previous lap ended.
    let mut last_distance = readings
        .iter()
        .find_map(|(_, distance)| *distance)
        .unwrap_or(carried_distance);
    let trackpoints: Vec<Trackpoint> = readings
        .into_iter()
        .map(|(mut trackpoint, distance)| {
            if let Some(distance) = distance {
                last_distance = distance;
            }
            trackpoint.cumulative_distance_m = last_distance;
            trackpoint
        })
        .collect();

    let start_position = trackpoints.iter().find_map(|tp| tp.position);
    let lap = Lap {
        source_id: source_id.clone(),
        number,
        total_time_s,
        reported_distance_m,
        trackpoints,
        start_position,
    };
    if let Some(flag) = lap.flag() {
        tracing::debug!(source = %source_id, lap = number, ?flag, "lap flagged at extraction");
    }
    Ok(lap)
}

/// Parses one trackpoint along with its distance reading, if any.
///
/// The returned trackpoint's distance is filled in by the caller.
fn extract_trackpoint(
    lap: usize,
    fields: &TrackpointFields,
) -> Result<Option<(Trackpoint, Option<f64>)>, ExtractError> {
    let Some(time) = fields.time.as_deref() else {
        return Ok(None);
    };
    let timestamp = parse_timestamp(lap, time)?;

    let distance = fields
        .distance_meters
        .as_deref()
        .map(|text| parse_number(lap, "distance", text))
        .transpose()?;
    let heart_rate_bpm = fields
        .heart_rate_bpm
        .as_deref()
        .map(|text| parse_number(lap, "heart rate", text))
        .transpose()?;

    let position = match (
        fields.longitude_degrees.as_deref(),
        fields.latitude_degrees.as_deref(),
    ) {
        (Some(lon), Some(lat)) => {
            let longitude = parse_number(lap, "longitude", lon)?;
            let latitude = parse_number(lap, "latitude", lat)?;
            Some(
                Position::new(longitude, latitude)
                    .map_err(|source| ExtractError::InvalidPosition { lap, source })?,
            )
        }
        _ => None,
    };

    let trackpoint = Trackpoint {
        timestamp,
        cumulative_distance_m: 0.0,
        heart_rate_bpm,
        position,
    };
    Ok(Some((trackpoint, distance)))
}

fn parse_timestamp(lap: usize, text: &str) -> Result<DateTime<Utc>, ExtractError> {
    DateTime::parse_from_rfc3339(text.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|source| ExtractError::InvalidTimestamp {
            lap,
            value: text.to_string(),
            source,
        })
}

fn parse_number<T: std::str::FromStr>(
    lap: usize,
    field: &'static str,
    text: &str,
) -> Result<T, ExtractError> {
    text.trim()
        .parse()
        .map_err(|_| ExtractError::InvalidNumber {
            lap,
            field,
            value: text.to_string(),
        })
}
