//! Garmin Training Center (TCX) reader.
//!
//! Reads `.tcx` files into [`ActivityDocument`]s for the analysis core. Only
//! the fields the core consumes are kept, as raw text; numeric parsing and
//! validation happen in [`aet_core::extract`].
//!
//! # Element Matching
//!
//! Elements are matched by local name, so files using a namespace prefix or
//! the bare default namespace read the same. Within a `Lap`:
//! - `TotalTimeSeconds` and `DistanceMeters` are read from direct children
//! - every `Trackpoint` below the lap (across `Track` segments) is read in
//!   document order
//!
//! Heart rate is `HeartRateBpm/Value`; position is
//! `Position/LongitudeDegrees` and `Position/LatitudeDegrees`.

use std::io;
use std::path::{Path, PathBuf};

use aet_core::{ActivityDocument, ActivityLoader, LapFields, LoadError, SourceId, TrackpointFields};
use roxmltree::{Document, Node};
use thiserror::Error;

const ROOT_ELEMENT: &str = "TrainingCenterDatabase";

/// TCX reader errors.
#[derive(Debug, Error)]
pub enum TcxError {
    /// The file does not exist.
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// The file exists but could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The file was read but is not UTF-8 text.
    #[error("{} is not UTF-8 text: {source}", path.display())]
    Encoding {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The content is not well-formed XML.
    #[error("invalid XML: {0}")]
    Xml(#[from] roxmltree::Error),
    /// Well-formed XML, but not a training center document.
    #[error("not a TCX document (root element is {root:?})")]
    NotTcx { root: String },
}

impl TcxError {
    /// Whether the source itself could not be read, as opposed to being malformed.
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Io { .. })
    }
}

impl From<TcxError> for LoadError {
    fn from(err: TcxError) -> Self {
        if err.is_unavailable() {
            Self::Unavailable(err.to_string())
        } else {
            Self::Malformed(err.to_string())
        }
    }
}

/// Parses TCX text into an activity document.
///
/// # Errors
///
/// Returns an error if the text is not well-formed XML or its root element is
/// not `TrainingCenterDatabase`.
pub fn parse_str(text: &str) -> Result<ActivityDocument, TcxError> {
    let xml = Document::parse(text)?;
    let root = xml.root_element();
    if root.tag_name().name() != ROOT_ELEMENT {
        return Err(TcxError::NotTcx {
            root: root.tag_name().name().to_string(),
        });
    }

    let laps: Vec<LapFields> = root
        .descendants()
        .filter(|node| is_named(*node, "Lap"))
        .map(read_lap)
        .collect();
    tracing::debug!(laps = laps.len(), "parsed TCX document");
    Ok(ActivityDocument { laps })
}

/// Reads and parses a TCX file.
///
/// # Errors
///
/// Returns [`TcxError::NotFound`] or [`TcxError::Io`] if the file cannot be
/// read, [`TcxError::Encoding`] if it is not UTF-8, otherwise the errors of
/// [`parse_str`].
pub fn read_file(path: &Path) -> Result<ActivityDocument, TcxError> {
    let path_buf = path.to_path_buf();
    let text = std::fs::read_to_string(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => TcxError::NotFound(path_buf),
        io::ErrorKind::InvalidData => TcxError::Encoding {
            path: path_buf,
            source,
        },
        _ => TcxError::Io {
            path: path_buf,
            source,
        },
    })?;
    parse_str(&text)
}

/// Loads sources as TCX file paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcxLoader;

impl ActivityLoader for TcxLoader {
    fn load(&self, source: &SourceId) -> Result<ActivityDocument, LoadError> {
        Ok(read_file(source.as_path())?)
    }
}

fn read_lap(lap: Node<'_, '_>) -> LapFields {
    LapFields {
        total_time_seconds: child_text(lap, "TotalTimeSeconds"),
        distance_meters: child_text(lap, "DistanceMeters"),
        trackpoints: lap
            .descendants()
            .filter(|node| is_named(*node, "Trackpoint"))
            .map(read_trackpoint)
            .collect(),
    }
}

fn read_trackpoint(point: Node<'_, '_>) -> TrackpointFields {
    let position = child(point, "Position");
    TrackpointFields {
        time: child_text(point, "Time"),
        distance_meters: child_text(point, "DistanceMeters"),
        heart_rate_bpm: child(point, "HeartRateBpm").and_then(|hr| child_text(hr, "Value")),
        longitude_degrees: position.and_then(|p| child_text(p, "LongitudeDegrees")),
        latitude_degrees: position.and_then(|p| child_text(p, "LatitudeDegrees")),
    }
}

fn is_named(node: Node<'_, '_>, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|c| is_named(*c, name))
}

/// Trimmed text of a direct child; `None` if absent or blank.
fn child_text(node: Node<'_, '_>, name: &str) -> Option<String> {
    let text = child(node, name)?.text()?.trim();
    (!text.is_empty()).then(|| text.to_string())
}
