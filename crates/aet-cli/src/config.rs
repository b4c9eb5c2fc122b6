//! Configuration loading and management.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use aet_core::{FixedTimezone, TimezoneLookup, ZoneSpec};

/// Value of `timezone` that selects the system zone.
pub const SYSTEM_TIMEZONE: &str = "system";

/// Application configuration.
///
/// Command-line flags take precedence over every field here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Comma-separated heart-rate zone boundaries in bpm.
    pub zones: String,
    /// Treadmill pace in minutes per mile; replaces GPS speed when set.
    pub treadmill_pace: Option<f64>,
    /// Report lap times in local time instead of UTC.
    pub local_time: bool,
    /// Zone for local time: an IANA name, or `system`.
    pub timezone: Option<String>,
    /// Print column headers.
    pub headers: bool,
    /// Process files in parallel.
    pub parallel: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            zones: ZoneSpec::default().to_string(),
            treadmill_pace: None,
            local_time: false,
            timezone: None,
            headers: false,
            parallel: false,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (AET_*)
        figment = figment.merge(Env::prefixed("AET_"));

        figment.extract()
    }

    /// Builds the timezone lookup used for local lap times.
    ///
    /// A configured zone always wins. Without one, positions are resolved
    /// from the embedded boundary data when the `geo-tz` feature is built,
    /// otherwise there is no lookup and local time degrades to UTC.
    pub fn timezone_lookup(&self) -> Result<Option<Box<dyn TimezoneLookup>>> {
        let Some(name) = self.timezone.as_deref() else {
            return Ok(position_lookup());
        };

        if name.trim() == SYSTEM_TIMEZONE {
            return Ok(system_timezone().map(|tz| Box::new(tz) as Box<dyn TimezoneLookup>));
        }
        match FixedTimezone::from_name(name) {
            Some(tz) => Ok(Some(Box::new(tz))),
            None => bail!("unknown timezone {name:?}"),
        }
    }
}

/// Checks a treadmill pace from the command line.
pub fn parse_pace(value: &str) -> Result<f64, String> {
    let pace: f64 = value
        .parse()
        .map_err(|_| format!("{value:?} is not a number"))?;
    validate_pace(pace).map_err(|e| e.to_string())
}

/// A pace must be a positive, finite number of minutes per mile.
pub fn validate_pace(pace: f64) -> Result<f64> {
    if !pace.is_finite() || pace <= 0.0 {
        bail!("treadmill pace must be a positive number of minutes per mile, got {pace}");
    }
    Ok(pace)
}

fn system_timezone() -> Option<FixedTimezone> {
    let name = iana_time_zone::get_timezone()
        .inspect_err(|e| tracing::warn!(error = %e, "failed to detect system timezone"))
        .ok()?;
    let tz = FixedTimezone::from_name(&name);
    if tz.is_none() {
        tracing::warn!(timezone = %name, "system timezone is not a known IANA zone");
    }
    tz
}

#[cfg(feature = "geo-tz")]
fn position_lookup() -> Option<Box<dyn TimezoneLookup>> {
    Some(Box::new(aet_core::GeoTimezone::new()))
}

#[cfg(not(feature = "geo-tz"))]
fn position_lookup() -> Option<Box<dyn TimezoneLookup>> {
    None
}

/// Returns the platform-specific config directory for aet.
///
/// On Linux: `~/.config/aet`
pub fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("aet"))
}

/// Loads config with context for the binary.
pub fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}
