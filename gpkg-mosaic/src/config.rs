use std::collections::BTreeMap;
use std::path::Path;

#[cfg(feature = "cli")]
use clap::ValueEnum;
use enum_display::EnumDisplay;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::{MosaicError, MosaicResult};

/// How to pick a zoom level when no level matches the requested resolution exactly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, EnumDisplay)]
#[serde(rename_all = "kebab-case")]
#[enum_display(case = "Kebab")]
#[cfg_attr(feature = "cli", derive(ValueEnum))]
pub enum OverviewPolicy {
    /// The level whose pixel size is closest to the requested resolution
    #[default]
    Nearest,
    /// Prefer the coarser level, reading fewer tiles
    FavorSpeed,
    /// Prefer the finer level, reading more detail
    FavorQuality,
}

/// What to do with a tile whose bytes cannot be decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, EnumDisplay)]
#[serde(rename_all = "kebab-case")]
#[enum_display(case = "Kebab")]
pub enum DecodeFailurePolicy {
    /// Log the problem and leave the tile area transparent
    #[default]
    Lenient,
    /// Abort the whole read
    Strict,
}

pub const DEFAULT_MAX_MOSAIC_PIXELS: u64 = 256 * 1024 * 1024;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MosaicConfig {
    /// Zoom level policy used when a request does not set one
    pub default_policy: OverviewPolicy,
    pub decode_failure: DecodeFailurePolicy,
    /// Decimate the tile-aligned image of a non-native level before cropping it to the request
    pub decimate_overviews: bool,
    /// Upper limit for the width times height of the tile-aligned image of a single read
    pub max_mosaic_pixels: u64,

    #[serde(flatten, skip_serializing)]
    pub unrecognized: BTreeMap<String, serde_yaml::Value>,
}

impl Default for MosaicConfig {
    fn default() -> Self {
        Self {
            default_policy: OverviewPolicy::default(),
            decode_failure: DecodeFailurePolicy::default(),
            decimate_overviews: false,
            max_mosaic_pixels: DEFAULT_MAX_MOSAIC_PIXELS,
            unrecognized: BTreeMap::new(),
        }
    }
}

impl MosaicConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Read a YAML configuration file, warning about keys that are not recognized.
    pub fn load(path: &Path) -> MosaicResult<Self> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| MosaicError::Io(e, path.display().to_string()))?;
        let config =
            Self::from_yaml(&yaml).map_err(|e| MosaicError::ConfigParse(path.to_path_buf(), e))?;
        for key in config.unrecognized.keys() {
            warn!("Ignoring unrecognized configuration key '{key}' in {}", path.display());
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parse_full() {
        let config = MosaicConfig::from_yaml(indoc! {"
            default_policy: favor-quality
            decode_failure: strict
            decimate_overviews: true
            max_mosaic_pixels: 1000000
        "})
        .unwrap();
        assert_eq!(
            config,
            MosaicConfig {
                default_policy: OverviewPolicy::FavorQuality,
                decode_failure: DecodeFailurePolicy::Strict,
                decimate_overviews: true,
                max_mosaic_pixels: 1_000_000,
                unrecognized: BTreeMap::new(),
            }
        );
    }

    #[test]
    fn parse_defaults_and_unknown_keys() {
        let config = MosaicConfig::from_yaml(indoc! {"
            default_policy: favor-speed
            cache_size: 10
        "})
        .unwrap();
        assert_eq!(config.default_policy, OverviewPolicy::FavorSpeed);
        assert_eq!(config.decode_failure, DecodeFailurePolicy::Lenient);
        assert_eq!(config.max_mosaic_pixels, DEFAULT_MAX_MOSAIC_PIXELS);
        assert_eq!(
            config.unrecognized.keys().collect::<Vec<_>>(),
            ["cache_size"]
        );
    }

    #[test]
    fn reject_unknown_policy() {
        assert!(MosaicConfig::from_yaml("default_policy: fastest").is_err());
    }

    #[test]
    fn policy_names() {
        assert_eq!(OverviewPolicy::FavorSpeed.to_string(), "favor-speed");
        assert_eq!(DecodeFailurePolicy::Lenient.to_string(), "lenient");
    }

    #[test]
    fn load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "decode_failure: strict").unwrap();
        let config = MosaicConfig::load(file.path()).unwrap();
        assert_eq!(config.decode_failure, DecodeFailurePolicy::Strict);

        let err = MosaicConfig::load(Path::new("/nonexistent/config.yaml")).unwrap_err();
        assert!(matches!(err, MosaicError::Io(..)));
    }

    #[test]
    fn load_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_mosaic_pixels: many").unwrap();
        let err = MosaicConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, MosaicError::ConfigParse(..)), "{err}");
        let message = err.to_string();
        let prefix = format!("Unable to parse configuration {}: ", file.path().display());
        assert!(message.starts_with(&prefix), "{message}");
    }
}
