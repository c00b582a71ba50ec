//! Settings for a run, read from ~/.config/nhk-podcast-feed/config.toml.
//!
//! The file is optional: when it is missing or empty every setting takes its
//! built-in default. Unrecognized top-level keys are logged and skipped.
//! Command-line flags override whatever the file sets.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::feed::{ChannelMetadata, TransformOptions, DEFAULT_BITRATE_BPS};
use crate::util::{validate_url, UrlValidationError};

/// Feed republished when no source URL is given.
pub const DEFAULT_SOURCE_URL: &str = "https://nhkeasier.com/feed/";

/// Site that relative links and audio paths in the feed belong to.
pub const DEFAULT_BASE_URL: &str = "https://nhkeasier.com";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config file is not valid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: the file is over [`Config::MAX_FILE_SIZE`].
    #[error("Config file too large: {size} bytes (limit {limit})")]
    TooLarge { size: u64, limit: u64 },

    #[error("Invalid {field}: {source}")]
    InvalidUrl {
        field: &'static str,
        #[source]
        source: UrlValidationError,
    },

    #[error("Invalid {0}: must be greater than zero")]
    Zero(&'static str),
}

/// Every setting of a run. Keys missing from the file keep their defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// URL of the feed to republish.
    pub source_url: String,

    /// Site origin for resolving site-relative links and audio paths.
    pub base_url: String,

    /// Assumed MP3 bitrate for duration estimates, in bits per second.
    pub bitrate_bps: u64,

    /// Per-request timeout for the feed fetch and each size probe.
    pub timeout_secs: u64,

    /// Channel metadata added when the source feed lacks it.
    pub channel: ChannelMetadata,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_url: DEFAULT_SOURCE_URL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            bitrate_bps: DEFAULT_BITRATE_BPS,
            timeout_secs: 30,
            channel: ChannelMetadata::default(),
        }
    }
}

/// Top-level keys `Config` understands.
const KNOWN_KEYS: [&str; 5] = [
    "source_url",
    "base_url",
    "bitrate_bps",
    "timeout_secs",
    "channel",
];

impl Config {
    /// SEC-014: config files larger than this are refused unread.
    pub const MAX_FILE_SIZE: u64 = 1024 * 1024;

    /// Default config location: `$HOME/.config/nhk-podcast-feed/config.toml`.
    ///
    /// Returns `None` when `HOME` is not set.
    pub fn default_path() -> Option<PathBuf> {
        let home = std::env::var_os("HOME")?;
        Some(
            PathBuf::from(home)
                .join(".config")
                .join("nhk-podcast-feed")
                .join("config.toml"),
        )
    }

    /// Reads settings from `path`.
    ///
    /// A missing or blank file gives [`Config::default`]. Malformed TOML or a
    /// value of the wrong type is a [`ConfigError::Parse`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let Some(content) = read_capped(path)? else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        };
        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Blank config file, using defaults");
            return Ok(Self::default());
        }

        warn_unknown_keys(&content);

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), source = %config.source_url, "Loaded configuration");
        Ok(config)
    }

    /// Checks values that serde cannot: URL shape and non-zero numbers.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_url(&self.source_url).map_err(|source| ConfigError::InvalidUrl {
            field: "source_url",
            source,
        })?;
        validate_url(&self.base_url).map_err(|source| ConfigError::InvalidUrl {
            field: "base_url",
            source,
        })?;
        if self.bitrate_bps == 0 {
            return Err(ConfigError::Zero("bitrate_bps"));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Zero("timeout_secs"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Builds the transformer settings, validating the base URL.
    pub fn transform_options(&self) -> Result<TransformOptions, ConfigError> {
        let base_url = validate_url(&self.base_url).map_err(|source| ConfigError::InvalidUrl {
            field: "base_url",
            source,
        })?;
        Ok(TransformOptions {
            base_url,
            bitrate_bps: self.bitrate_bps,
            channel: self.channel.clone(),
        })
    }
}

/// Reads the file if it exists, refusing anything over the size limit.
fn read_capped(path: &Path) -> Result<Option<String>, ConfigError> {
    let size = match std::fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if size > Config::MAX_FILE_SIZE {
        return Err(ConfigError::TooLarge {
            size,
            limit: Config::MAX_FILE_SIZE,
        });
    }

    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        // Removed after the metadata call
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Logs top-level keys that would otherwise be dropped silently, usually typos.
fn warn_unknown_keys(content: &str) {
    let Ok(table) = content.parse::<toml::Table>() else {
        return;
    };
    for key in table.keys().filter(|k| !KNOWN_KEYS.contains(&k.as_str())) {
        tracing::warn!(key = %key, "Ignoring unknown config key");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// A config file in its own temp directory, removed on drop.
    struct TempConfig {
        dir: PathBuf,
        path: PathBuf,
    }

    impl TempConfig {
        fn new(name: &str, content: &str) -> Self {
            let dir = std::env::temp_dir().join(format!("nhk_podcast_feed_config_{name}"));
            std::fs::create_dir_all(&dir).unwrap();
            let path = dir.join("config.toml");
            std::fs::write(&path, content).unwrap();
            Self { dir, path }
        }

        fn load(&self) -> Result<Config, ConfigError> {
            Config::load(&self.path)
        }
    }

    impl Drop for TempConfig {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert_eq!(config.source_url, "https://nhkeasier.com/feed/");
        assert_eq!(config.base_url, "https://nhkeasier.com");
        assert_eq!(config.bitrate_bps, 192_000);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.channel, ChannelMetadata::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_absent_file_gives_defaults() {
        let path = std::env::temp_dir()
            .join("nhk_podcast_feed_config_absent")
            .join("config.toml");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.source_url, DEFAULT_SOURCE_URL);
    }

    #[test]
    fn test_blank_file_gives_defaults() {
        let file = TempConfig::new("blank", "\n   \n");
        assert_eq!(file.load().unwrap().base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let file = TempConfig::new("partial", "bitrate_bps = 128000\n[channel]\nauthor = \"Me\"\n");
        let config = file.load().unwrap();
        assert_eq!(config.bitrate_bps, 128_000);
        assert_eq!(config.channel.author, "Me");
        assert_eq!(config.channel.summary, "Audio version of NHK Easier articles");
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_every_key_read() {
        let file = TempConfig::new(
            "full",
            r#"
source_url = "https://mirror.example/feed/"
base_url = "https://mirror.example"
bitrate_bps = 64000
timeout_secs = 5

[channel]
author = "Mirror"
summary = "Mirrored audio"
explicit = "yes"
category = "Education"
"#,
        );
        let config = file.load().unwrap();
        assert_eq!(config.source_url, "https://mirror.example/feed/");
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(
            config.channel,
            ChannelMetadata {
                author: "Mirror".into(),
                summary: "Mirrored audio".into(),
                explicit: "yes".into(),
                category: "Education".into(),
            }
        );

        let options = config.transform_options().unwrap();
        assert_eq!(options.base_url.as_str(), "https://mirror.example/");
        assert_eq!(options.bitrate_bps, 64_000);
        assert_eq!(options.channel.category, "Education");
    }

    #[test]
    fn test_malformed_toml() {
        let file = TempConfig::new("malformed", "bitrate_bps = [192000");
        let err = file.load().unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("not valid TOML"));
    }

    #[test]
    fn test_unrecognized_keys_ignored() {
        let file = TempConfig::new("unknown", "bitrat_bps = 1\ntimeout_secs = 9\n[extra]\nx = 1\n");
        let config = file.load().unwrap();
        assert_eq!(config.bitrate_bps, DEFAULT_BITRATE_BPS);
        assert_eq!(config.timeout_secs, 9);
    }

    #[test]
    fn test_wrong_value_type() {
        let file = TempConfig::new("wrong_type", "timeout_secs = \"soon\"\n");
        assert!(matches!(file.load(), Err(ConfigError::Parse(_))));
    }

    // SEC-014
    #[test]
    fn test_oversized_file_refused() {
        let file = TempConfig::new("oversized", &"#".repeat(Config::MAX_FILE_SIZE as usize + 1));
        match file.load() {
            Err(ConfigError::TooLarge { size, limit }) => {
                assert_eq!(size, Config::MAX_FILE_SIZE + 1);
                assert_eq!(limit, Config::MAX_FILE_SIZE);
            }
            other => panic!("expected TooLarge, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_bad_urls() {
        let config = Config {
            source_url: "ftp://nhkeasier.com/feed/".into(),
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidUrl { field: "source_url", .. })
        ));

        let config = Config {
            base_url: "nhkeasier.com".into(),
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidUrl { field: "base_url", .. })
        ));
        assert!(config.transform_options().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let config = Config {
            bitrate_bps: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Zero("bitrate_bps"))));

        let config = Config {
            timeout_secs: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Zero("timeout_secs"))));
    }

    #[test]
    fn test_default_path_under_home() {
        if let Some(path) = Config::default_path() {
            assert!(path.ends_with(".config/nhk-podcast-feed/config.toml"));
        }
    }
}
