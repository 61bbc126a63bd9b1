//! Collector configuration
//!
//! One YAML document with a section per engine stage. Identity and endpoint values are usually
//! supplied per deployment, so they can also come from `SIGNALTAP_*` environment variables.

use std::path::{Path, PathBuf};

use content_tree::ContentConfig;
use engagement_tracker::{DwellTiers, TrackerConfig};
use serde::{Deserialize, Serialize};
use signal_dispatch::DispatchConfig;
use signaltap_core_types::{Identity, Millis, ProfileId, SessionId, SourceId};
use tokio::fs;
use tracing::{debug, info, warn};
use url::Url;

use crate::errors::ConfigError;

pub const ENV_ENDPOINT: &str = "SIGNALTAP_ENDPOINT";
pub const ENV_SOURCE_ID: &str = "SIGNALTAP_SOURCE_ID";
pub const ENV_PROFILE_ID: &str = "SIGNALTAP_PROFILE_ID";
pub const ENV_SESSION_ID: &str = "SIGNALTAP_SESSION_ID";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub content: ContentConfig,
    pub visibility: VisibilitySettings,
    pub interaction: InteractionSettings,
    pub dispatch: DispatchConfig,
    pub identity: IdentitySettings,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisibilitySettings {
    /// Intersection ratio at or above which an element counts as visible.
    pub threshold: f64,
    pub dwell_tiers: DwellTiers,
}

impl Default for VisibilitySettings {
    fn default() -> Self {
        Self {
            threshold: 0.65,
            dwell_tiers: DwellTiers::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionSettings {
    /// Hovers must last longer than this to be credited.
    pub hover_min_ms: Millis,
}

impl Default for InteractionSettings {
    fn default() -> Self {
        Self { hover_min_ms: 300 }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentitySettings {
    pub profile_id: Option<ProfileId>,
    pub session_id: Option<SessionId>,
}

impl CollectorConfig {
    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            content: self.content.clone(),
            visibility_threshold: self.visibility.threshold,
            dwell_tiers: self.visibility.dwell_tiers,
            hover_min_ms: self.interaction.hover_min_ms,
        }
    }

    pub fn identity(&self) -> Identity {
        Identity::new(
            self.identity.profile_id.clone(),
            self.identity.session_id.clone(),
        )
    }

    /// Checks the values the engine cannot work with. Missing endpoint or ids are not errors:
    /// flushes are skipped until they show up.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.visibility.threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "visibility.threshold must be in (0, 1], got {threshold}"
            )));
        }
        if !self.visibility.dwell_tiers.is_ascending() {
            return Err(ConfigError::Invalid(
                "visibility.dwell_tiers must be strictly ascending".into(),
            ));
        }
        if self.dispatch.debounce_ms == 0 {
            return Err(ConfigError::Invalid("dispatch.debounce_ms must be positive".into()));
        }
        if self.dispatch.retry_limit == 0 {
            return Err(ConfigError::Invalid("dispatch.retry_limit must be positive".into()));
        }
        if self.dispatch.max_pending == 0 {
            return Err(ConfigError::Invalid("dispatch.max_pending must be positive".into()));
        }
        Ok(())
    }

    /// Applies `SIGNALTAP_*` overrides read through `lookup`. Blank values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |name: &str| lookup(name).filter(|raw| !raw.trim().is_empty());

        if let Some(raw) = value(ENV_ENDPOINT) {
            let endpoint = Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidEndpoint {
                var: ENV_ENDPOINT.to_string(),
                source,
            })?;
            debug!(%endpoint, "endpoint taken from environment");
            self.dispatch.endpoint = Some(endpoint);
        }
        if let Some(source) = value(ENV_SOURCE_ID).and_then(SourceId::parse) {
            self.dispatch.source_id = Some(source);
        }
        if let Some(profile) = value(ENV_PROFILE_ID).and_then(ProfileId::parse) {
            self.identity.profile_id = Some(profile);
        }
        if let Some(session) = value(ENV_SESSION_ID).and_then(SessionId::parse) {
            self.identity.session_id = Some(session);
        }
        Ok(())
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }
}

pub struct LoadedConfig {
    pub config: CollectorConfig,
    pub path: PathBuf,
    /// False when the file was missing and defaults were used.
    pub from_file: bool,
}

/// `<config dir>/signaltap/config.yaml`.
pub fn default_config_path() -> Option<PathBuf> {
    let mut path = dirs::config_dir()?;
    path.push("signaltap");
    path.push("config.yaml");
    Some(path)
}

/// Loads `config_path` (or the default location), then applies environment overrides and
/// validates the result. A missing file falls back to defaults with a warning.
pub async fn load_config(config_path: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => default_config_path()
            .ok_or_else(|| ConfigError::Invalid("no configuration directory available".into()))?,
    };

    let exists = fs::try_exists(&path)
        .await
        .map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;

    let mut config = if exists {
        let raw = fs::read_to_string(&path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
        let config = parse_config(&raw, &path)?;
        info!("Loaded configuration from: {}", path.display());
        config
    } else {
        warn!("Config file not found, using defaults: {}", path.display());
        CollectorConfig::default()
    };

    config.apply_env_overrides()?;
    config.content = config.content.normalized();
    config.validate()?;
    Ok(LoadedConfig {
        config,
        path,
        from_file: exists,
    })
}

pub fn parse_config(raw: &str, path: &Path) -> Result<CollectorConfig, ConfigError> {
    if raw.trim().is_empty() {
        return Ok(CollectorConfig::default());
    }
    serde_yaml::from_str(raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let raw = "dispatch:\n  debounce_ms: 250\nvisibility:\n  threshold: 0.5\n";
        let config = parse_config(raw, Path::new("inline.yaml")).unwrap();
        assert_eq!(config.dispatch.debounce_ms, 250);
        assert_eq!(config.dispatch.retry_limit, 5);
        assert_eq!(config.visibility.threshold, 0.5);
        assert_eq!(config.visibility.dwell_tiers, DwellTiers::default());
        assert_eq!(config.interaction.hover_min_ms, 300);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn overrides_fill_identity_and_endpoint() {
        let mut config = CollectorConfig::default();
        config
            .apply_overrides(env(&[
                (ENV_ENDPOINT, "https://collector.test/v1/signals"),
                (ENV_SOURCE_ID, "news-site"),
                (ENV_PROFILE_ID, "profile-7"),
                (ENV_SESSION_ID, "   "),
            ]))
            .unwrap();
        assert_eq!(
            config.dispatch.endpoint.as_ref().map(Url::as_str),
            Some("https://collector.test/v1/signals")
        );
        assert_eq!(config.dispatch.source_id, SourceId::parse("news-site"));
        let identity = config.identity();
        assert_eq!(identity.profile, ProfileId::parse("profile-7"));
        assert!(identity.session.is_none());
        assert!(!identity.is_complete());
    }

    #[test]
    fn malformed_endpoint_is_rejected() {
        let mut config = CollectorConfig::default();
        let err = config
            .apply_overrides(env(&[(ENV_ENDPOINT, "not a url")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEndpoint { .. }));
    }

    #[test]
    fn validation_catches_unusable_values() {
        let mut config = CollectorConfig::default();
        config.visibility.threshold = 0.0;
        assert!(config.validate().is_err());

        let mut config = CollectorConfig::default();
        config.visibility.dwell_tiers.scan_ms = config.visibility.dwell_tiers.read_ms;
        assert!(config.validate().is_err());

        let mut config = CollectorConfig::default();
        config.dispatch.debounce_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn tracker_config_carries_every_section() {
        let mut config = CollectorConfig::default();
        config.visibility.threshold = 0.8;
        config.interaction.hover_min_ms = 150;
        let tracker = config.tracker_config();
        assert_eq!(tracker.visibility_threshold, 0.8);
        assert_eq!(tracker.hover_min_ms, 150);
        assert_eq!(tracker.content, config.content);
    }
}
