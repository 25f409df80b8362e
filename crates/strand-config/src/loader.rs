use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::schema::StrandConfig;

/// Loads the Strand configuration from disk with env-var overrides.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Resolve the config path: explicit path > STRAND_CONFIG env >
    /// ~/.strand/strand.toml.
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("STRAND_CONFIG") {
            return PathBuf::from(p);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".strand")
            .join("strand.toml")
    }

    /// Load the config from disk, falling back to defaults when the file is
    /// missing, then apply env overrides and validate.
    pub fn load(path: Option<&Path>) -> strand_core::Result<StrandConfig> {
        let config_path = Self::resolve_path(path);
        let config = if config_path.exists() {
            info!(?config_path, "loading configuration");
            let raw = std::fs::read_to_string(&config_path)?;
            toml::from_str::<StrandConfig>(&raw).map_err(|e| {
                strand_core::StrandError::Config(format!(
                    "failed to parse {}: {}",
                    config_path.display(),
                    e
                ))
            })?
        } else {
            warn!(?config_path, "config file not found, using defaults");
            StrandConfig::default()
        };

        let config = Self::apply_env_overrides(config);

        match config.validate() {
            Ok(warnings) => {
                for w in &warnings {
                    warn!("{}", w);
                }
            }
            Err(e) => {
                return Err(strand_core::StrandError::Config(e));
            }
        }

        Ok(config)
    }

    /// Session secrets come from the environment when present, so they never
    /// have to live in the config file.
    fn apply_env_overrides(mut config: StrandConfig) -> StrandConfig {
        if let Ok(v) = std::env::var("STRAND_ACCOUNT_ID") {
            config.account.account_id = v;
        }
        if let Ok(v) = std::env::var("STRAND_SESSION_COOKIE") {
            config.account.session_cookie = v;
        }
        if let Ok(v) = std::env::var("STRAND_CSRF_TOKEN") {
            config.account.csrf_token = v;
        }
        if let Ok(v) = std::env::var("STRAND_CLAIM") {
            config.account.claim = Some(v);
        }
        if let Ok(v) = std::env::var("STRAND_DB_PATH") {
            config.storage.db_path = Some(PathBuf::from(v));
        }
        config
    }
}
