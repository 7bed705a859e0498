//! CLI configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/fivecut/cli.toml`
//! - Windows: `%APPDATA%/fivecut/cli.toml`

use std::path::{Path, PathBuf};
use std::sync::Arc;

use fivecut_coordinator::{CredentialSource, EnvCredential, NoCredential, StaticCredential};
use fivecut_transfer::{DEFAULT_CHUNK_SIZE, DEFAULT_CONCURRENCY};
use fivecut_uploader::UploadOptions;
use serde::{Deserialize, Serialize};

/// Environment variable that overrides the stored ID token.
pub const TOKEN_ENV: &str = "FIVECUT_ID_TOKEN";

/// CLI configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Coordination service base URL.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Part size in bytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,

    /// Parts in flight at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// ID token sent with coordinator requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

fn default_api_base() -> String {
    fivecut_coordinator::DEFAULT_BASE_URL.into()
}

fn default_chunk_size() -> u64 {
    DEFAULT_CHUNK_SIZE
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            chunk_size: default_chunk_size(),
            concurrency: default_concurrency(),
            id_token: None,
        }
    }
}

impl Config {
    /// Loads the default config file, creating it if not found.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&config_path()?)
    }

    /// Loads `path`, writing defaults there if it does not exist.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Saves the configuration to `path`.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // The file may hold a token.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    pub fn upload_options(&self) -> UploadOptions {
        UploadOptions::default()
            .with_chunk_size(self.chunk_size)
            .with_concurrency(self.concurrency)
    }

    /// Credential for coordinator requests: the environment first, then
    /// the stored token.
    pub fn credentials(&self) -> Arc<dyn CredentialSource> {
        if std::env::var(TOKEN_ENV).is_ok_and(|t| !t.is_empty()) {
            return Arc::new(EnvCredential::new(TOKEN_ENV));
        }
        match self.id_token.as_deref() {
            Some(token) if !token.is_empty() => Arc::new(StaticCredential::new(token)),
            _ => Arc::new(NoCredential),
        }
    }
}

/// Returns the platform-specific configuration file path.
pub fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let appdata = std::env::var("APPDATA")
            .map_err(|_| anyhow::anyhow!("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata).join("fivecut").join("cli.toml"))
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("fivecut")
            .join("cli.toml"))
    }
}
