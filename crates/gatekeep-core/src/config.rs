//! Application configuration management.
//!
//! This module handles loading and saving the configuration, which includes
//! the gateway URL, how sign-in talks to it, where the credential is kept, and
//! the last email used to sign in.
//!
//! Configuration is stored at `~/.config/gatekeep/config.json`. The
//! `GATEKEEP_API_URL` and `GATEKEEP_CREDENTIAL_BACKEND` environment variables
//! override the file.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::auth::{CredentialStore, FileCredentialStore, KeyringCredentialStore, MemoryCredentialStore};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "gatekeep";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Gateway used when nothing is configured
const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/api";

/// HTTP request timeout in seconds.
/// Timeouts surface as ordinary transport failures.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub const API_URL_ENV: &str = "GATEKEEP_API_URL";
pub const CREDENTIAL_BACKEND_ENV: &str = "GATEKEEP_CREDENTIAL_BACKEND";

/// How sign-in is performed against the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignInMode {
    /// `POST /auth/login` returning a token
    #[default]
    Login,
    /// `GET /users?email=` and compare passwords locally (mock backends only)
    AccountLookup,
}

/// Where the bearer credential is persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialBackend {
    Keyring,
    #[default]
    File,
    Memory,
}

impl FromStr for CredentialBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "keyring" => Ok(CredentialBackend::Keyring),
            "file" => Ok(CredentialBackend::File),
            "memory" => Ok(CredentialBackend::Memory),
            other => Err(anyhow::anyhow!("Unknown credential backend: {}", other)),
        }
    }
}

impl fmt::Display for CredentialBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CredentialBackend::Keyring => "keyring",
            CredentialBackend::File => "file",
            CredentialBackend::Memory => "memory",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub sign_in_mode: SignInMode,
    pub credential_backend: CredentialBackend,
    pub request_timeout_secs: u64,
    pub log_dir: Option<PathBuf>,
    pub last_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            sign_in_mode: SignInMode::default(),
            credential_backend: CredentialBackend::default(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            log_dir: None,
            last_email: None,
        }
    }
}

impl Config {
    /// Load from the default location, then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(
            std::env::var(API_URL_ENV).ok(),
            std::env::var(CREDENTIAL_BACKEND_ENV).ok(),
        );
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Record the last email used to sign in.
    ///
    /// Written onto the config as stored on disk, so environment overrides
    /// in effect for this run are never persisted.
    pub fn remember_email(email: &str) -> Result<()> {
        Self::remember_email_at(&Self::config_path()?, email)
    }

    pub fn remember_email_at(path: &Path, email: &str) -> Result<()> {
        let mut stored = Self::load_from(path)?;
        stored.last_email = Some(email.to_string());
        stored.save_to(path)
    }

    /// Apply environment overrides. Blank values are ignored, as is an
    /// unknown backend name (with a warning).
    pub fn apply_overrides(&mut self, api_url: Option<String>, backend: Option<String>) {
        if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
            self.api_base_url = url.trim().to_string();
        }
        if let Some(name) = backend.filter(|b| !b.trim().is_empty()) {
            match name.parse() {
                Ok(backend) => self.credential_backend = backend,
                Err(e) => warn!(error = %e, "Ignoring credential backend override"),
            }
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Open the configured credential store
    pub fn open_credential_store(&self) -> Result<Box<dyn CredentialStore>> {
        let store: Box<dyn CredentialStore> = match self.credential_backend {
            CredentialBackend::Keyring => Box::new(KeyringCredentialStore::new()?),
            CredentialBackend::File => Box::new(FileCredentialStore::new(self.cache_dir()?)),
            CredentialBackend::Memory => Box::new(MemoryCredentialStore::new()),
        };
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.sign_in_mode, SignInMode::Login);
        assert_eq!(config.credential_backend, CredentialBackend::File);
        assert_eq!(config.request_timeout_secs, 30);
        assert!(config.last_email.is_none());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gatekeep").join(CONFIG_FILE);

        let config = Config {
            api_base_url: "https://auth.example.com".to_string(),
            sign_in_mode: SignInMode::AccountLookup,
            credential_backend: CredentialBackend::Memory,
            last_email: Some("a@x.com".to_string()),
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains(r#""sign_in_mode": "account-lookup""#));

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.api_base_url, "https://auth.example.com");
        assert_eq!(loaded.sign_in_mode, SignInMode::AccountLookup);
        assert_eq!(loaded.credential_backend, CredentialBackend::Memory);
        assert_eq!(loaded.last_email.as_deref(), Some("a@x.com"));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, r#"{"api_base_url":"https://auth.example.com"}"#).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.api_base_url, "https://auth.example.com");
        assert_eq!(loaded.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert_eq!(loaded.sign_in_mode, SignInMode::Login);
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = Config::default();
        config.apply_overrides(Some(" https://env.example.com ".to_string()), Some("memory".to_string()));
        assert_eq!(config.api_base_url, "https://env.example.com");
        assert_eq!(config.credential_backend, CredentialBackend::Memory);

        // Blank and unknown values leave the config alone
        config.apply_overrides(Some("  ".to_string()), Some("vault".to_string()));
        assert_eq!(config.api_base_url, "https://env.example.com");
        assert_eq!(config.credential_backend, CredentialBackend::Memory);
    }

    #[test]
    fn test_remember_email_keeps_overrides_out_of_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        Config {
            api_base_url: "https://auth.example.com".to_string(),
            ..Config::default()
        }
        .save_to(&path)
        .unwrap();

        let mut running = Config::load_from(&path).unwrap();
        running.apply_overrides(Some("https://staging.example.com".to_string()), Some("memory".to_string()));
        Config::remember_email_at(&path, "a@x.com").unwrap();
        assert_eq!(running.api_base_url, "https://staging.example.com");

        let stored = Config::load_from(&path).unwrap();
        assert_eq!(stored.api_base_url, "https://auth.example.com");
        assert_eq!(stored.credential_backend, CredentialBackend::File);
        assert_eq!(stored.last_email.as_deref(), Some("a@x.com"));

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(!contents.contains("staging"));
        assert!(!contents.contains(r#""memory""#));
    }

    #[test]
    fn test_remember_email_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gatekeep").join(CONFIG_FILE);

        Config::remember_email_at(&path, "a@x.com").unwrap();

        let stored = Config::load_from(&path).unwrap();
        assert_eq!(stored.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(stored.last_email.as_deref(), Some("a@x.com"));
    }

    #[test]
    fn test_credential_backend_from_str() {
        assert_eq!("Keyring".parse::<CredentialBackend>().unwrap(), CredentialBackend::Keyring);
        assert_eq!(" file ".parse::<CredentialBackend>().unwrap(), CredentialBackend::File);
        assert!("".parse::<CredentialBackend>().is_err());
        assert_eq!(CredentialBackend::Memory.to_string(), "memory");
    }

    #[test]
    fn test_open_memory_store() {
        let config = Config {
            credential_backend: CredentialBackend::Memory,
            ..Config::default()
        };
        let store = config.open_credential_store().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }
}
