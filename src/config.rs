use std::path::{Path, PathBuf};

use clap::Parser;
use log::info;
use serde::Deserialize;

use crate::{
    dispatcher::InvitationSettings,
    error::ConfigError,
    identity::{HashAlgorithm, IdentityHasher},
};

pub const DEFAULT_PORT: u16 = 8888;
/// Environment variable holding the whole application config as JSON.
pub const CONFIG_ENV: &str = "APP_CONFIG_STR";

#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Application config file, used when APP_CONFIG_STR is not set
    #[arg(short = 'c', long, env = "APP_CONFIG", default_value = "config.json")]
    pub config: PathBuf,

    /// Port to listen on, overrides general.port
    #[arg(short = 'p', long, env = "PORT")]
    pub port: Option<u16>,

    /// Store groups in this Redis instead of the database folder
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    /// Directory with the web client
    #[arg(long, env = "WEB_ROOT", default_value = "webroot")]
    pub webroot: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub security: SecurityConfig,
    pub invitation: InvitationConfig,
    pub database: DatabaseConfig,
    pub mail: MailConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GeneralConfig {
    pub app_url: String,
    pub port: Option<u16>,
    pub caching: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            app_url: format!("http://localhost:{DEFAULT_PORT}"),
            port: None,
            caching: true,
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub secret: String,
    /// Digest name, e.g. `SHA-256`.
    pub encryption: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            encryption: "SHA-256".to_string(),
        }
    }
}

impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("encryption", &self.encryption)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InvitationConfig {
    #[serde(alias = "fromAdress")]
    pub from_address: String,
}

impl Default for InvitationConfig {
    fn default() -> Self {
        Self {
            from_address: "noreply@localhost".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub folder: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("appState"),
        }
    }
}

pub const DEFAULT_SMTP_PORT: u16 = 587;

/// SMTP relay settings, with a pickup directory as the alternative. With
/// neither, invitations cannot be delivered.
#[derive(Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MailConfig {
    #[serde(alias = "host")]
    pub hostname: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Drop invitations as `.eml` files here instead of relaying them.
    pub pickup_dir: Option<PathBuf>,
}

impl MailConfig {
    pub fn smtp_port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_SMTP_PORT)
    }

    /// Login for the relay, when both halves are set.
    pub fn credentials(&self) -> Option<(String, String)> {
        self.username.clone().zip(self.password.clone())
    }
}

impl std::fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailConfig")
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("pickup_dir", &self.pickup_dir)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read the config from `APP_CONFIG_STR`, falling back to `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::env::var(CONFIG_ENV) {
            Ok(text) => {
                info!("Reading config from {CONFIG_ENV}");
                Self::from_json(&text)
            }
            Err(_) => {
                info!("Reading config from {}", path.display());
                Self::from_json(&std::fs::read_to_string(path)?)
            }
        }
    }

    /// CLI/env port first, then `general.port`, then the default.
    pub fn port(&self, args: &Args) -> u16 {
        args.port
            .or(self.general.port)
            .unwrap_or(DEFAULT_PORT)
    }

    pub fn identity_hasher(&self) -> Result<IdentityHasher, ConfigError> {
        let algorithm: HashAlgorithm = self.security.encryption.parse()?;
        Ok(IdentityHasher::new(algorithm, self.security.secret.clone()))
    }

    pub fn invitation_settings(&self) -> InvitationSettings {
        InvitationSettings {
            app_url: self.general.app_url.clone(),
            from_address: self.invitation.from_address.clone(),
        }
    }
}
