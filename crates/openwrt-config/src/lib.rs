//! Profile configuration for `openwrt-api` consumers.
//!
//! TOML profiles layered with `OPENWRT_` environment variables, credential
//! resolution (env + password env var + plaintext), and translation into an
//! authenticated [`openwrt_api::Client`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

use openwrt_api::{Client, TimeoutConfig, TimeoutOverrides, TlsMode, TransportConfig};

/// Environment overrides, checked before anything in the profile.
pub const REMOTE_ENV: &str = "OPENWRT_REMOTE";
pub const USER_ENV: &str = "OPENWRT_USER";
pub const PASSWORD_ENV: &str = "OPENWRT_PASSWORD";

const DEFAULT_PROFILE: &str = "default";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Api(#[from] openwrt_api::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named explicitly.
    pub default_profile: Option<String>,

    /// Named device profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some(DEFAULT_PROFILE.into()),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// The profile called `name`, else the default profile.
    ///
    /// A name with no profile behind it resolves to an empty profile, so a
    /// device can be configured from the environment alone.
    pub fn profile(&self, name: Option<&str>) -> (String, Profile) {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or(DEFAULT_PROFILE)
            .to_owned();
        let profile = self.profiles.get(&name).cloned().unwrap_or_default();
        (name, profile)
    }
}

/// A named device profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Profile {
    /// Device base URL (e.g., "https://192.168.1.1").
    pub remote: Option<String>,

    /// Login user, usually `root`.
    pub user: Option<String>,

    /// Login password (plaintext, prefer `password_env`).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Accept self-signed certificates. Unset means accept, as stock
    /// images ship one.
    pub insecure: Option<bool>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// TCP connect timeout in seconds.
    pub connect_timeout: Option<u64>,

    /// Per-operation RPC deadlines.
    #[serde(skip_serializing_if = "is_default")]
    pub timeouts: TimeoutOverrides,
}

fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "openwrt", "openwrt-api").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("openwrt-api");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the full Config from `path` + environment.
///
/// `OPENWRT_PROFILES__HOME__USER=admin` sets `profiles.home.user`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("OPENWRT_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Connection settings ─────────────────────────────────────────────

/// Everything needed to build and authenticate a client.
#[derive(Debug)]
pub struct ConnectionSettings {
    pub remote: Url,
    pub username: String,
    pub password: SecretString,
    pub transport: TransportConfig,
    pub timeouts: TimeoutConfig,
}

impl ConnectionSettings {
    /// Resolve `profile` against the process environment.
    pub fn resolve(profile: &Profile, profile_name: &str) -> Result<Self, ConfigError> {
        Self::resolve_with(profile, profile_name, |key| std::env::var(key).ok())
    }

    /// Resolve `profile`, reading environment variables through `lookup`.
    ///
    /// Timeout overrides are parsed here, so a malformed duration fails
    /// before any network activity.
    pub fn resolve_with<F>(profile: &Profile, profile_name: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_remote = lookup(REMOTE_ENV)
            .or_else(|| profile.remote.clone())
            .filter(|r| !r.trim().is_empty())
            .ok_or_else(|| ConfigError::Validation {
                field: "remote".into(),
                reason: format!("no remote address for profile '{profile_name}'"),
            })?;
        let remote = Url::parse(raw_remote.trim()).map_err(|e| ConfigError::Validation {
            field: "remote".into(),
            reason: format!("invalid URL {raw_remote:?}: {e}"),
        })?;

        let username = lookup(USER_ENV)
            .or_else(|| profile.user.clone())
            .ok_or_else(|| ConfigError::NoCredentials {
                profile: profile_name.into(),
            })?;
        let password = resolve_password(profile, profile_name, &lookup)?;

        let mut transport = TransportConfig::default().with_tls(tls_mode(profile));
        if let Some(secs) = profile.connect_timeout {
            transport.connect_timeout = Duration::from_secs(secs);
        }

        let timeouts = TimeoutConfig::from_overrides(&profile.timeouts)?;

        Ok(Self {
            remote,
            username,
            password,
            transport,
            timeouts,
        })
    }
}

fn resolve_password<F>(profile: &Profile, profile_name: &str, lookup: &F) -> Result<SecretString, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    // 1. Global env var
    if let Some(pw) = lookup(PASSWORD_ENV) {
        debug!(profile = profile_name, source = PASSWORD_ENV, "password resolved");
        return Ok(SecretString::from(pw));
    }

    // 2. Profile's password_env → env var lookup
    if let Some(ref env_name) = profile.password_env {
        if let Some(pw) = lookup(env_name) {
            debug!(profile = profile_name, source = %env_name, "password resolved");
            return Ok(SecretString::from(pw));
        }
    }

    // 3. Plaintext in config
    if let Some(ref pw) = profile.password {
        debug!(profile = profile_name, source = "config", "password resolved");
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

fn tls_mode(profile: &Profile) -> TlsMode {
    match (profile.insecure, &profile.ca_cert) {
        (Some(true), _) | (None, None) => TlsMode::DangerAcceptInvalid,
        (_, Some(ca_path)) => TlsMode::CustomCa(ca_path.clone()),
        (Some(false), None) => TlsMode::System,
    }
}

/// Build a client from `settings` and authenticate it once.
pub async fn connect(settings: &ConnectionSettings) -> Result<Client, ConfigError> {
    let client = Client::with_client(
        settings.transport.build_client()?,
        settings.remote.clone(),
        settings.timeouts.clone(),
    );
    client.authenticate(&settings.username, &settings.password).await?;
    Ok(client)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write as _;

    use openwrt_api::Operation;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    fn home() -> Profile {
        Profile {
            remote: Some("https://192.168.1.1".into()),
            user: Some("root".into()),
            password: Some("from-config".into()),
            ..Profile::default()
        }
    }

    #[test]
    fn profiles_load_from_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
default_profile = "home"

[profiles.home]
remote = "https://192.168.1.1"
user = "root"
password_env = "HOME_ROUTER_PW"
connect_timeout = 3

[profiles.home.timeouts]
auth = "10s"

[profiles.home.timeouts.opkg]
update_packages = "2m"
"#
        )
        .unwrap();

        let config = load_config_from(file.path()).unwrap();
        let (name, profile) = config.profile(None);
        assert_eq!(name, "home");
        assert_eq!(profile.user.as_deref(), Some("root"));
        assert_eq!(profile.timeouts.opkg.update_packages.as_deref(), Some("2m"));

        let settings =
            ConnectionSettings::resolve_with(&profile, &name, env(&[("HOME_ROUTER_PW", "s3cret")])).unwrap();
        assert_eq!(settings.password.expose_secret(), "s3cret");
        assert_eq!(settings.transport.connect_timeout, Duration::from_secs(3));
        assert_eq!(settings.timeouts.get(Operation::Auth), Duration::from_secs(10));
        assert_eq!(settings.timeouts.get(Operation::OpkgUpdate), Duration::from_secs(120));
        assert_eq!(settings.timeouts.get(Operation::FsRead), Duration::from_secs(30));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.default_profile.as_deref(), Some("default"));
        assert!(config.profiles.is_empty());
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.profiles.insert("home".into(), home());
        save_config_to(&config, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.profiles.get("home"), Some(&home()));
    }

    #[test]
    fn environment_overrides_profile() {
        let lookup = env(&[
            (REMOTE_ENV, "http://10.0.0.1"),
            (USER_ENV, "admin"),
            (PASSWORD_ENV, "from-env"),
        ]);
        let settings = ConnectionSettings::resolve_with(&home(), "home", lookup).unwrap();
        assert_eq!(settings.remote.as_str(), "http://10.0.0.1/");
        assert_eq!(settings.username, "admin");
        assert_eq!(settings.password.expose_secret(), "from-env");
    }

    #[test]
    fn plaintext_password_is_last_resort() {
        let settings = ConnectionSettings::resolve_with(&home(), "home", env(&[])).unwrap();
        assert_eq!(settings.password.expose_secret(), "from-config");
    }

    #[test]
    fn environment_alone_is_enough() {
        let lookup = env(&[
            (REMOTE_ENV, "https://router.lan"),
            (USER_ENV, "root"),
            (PASSWORD_ENV, "pw"),
        ]);
        let (name, profile) = Config::default().profile(None);
        let settings = ConnectionSettings::resolve_with(&profile, &name, lookup).unwrap();
        assert_eq!(settings.remote.host_str(), Some("router.lan"));
    }

    #[test]
    fn missing_remote_is_validation_error() {
        let profile = Profile {
            remote: None,
            ..home()
        };
        let err = ConnectionSettings::resolve_with(&profile, "home", env(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "remote"));
    }

    #[test]
    fn missing_password_is_no_credentials() {
        let profile = Profile {
            password: None,
            password_env: Some("UNSET_PW".into()),
            ..home()
        };
        let err = ConnectionSettings::resolve_with(&profile, "home", env(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::NoCredentials { ref profile } if profile == "home"));
    }

    #[test]
    fn malformed_timeout_fails_at_resolution() {
        let mut profile = home();
        profile.timeouts.uci.commit_or_revert = Some("soon".into());
        let err = ConnectionSettings::resolve_with(&profile, "home", env(&[])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Api(openwrt_api::Error::InvalidTimeout { ref value, .. }) if value == "soon"
        ));
    }

    #[test]
    fn tls_mode_follows_profile() {
        let mut profile = home();
        assert_eq!(tls_mode(&profile), TlsMode::DangerAcceptInvalid);

        profile.insecure = Some(false);
        assert_eq!(tls_mode(&profile), TlsMode::System);

        profile.ca_cert = Some(PathBuf::from("/etc/ssl/router.pem"));
        assert_eq!(tls_mode(&profile), TlsMode::CustomCa(PathBuf::from("/etc/ssl/router.pem")));

        profile.insecure = Some(true);
        assert_eq!(tls_mode(&profile), TlsMode::DangerAcceptInvalid);
    }
}
