// Per-operation timeout configuration
//
// Every RPC exposed by the facades runs under its own deadline. Deadlines
// default to 30s (5s for the login exchange) and can be overridden with
// human-readable duration strings, parsed once at startup. A malformed
// override is fatal: it surfaces before any network activity.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Error;

pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(30);

/// One timed operation of the management API.
///
/// The string form (`"fs.write"`, `"uci.commitOrRevert"`, ...) is the key
/// accepted by [`TimeoutConfig::parse`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::IntoStaticStr,
)]
pub enum Operation {
    #[strum(serialize = "auth")]
    Auth,

    #[strum(serialize = "fs.write")]
    FsWrite,
    #[strum(serialize = "fs.read")]
    FsRead,
    #[strum(serialize = "fs.remove")]
    FsRemove,

    #[strum(serialize = "opkg.update")]
    OpkgUpdate,
    #[strum(serialize = "opkg.check")]
    OpkgCheck,
    #[strum(serialize = "opkg.install")]
    OpkgInstall,
    #[strum(serialize = "opkg.remove")]
    OpkgRemove,

    #[strum(serialize = "service.list")]
    ServiceList,
    #[strum(serialize = "service.isEnabled")]
    ServiceIsEnabled,
    #[strum(serialize = "service.enable")]
    ServiceEnable,
    #[strum(serialize = "service.disable")]
    ServiceDisable,
    #[strum(serialize = "service.start")]
    ServiceStart,
    #[strum(serialize = "service.stop")]
    ServiceStop,
    #[strum(serialize = "service.restart")]
    ServiceRestart,

    #[strum(serialize = "uci.getAll")]
    UciGetAll,
    #[strum(serialize = "uci.tset")]
    UciTSet,
    #[strum(serialize = "uci.add")]
    UciAdd,
    #[strum(serialize = "uci.delete")]
    UciDelete,
    #[strum(serialize = "uci.commitOrRevert")]
    UciCommitOrRevert,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    pub fn default_timeout(self) -> Duration {
        match self {
            Self::Auth => DEFAULT_AUTH_TIMEOUT,
            _ => DEFAULT_RPC_TIMEOUT,
        }
    }
}

// ── Resolved configuration ──────────────────────────────────────────

/// Resolved deadlines, one per [`Operation`].
///
/// Only overrides are stored; everything else falls back to
/// [`Operation::default_timeout`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeoutConfig {
    overrides: HashMap<Operation, Duration>,
}

impl TimeoutConfig {
    /// The deadline for `operation`.
    pub fn get(&self, operation: Operation) -> Duration {
        self.overrides
            .get(&operation)
            .copied()
            .unwrap_or_else(|| operation.default_timeout())
    }

    /// Builder-style override.
    pub fn with(mut self, operation: Operation, timeout: Duration) -> Self {
        self.overrides.insert(operation, timeout);
        self
    }

    pub fn set(&mut self, operation: Operation, timeout: Duration) {
        self.overrides.insert(operation, timeout);
    }

    /// Parse `(operation name, duration string)` pairs.
    ///
    /// ```
    /// # use openwrt_api::{Operation, TimeoutConfig};
    /// # use std::time::Duration;
    /// let timeouts = TimeoutConfig::parse([("opkg.update", "2m"), ("auth", "10s")]).unwrap();
    /// assert_eq!(timeouts.get(Operation::OpkgUpdate), Duration::from_secs(120));
    /// assert_eq!(timeouts.get(Operation::FsRead), Duration::from_secs(30));
    /// ```
    pub fn parse<'a, I>(entries: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut config = Self::default();
        for (key, value) in entries {
            let operation = Operation::from_str(key.trim())
                .map_err(|_| Error::UnknownOperation(key.to_owned()))?;
            config.set(operation, parse_duration(operation, value)?);
        }
        Ok(config)
    }

    /// Resolve the nested override model loaded from configuration files.
    pub fn from_overrides(overrides: &TimeoutOverrides) -> Result<Self, Error> {
        let mut config = Self::default();
        for (operation, value) in overrides.entries() {
            match value {
                Some(raw) => {
                    config.set(operation, parse_duration(operation, raw)?);
                    debug!(%operation, value = raw, "timeout override parsed");
                }
                None => debug!(%operation, "default timeout"),
            }
        }
        Ok(config)
    }
}

fn parse_duration(operation: Operation, raw: &str) -> Result<Duration, Error> {
    let invalid = |reason: String| Error::InvalidTimeout {
        operation: operation.to_string(),
        value: raw.to_owned(),
        reason,
    };
    let parsed = humantime::parse_duration(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    if parsed.is_zero() {
        return Err(invalid("duration must be greater than zero".into()));
    }
    Ok(parsed)
}

// ── Override model ──────────────────────────────────────────────────

/// Caller-supplied timeout overrides, as they appear in a config file:
///
/// ```toml
/// [timeouts]
/// auth = "10s"
///
/// [timeouts.opkg]
/// update_packages = "2m"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutOverrides {
    pub auth: Option<String>,
    pub fs: FsTimeoutOverrides,
    pub opkg: OpkgTimeoutOverrides,
    pub service: ServiceTimeoutOverrides,
    pub uci: UciTimeoutOverrides,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FsTimeoutOverrides {
    pub write_file: Option<String>,
    pub read_file: Option<String>,
    pub remove_file: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpkgTimeoutOverrides {
    pub update_packages: Option<String>,
    pub check_package: Option<String>,
    pub install_packages: Option<String>,
    pub remove_packages: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceTimeoutOverrides {
    pub list: Option<String>,
    pub is_enabled: Option<String>,
    pub enable: Option<String>,
    pub disable: Option<String>,
    pub start: Option<String>,
    pub stop: Option<String>,
    pub restart: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UciTimeoutOverrides {
    pub get_all: Option<String>,
    pub t_set: Option<String>,
    pub add: Option<String>,
    pub delete: Option<String>,
    pub commit_or_revert: Option<String>,
}

impl TimeoutOverrides {
    /// Every operation paired with its raw override, if any.
    pub fn entries(&self) -> Vec<(Operation, Option<&str>)> {
        let Self {
            auth,
            fs,
            opkg,
            service,
            uci,
        } = self;
        vec![
            (Operation::Auth, auth.as_deref()),
            (Operation::FsWrite, fs.write_file.as_deref()),
            (Operation::FsRead, fs.read_file.as_deref()),
            (Operation::FsRemove, fs.remove_file.as_deref()),
            (Operation::OpkgUpdate, opkg.update_packages.as_deref()),
            (Operation::OpkgCheck, opkg.check_package.as_deref()),
            (Operation::OpkgInstall, opkg.install_packages.as_deref()),
            (Operation::OpkgRemove, opkg.remove_packages.as_deref()),
            (Operation::ServiceList, service.list.as_deref()),
            (Operation::ServiceIsEnabled, service.is_enabled.as_deref()),
            (Operation::ServiceEnable, service.enable.as_deref()),
            (Operation::ServiceDisable, service.disable.as_deref()),
            (Operation::ServiceStart, service.start.as_deref()),
            (Operation::ServiceStop, service.stop.as_deref()),
            (Operation::ServiceRestart, service.restart.as_deref()),
            (Operation::UciGetAll, uci.get_all.as_deref()),
            (Operation::UciTSet, uci.t_set.as_deref()),
            (Operation::UciAdd, uci.add.as_deref()),
            (Operation::UciDelete, uci.delete.as_deref()),
            (Operation::UciCommitOrRevert, uci.commit_or_revert.as_deref()),
        ]
    }
}
