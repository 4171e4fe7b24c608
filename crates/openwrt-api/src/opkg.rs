// Package manager facade (`ipkg` namespace)
//
// Index refresh, status lookup, install, and remove. Mutating calls reply
// with a positional array led by opkg's exit code. Status lookups reply
// with either a map of package records or, for names the package database
// has never heard of, a bare boolean array.
//
// This facade never checks before installing or removing: callers that
// want idempotence call `check_package` first.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::error::Error;
use crate::rpc::{RpcTransport, decode_reply, integral_code};
use crate::timeouts::Operation;

const NAMESPACE: &str = "ipkg";

/// Installed state and version of one package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    #[serde(rename = "Version", default)]
    pub version: String,
    #[serde(rename = "Status", default)]
    pub status: PackageStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageStatus {
    #[serde(default)]
    pub installed: bool,
}

impl PackageInfo {
    /// The record synthesized for a package unknown to the database.
    pub fn not_installed() -> Self {
        Self::default()
    }

    pub fn is_installed(&self) -> bool {
        self.status.installed
    }
}

/// The two reply shapes of `ipkg.status`, tried in order.
#[derive(Deserialize)]
#[serde(untagged)]
enum StatusReply {
    Known(HashMap<String, PackageInfo>),
    Unknown(Vec<bool>),
}

#[derive(Debug, Clone)]
pub struct OpkgFacade {
    rpc: RpcTransport,
}

impl OpkgFacade {
    pub(crate) fn new(rpc: RpcTransport) -> Self {
        Self { rpc }
    }

    /// Refresh the package index (`opkg update`).
    pub async fn update_packages(&self) -> Result<(), Error> {
        debug!("updating package index");
        let result = self
            .rpc
            .call(Operation::OpkgUpdate, NAMESPACE, "update", Vec::new())
            .await?;
        check_return_code(Operation::OpkgUpdate, &result)
    }

    /// Look up one package.
    ///
    /// A package the database does not know at all comes back as
    /// [`PackageInfo::not_installed`]; a map reply without `name` is
    /// [`Error::PackageNotFound`].
    pub async fn check_package(&self, name: &str) -> Result<PackageInfo, Error> {
        debug!(name, "checking package");
        let result = self
            .rpc
            .call(Operation::OpkgCheck, NAMESPACE, "status", vec![json!(name)])
            .await?;
        decode_status(name, result)
    }

    pub async fn install_packages(&self, names: &[&str]) -> Result<(), Error> {
        self.mutate(Operation::OpkgInstall, "install", names).await
    }

    pub async fn remove_packages(&self, names: &[&str]) -> Result<(), Error> {
        self.mutate(Operation::OpkgRemove, "remove", names).await
    }

    async fn mutate(&self, operation: Operation, method: &str, names: &[&str]) -> Result<(), Error> {
        if names.is_empty() {
            return Err(Error::NoPackagesSpecified);
        }
        debug!(%operation, ?names, "changing packages");
        let params = names.iter().map(|name| json!(name)).collect();
        let result = self.rpc.call(operation, NAMESPACE, method, params).await?;
        check_return_code(operation, &result)
    }
}

/// `[code, ...]` with `code == 0` is success. The code may arrive as an
/// integer or an integral float. A reply of any other shape is a protocol
/// error, not a failed command.
fn check_return_code(operation: Operation, result: &Value) -> Result<(), Error> {
    let code = result
        .as_array()
        .and_then(|items| items.first())
        .and_then(|first| match first {
            Value::Number(number) => integral_code(number),
            _ => None,
        })
        .ok_or_else(|| Error::UnexpectedReply {
            operation,
            expected: "an array led by a numeric return code",
            body: result.to_string(),
        })?;

    if code != 0 {
        return Err(Error::ReturnCode { operation, code });
    }
    Ok(())
}

fn decode_status(name: &str, result: Value) -> Result<PackageInfo, Error> {
    let reply: StatusReply = decode_reply(
        Operation::OpkgCheck,
        "a package status map or a boolean array",
        result,
    )?;
    match reply {
        StatusReply::Known(mut packages) => {
            packages
                .remove(name)
                .ok_or_else(|| Error::PackageNotFound {
                    name: name.to_owned(),
                })
        }
        StatusReply::Unknown(_) => Ok(PackageInfo::not_installed()),
    }
}
