// Service control facade (`sys` namespace, `init.*` methods)
//
// Wraps /etc/init.d script management. Every mutating call replies with a
// boolean; `false` means the device ran the script and it failed.

use serde_json::json;
use tracing::debug;

use crate::error::Error;
use crate::rpc::RpcTransport;
use crate::timeouts::Operation;

const NAMESPACE: &str = "sys";

/// Read-only view of one init script.
///
/// There is no single "describe" call on the device: the view is composed
/// from `init.names` and `init.enabled`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    pub name: String,
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct ServiceFacade {
    rpc: RpcTransport,
}

impl ServiceFacade {
    pub(crate) fn new(rpc: RpcTransport) -> Self {
        Self { rpc }
    }

    /// Names of every init script on the device.
    pub async fn list_services(&self) -> Result<Vec<String>, Error> {
        self.rpc
            .call_as(
                Operation::ServiceList,
                NAMESPACE,
                "init.names",
                Vec::new(),
                "an array of service names",
            )
            .await
    }

    /// Whether `name` starts at boot.
    pub async fn is_enabled(&self, name: &str) -> Result<bool, Error> {
        self.rpc
            .call_as(
                Operation::ServiceIsEnabled,
                NAMESPACE,
                "init.enabled",
                vec![json!(name)],
                "a boolean",
            )
            .await
    }

    /// Compose a [`ServiceInfo`] from the service list and its boot flag.
    pub async fn service_info(&self, name: &str) -> Result<ServiceInfo, Error> {
        let services = self.list_services().await?;
        if !services.iter().any(|s| s == name) {
            return Err(Error::ServiceNotFound {
                name: name.to_owned(),
            });
        }
        let enabled = self.is_enabled(name).await?;
        Ok(ServiceInfo {
            name: name.to_owned(),
            enabled,
        })
    }

    pub async fn enable_service(&self, name: &str) -> Result<(), Error> {
        self.run_init(Operation::ServiceEnable, "init.enable", name).await
    }

    pub async fn disable_service(&self, name: &str) -> Result<(), Error> {
        self.run_init(Operation::ServiceDisable, "init.disable", name).await
    }

    pub async fn start_service(&self, name: &str) -> Result<(), Error> {
        self.run_init(Operation::ServiceStart, "init.start", name).await
    }

    pub async fn stop_service(&self, name: &str) -> Result<(), Error> {
        self.run_init(Operation::ServiceStop, "init.stop", name).await
    }

    /// Stop, then start. Each step is bounded by the `service.restart`
    /// timeout. If stop fails, start is never attempted; if start fails,
    /// the service is left stopped.
    pub async fn restart_service(&self, name: &str) -> Result<(), Error> {
        self.run_init(Operation::ServiceRestart, "init.stop", name).await?;
        self.run_init(Operation::ServiceRestart, "init.start", name).await
    }

    async fn run_init(&self, operation: Operation, method: &str, name: &str) -> Result<(), Error> {
        debug!(%operation, method, name, "service control");
        let succeeded: bool = self
            .rpc
            .call_as(operation, NAMESPACE, method, vec![json!(name)], "a boolean")
            .await?;
        if !succeeded {
            return Err(Error::ExecutionFailure {
                operation,
                subject: format!("{method} {name}"),
            });
        }
        Ok(())
    }
}
