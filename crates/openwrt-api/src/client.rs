// Client aggregate
//
// Owns the shared `Session` and one instance of every facade. All facades are
// wired to the same session at construction; `authenticate` fills its token
// slot once, after which every facade can issue calls.

use std::sync::Arc;

use secrecy::SecretString;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::fs::FsFacade;
use crate::opkg::OpkgFacade;
use crate::rpc::RpcTransport;
use crate::service::ServiceFacade;
use crate::session::Session;
use crate::timeouts::TimeoutConfig;
use crate::transport::TransportConfig;
use crate::uci::UciFacade;

/// Capability surface for one OpenWrt device.
///
/// ```no_run
/// # async fn example() -> Result<(), openwrt_api::Error> {
/// use openwrt_api::{Client, TimeoutConfig, TransportConfig};
/// use secrecy::SecretString;
///
/// let client = Client::connect(
///     "https://192.168.1.1",
///     "root",
///     &SecretString::from("password".to_owned()),
///     TimeoutConfig::default(),
///     &TransportConfig::default(),
/// )
/// .await?;
/// let system = client.uci().get_system().await?;
/// println!("{:?}", system.hostname());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Client {
    rpc: RpcTransport,
    fs: FsFacade,
    opkg: OpkgFacade,
    service: ServiceFacade,
    uci: UciFacade,
}

impl Client {
    /// Build an unauthenticated client for `remote`.
    ///
    /// Fails before any network activity on an empty or malformed address.
    pub fn new(remote: &str, timeouts: TimeoutConfig, transport: &TransportConfig) -> Result<Self, Error> {
        let remote = parse_remote(remote)?;
        let http = transport.build_client()?;
        Ok(Self::with_client(http, remote, timeouts))
    }

    /// Build a client around a pre-configured `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, remote: Url, timeouts: TimeoutConfig) -> Self {
        let session = Arc::new(Session::new(remote, timeouts));
        let rpc = RpcTransport::new(http, session);
        Self {
            fs: FsFacade::new(rpc.clone()),
            opkg: OpkgFacade::new(rpc.clone()),
            service: ServiceFacade::new(rpc.clone()),
            uci: UciFacade::new(rpc.clone()),
            rpc,
        }
    }

    /// [`new`](Self::new) followed by [`authenticate`](Self::authenticate).
    pub async fn connect(
        remote: &str,
        username: &str,
        password: &SecretString,
        timeouts: TimeoutConfig,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let client = Self::new(remote, timeouts, transport)?;
        client.authenticate(username, password).await?;
        Ok(client)
    }

    /// Log in and hand the token to every facade.
    ///
    /// Once per client: a second call fails with
    /// [`Error::AlreadyAuthenticated`] without contacting the device.
    pub async fn authenticate(&self, username: &str, password: &SecretString) -> Result<(), Error> {
        if self.is_authenticated() {
            return Err(Error::AlreadyAuthenticated);
        }
        let token = self.rpc.login(username, password).await?;
        self.session().set_token(token)?;
        debug!(remote = %self.remote(), "session established");
        Ok(())
    }

    pub fn is_authenticated(&self) -> bool {
        self.session().is_authenticated()
    }

    pub fn session(&self) -> &Arc<Session> {
        self.rpc.session()
    }

    pub fn remote(&self) -> &Url {
        self.session().remote()
    }

    /// The raw call primitive, for namespaces without a facade.
    pub fn rpc(&self) -> &RpcTransport {
        &self.rpc
    }

    pub fn fs(&self) -> &FsFacade {
        &self.fs
    }

    pub fn opkg(&self) -> &OpkgFacade {
        &self.opkg
    }

    pub fn service(&self) -> &ServiceFacade {
        &self.service
    }

    pub fn uci(&self) -> &UciFacade {
        &self.uci
    }
}

fn parse_remote(remote: &str) -> Result<Url, Error> {
    let remote = remote.trim();
    if remote.is_empty() {
        return Err(Error::MissingRemoteUrl);
    }
    Ok(Url::parse(remote)?)
}
