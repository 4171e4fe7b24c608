//! Async client for the OpenWrt LuCI JSON-RPC management API.
//!
//! One [`Client`] per device. It owns a shared [`Session`] (remote address,
//! per-operation timeouts, login token) and four facades over the generic
//! call primitive:
//!
//! - [`FsFacade`]: whole-file read, write, remove
//! - [`OpkgFacade`]: package index, status, install, remove
//! - [`ServiceFacade`]: init script control
//! - [`UciFacade`]: configuration sections with commit-or-revert
//!
//! No call is retried. Every failure is returned as an [`Error`] whose
//! [`category`](Error::category) tells transport trouble apart from a
//! device-side rejection.

pub mod client;
pub mod error;
pub mod fs;
pub mod opkg;
pub mod rpc;
pub mod service;
pub mod session;
pub mod timeouts;
pub mod transport;
pub mod uci;

mod auth;
mod transaction;

pub use client::Client;
pub use error::{Error, ErrorCategory, TransactionError};
pub use fs::FsFacade;
pub use opkg::{OpkgFacade, PackageInfo, PackageStatus};
pub use rpc::RpcTransport;
pub use service::{ServiceFacade, ServiceInfo};
pub use session::Session;
pub use timeouts::{
    DEFAULT_AUTH_TIMEOUT, DEFAULT_RPC_TIMEOUT, FsTimeoutOverrides, OpkgTimeoutOverrides, Operation,
    ServiceTimeoutOverrides, TimeoutConfig, TimeoutOverrides, UciTimeoutOverrides,
};
pub use transport::{TlsMode, TransportConfig};
pub use uci::{OptionValue, Section, UciFacade};
