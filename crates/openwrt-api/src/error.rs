use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::timeouts::Operation;

/// Coarse classification of an [`Error`], stable across releases.
///
/// Lets callers tell "could not reach the device" (`Transport`) apart from
/// "the device executed the call and reported a failure" (`Semantic`)
/// without matching on every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ErrorCategory {
    Configuration,
    Transport,
    Protocol,
    Authentication,
    Semantic,
}

/// Top-level error type for the `openwrt-api` crate.
///
/// Variants are grouped by category. Every layer wraps and forwards;
/// the only aggregate is [`Error::Transaction`], produced by
/// `UciFacade::commit_or_revert`.
#[derive(Debug, Error)]
pub enum Error {
    // ── Configuration ───────────────────────────────────────────────
    /// No remote address was supplied.
    #[error("missing remote url")]
    MissingRemoteUrl,

    /// The remote address is not a valid URL.
    #[error("invalid remote url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A timeout override could not be parsed.
    #[error("invalid timeout for {operation}: {value:?} ({reason})")]
    InvalidTimeout {
        operation: String,
        value: String,
        reason: String,
    },

    /// A timeout override names an operation that does not exist.
    #[error("unknown timed operation: {0:?}")]
    UnknownOperation(String),

    /// The HTTP client could not be built (CA file, TLS backend).
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Transport ───────────────────────────────────────────────────
    /// The request body could not be serialized.
    #[error("json marshal in error: {0}")]
    Serialization(#[source] serde_json::Error),

    /// The HTTP request could not be constructed.
    #[error("http request creation in error: {0}")]
    RequestBuild(#[source] reqwest::Error),

    /// The HTTP exchange failed (connection refused, DNS, reset, ...).
    #[error("http request execution in error: {0}")]
    Transport(#[source] reqwest::Error),

    /// The per-call deadline elapsed before a reply was read.
    #[error("{operation} timed out after {}", humantime::format_duration(*.timeout))]
    Timeout {
        operation: Operation,
        timeout: Duration,
    },

    /// The device answered with something other than HTTP 200.
    #[error("{namespace} request replied with HTTP {status}")]
    HttpStatus { namespace: String, status: u16 },

    // ── Protocol ────────────────────────────────────────────────────
    #[error("missing rpc namespace")]
    MissingNamespace,

    #[error("missing rpc method")]
    MissingMethod,

    /// The reply body is not a valid envelope, with the raw body for debugging.
    #[error("json unmarshal in error: {message}")]
    Deserialization { message: String, body: String },

    /// The envelope carried a populated `error` member.
    #[error("rpc execution error: {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The envelope carried neither `result` nor `error`.
    #[error("empty reply as result for {namespace}.{method}")]
    EmptyResult { namespace: String, method: String },

    /// The `result` payload does not have the shape the operation expects.
    #[error("unexpected reply to {operation}: expected {expected}, got {body}")]
    UnexpectedReply {
        operation: Operation,
        expected: &'static str,
        body: String,
    },

    /// A file payload was not valid base64.
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    /// A UCI payload did not serialize to a JSON object.
    #[error("section payload must serialize to a JSON object, got {kind}")]
    InvalidSectionPayload { kind: &'static str },

    // ── Authentication ──────────────────────────────────────────────
    /// A facade was used before `authenticate` distributed a token.
    #[error("authentication in error: no auth is performed against {remote}")]
    NotAuthenticated { remote: String },

    /// The login endpoint reported an error string.
    #[error("authentication error: {message}")]
    Authentication { message: String },

    /// The login endpoint answered without a token.
    #[error("authentication returned an empty token")]
    EmptyToken,

    /// The session already holds a token.
    #[error("session already authenticated -- construct a new client to re-authenticate")]
    AlreadyAuthenticated,

    // ── Semantic ────────────────────────────────────────────────────
    /// A package-manager call returned a non-zero code.
    #[error("{operation} returned code {code}")]
    ReturnCode { operation: Operation, code: i64 },

    /// A boolean-result call returned `false`.
    #[error("execution returned a failing result: {operation} {subject}")]
    ExecutionFailure {
        operation: Operation,
        subject: String,
    },

    #[error("package not found: {name}")]
    PackageNotFound { name: String },

    #[error("no packages specified")]
    NoPackagesSpecified,

    #[error("service not found: {name}")]
    ServiceNotFound { name: String },

    #[error("no sections specified")]
    NoSectionsSpecified,

    /// Valid selectors, but the device holds no matching configuration.
    #[error("no data from the {sections:?} sections")]
    NoSectionData { sections: Vec<String> },

    #[error("system section not found")]
    SystemSectionNotFound,

    // ── Transaction ─────────────────────────────────────────────────
    /// A UCI commit failed; carries the revert outcome as well.
    #[error(transparent)]
    Transaction(Box<TransactionError>),
}

impl Error {
    /// The stable category tag for this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingRemoteUrl
            | Self::InvalidUrl(_)
            | Self::InvalidTimeout { .. }
            | Self::UnknownOperation(_)
            | Self::Tls(_) => ErrorCategory::Configuration,

            Self::Serialization(_)
            | Self::RequestBuild(_)
            | Self::Transport(_)
            | Self::Timeout { .. }
            | Self::HttpStatus { .. } => ErrorCategory::Transport,

            Self::MissingNamespace
            | Self::MissingMethod
            | Self::Deserialization { .. }
            | Self::Rpc { .. }
            | Self::EmptyResult { .. }
            | Self::UnexpectedReply { .. }
            | Self::Base64(_)
            | Self::InvalidSectionPayload { .. } => ErrorCategory::Protocol,

            Self::NotAuthenticated { .. }
            | Self::Authentication { .. }
            | Self::EmptyToken
            | Self::AlreadyAuthenticated => ErrorCategory::Authentication,

            Self::ReturnCode { .. }
            | Self::ExecutionFailure { .. }
            | Self::PackageNotFound { .. }
            | Self::NoPackagesSpecified
            | Self::ServiceNotFound { .. }
            | Self::NoSectionsSpecified
            | Self::NoSectionData { .. }
            | Self::SystemSectionNotFound => ErrorCategory::Semantic,

            // A failed transaction is classified by what broke the commit.
            Self::Transaction(tx) => tx.commit.category(),
        }
    }

    /// Returns `true` if the device could not be reached or did not answer in time.
    pub fn is_transport(&self) -> bool {
        self.category() == ErrorCategory::Transport
    }

    /// Returns `true` if this error comes from the login exchange or a missing token.
    pub fn is_auth(&self) -> bool {
        self.category() == ErrorCategory::Authentication
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Transport(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::PackageNotFound { .. }
                | Self::ServiceNotFound { .. }
                | Self::NoSectionData { .. }
                | Self::SystemSectionNotFound
        )
    }

    /// The JSON-RPC error code, if the device returned one.
    pub fn rpc_code(&self) -> Option<i64> {
        match self {
            Self::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }
}

// ── Transaction aggregate ───────────────────────────────────────────

/// Outcome of a failed `commit_or_revert`.
///
/// `commit` is always present. `revert` is `None` when the follow-up revert
/// succeeded, and `Some` when it failed too, in which case the device's
/// pending changes are in an unknown state.
#[derive(Debug)]
pub struct TransactionError {
    pub sections: Vec<String>,
    pub commit: Error,
    pub revert: Option<Error>,
}

impl TransactionError {
    pub fn new(sections: &[&str], commit: Error, revert: Option<Error>) -> Self {
        Self {
            sections: sections.iter().map(|s| (*s).to_owned()).collect(),
            commit,
            revert,
        }
    }

    /// Returns `true` when the revert also failed.
    pub fn is_ambiguous(&self) -> bool {
        self.revert.is_some()
    }
}

impl fmt::Display for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to commit config {:?}: {}",
            self.sections, self.commit
        )?;
        match &self.revert {
            Some(revert) => write!(
                f,
                "\nfailed to revert config {:?}: {revert}",
                self.sections
            ),
            None => write!(f, " (pending changes reverted)"),
        }
    }
}

impl std::error::Error for TransactionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.commit)
    }
}

impl From<TransactionError> for Error {
    fn from(err: TransactionError) -> Self {
        Self::Transaction(Box::new(err))
    }
}
