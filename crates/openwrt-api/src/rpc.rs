// JSON-RPC call primitive
//
// Every facade operation funnels through `RpcTransport::call`: one POST to
// `<remote>/cgi-bin/luci/rpc/<namespace>?auth=<token>`, bounded by the
// operation's own deadline, with the `{result, error}` envelope stripped
// before the caller sees the payload. No retries happen at this layer.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use tracing::{debug, warn};
use url::Url;

use crate::error::Error;
use crate::session::Session;
use crate::timeouts::Operation;

pub(crate) const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

#[derive(Serialize)]
struct RpcRequest<'a> {
    method: &'a str,
    params: &'a [Value],
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    code: Option<Number>,
    #[serde(default)]
    message: String,
}

/// Stateless call primitive bound to a shared [`Session`].
///
/// Cheap to clone: the HTTP client and the session are both reference
/// counted, and every facade holds its own copy.
#[derive(Debug, Clone)]
pub struct RpcTransport {
    http: reqwest::Client,
    session: Arc<Session>,
}

impl RpcTransport {
    pub fn new(http: reqwest::Client, session: Arc<Session>) -> Self {
        Self { http, session }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// `<remote>/cgi-bin/luci/rpc/<namespace>`, keeping any path prefix
    /// the remote address already carries.
    pub(crate) fn endpoint(&self, namespace: &str) -> Url {
        let mut url = self.session.remote().clone();
        let base = url.path().trim_end_matches('/').to_owned();
        url.set_path(&format!("{base}/cgi-bin/luci/rpc/{namespace}"));
        url.set_query(None);
        url.set_fragment(None);
        url
    }

    /// Issue one RPC and return the raw `result` payload.
    ///
    /// Token, namespace, and method are checked before any I/O. The
    /// deadline covers sending the request and reading the whole body;
    /// dropping the returned future cancels the call in flight.
    pub async fn call(
        &self,
        operation: Operation,
        namespace: &str,
        method: &str,
        params: Vec<Value>,
    ) -> Result<Value, Error> {
        let token = self.session.token().ok_or_else(|| Error::NotAuthenticated {
            remote: self.session.remote().to_string(),
        })?;
        if namespace.is_empty() {
            return Err(Error::MissingNamespace);
        }
        if method.is_empty() {
            return Err(Error::MissingMethod);
        }

        let timeout = self.session.timeout(operation);
        let mut url = self.endpoint(namespace);
        url.query_pairs_mut()
            .append_pair("auth", token.expose_secret());

        let body = serde_json::to_vec(&RpcRequest {
            method,
            params: &params,
        })
        .map_err(Error::Serialization)?;

        let request = self
            .http
            .post(url)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .body(body)
            .build()
            .map_err(Error::RequestBuild)?;

        debug!(
            %operation,
            namespace,
            method,
            timeout = %humantime::format_duration(timeout),
            "start - rpc call"
        );

        let body = with_deadline(operation, timeout, async {
            let resp = self.http.execute(request).await.map_err(Error::Transport)?;
            let status = resp.status();
            if status != StatusCode::OK {
                return Err(Error::HttpStatus {
                    namespace: namespace.to_owned(),
                    status: status.as_u16(),
                });
            }
            resp.text().await.map_err(Error::Transport)
        })
        .await?;

        debug!(%operation, namespace, method, "end - rpc call");

        decode_envelope(namespace, method, &body)
    }

    /// [`call`](Self::call), then decode `result` into `T`.
    ///
    /// A payload of the wrong shape becomes [`Error::UnexpectedReply`]
    /// naming `expected`.
    pub async fn call_as<T: DeserializeOwned>(
        &self,
        operation: Operation,
        namespace: &str,
        method: &str,
        params: Vec<Value>,
        expected: &'static str,
    ) -> Result<T, Error> {
        let result = self.call(operation, namespace, method, params).await?;
        decode_reply(operation, expected, result)
    }
}

/// Run `fut` under `timeout`, mapping expiry to [`Error::Timeout`].
pub(crate) async fn with_deadline<T, F>(
    operation: Operation,
    timeout: Duration,
    fut: F,
) -> Result<T, Error>
where
    F: Future<Output = Result<T, Error>>,
{
    if let Ok(outcome) = tokio::time::timeout(timeout, fut).await {
        outcome
    } else {
        warn!(%operation, timeout = %humantime::format_duration(timeout), "deadline elapsed");
        Err(Error::Timeout { operation, timeout })
    }
}

/// Strip the `{result, error}` envelope.
///
/// A populated `error` wins over `result`; a missing (or `null`) result
/// is [`Error::EmptyResult`].
pub(crate) fn decode_envelope(namespace: &str, method: &str, body: &str) -> Result<Value, Error> {
    let envelope: RpcResponse =
        serde_json::from_str(body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: body.to_owned(),
        })?;

    if let Some(err) = envelope.error {
        return Err(Error::Rpc {
            code: err.code.as_ref().and_then(integral_code).unwrap_or_default(),
            message: err.message,
        });
    }

    envelope.result.ok_or_else(|| Error::EmptyResult {
        namespace: namespace.to_owned(),
        method: method.to_owned(),
    })
}

/// A JSON number as an integer code. LuCI encodes some codes as floats
/// (`0.0`); those are accepted when they carry no fractional part.
pub(crate) fn integral_code(number: &Number) -> Option<i64> {
    number
        .as_i64()
        .or_else(|| number.as_f64().and_then(|f| f.to_string().parse().ok()))
}

pub(crate) fn decode_reply<T: DeserializeOwned>(
    operation: Operation,
    expected: &'static str,
    result: Value,
) -> Result<T, Error> {
    T::deserialize(&result).map_err(|_| Error::UnexpectedReply {
        operation,
        expected,
        body: result.to_string(),
    })
}
