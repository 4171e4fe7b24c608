// Login exchange
//
// `POST <remote>/cgi-bin/luci/rpc/auth` with `{"id":1,"method":"login",
// "params":[user, password]}`. The auth endpoint answers with its own
// envelope: `{"result": <token>, "error": <string|null>}` -- a plain string
// error, not the structured `{code, message}` of the generic envelope.

use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Error;
use crate::rpc::{JSON_CONTENT_TYPE, RpcTransport, with_deadline};
use crate::timeouts::Operation;

const AUTH_NAMESPACE: &str = "auth";
const LOGIN_METHOD: &str = "login";

#[derive(Serialize)]
struct LoginRequest<'a> {
    id: u32,
    method: &'static str,
    params: [&'a str; 2],
}

#[derive(Deserialize)]
struct LoginResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl RpcTransport {
    /// Exchange credentials for an opaque session token.
    ///
    /// Bounded by the `auth` timeout. Does not store the token; see
    /// `Client::authenticate` for distribution to the facades.
    pub async fn login(&self, username: &str, password: &SecretString) -> Result<SecretString, Error> {
        let url = self.endpoint(AUTH_NAMESPACE);
        let timeout = self.session().timeout(Operation::Auth);

        debug!(path = url.path(), username, "authentication");

        let body = serde_json::to_vec(&LoginRequest {
            id: 1,
            method: LOGIN_METHOD,
            params: [username, password.expose_secret()],
        })
        .map_err(Error::Serialization)?;

        let request = self
            .http()
            .post(url)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .body(body)
            .build()
            .map_err(Error::RequestBuild)?;

        let body = with_deadline(Operation::Auth, timeout, async {
            let resp = self.http().execute(request).await.map_err(Error::Transport)?;
            let status = resp.status();
            if status != StatusCode::OK {
                return Err(Error::HttpStatus {
                    namespace: AUTH_NAMESPACE.into(),
                    status: status.as_u16(),
                });
            }
            resp.text().await.map_err(Error::Transport)
        })
        .await?;

        let token = decode_login(&body)?;
        debug!(username, "authentication performed");
        Ok(token)
    }
}

fn decode_login(body: &str) -> Result<SecretString, Error> {
    let reply: LoginResponse = serde_json::from_str(body).map_err(|e| Error::Deserialization {
        message: format!("failed to read authentication response body: {e}"),
        body: body.to_owned(),
    })?;

    if let Some(message) = reply.error.filter(|e| !e.is_empty()) {
        return Err(Error::Authentication { message });
    }

    match reply.result {
        Some(token) if !token.is_empty() => Ok(SecretString::from(token)),
        _ => Err(Error::EmptyToken),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn token_is_extracted() {
        let token = decode_login(r#"{"id":1,"result":"T","error":""}"#).unwrap();
        assert_eq!(token.expose_secret(), "T");
    }

    #[test]
    fn error_string_fails_even_with_result() {
        let err = decode_login(r#"{"result":"T","error":"bad credentials"}"#).unwrap_err();
        assert!(matches!(err, Error::Authentication { ref message } if message == "bad credentials"));
    }

    #[test]
    fn null_result_is_empty_token() {
        // LuCI answers a wrong password with a null result and no error.
        let err = decode_login(r#"{"id":1,"result":null,"error":null}"#).unwrap_err();
        assert!(matches!(err, Error::EmptyToken));
    }

    #[test]
    fn unparseable_body_is_deserialization_error() {
        let err = decode_login("Bad Gateway").unwrap_err();
        assert!(matches!(err, Error::Deserialization { .. }));
    }
}
