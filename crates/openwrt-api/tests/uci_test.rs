#![allow(clippy::unwrap_used)]
// Integration tests for the UCI facade using wiremock.

use secrecy::SecretString;
use serde::Serialize;
use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{body_json, body_partial_json, method, path, query_param};
use wiremock::{Mock, MockBuilder, MockServer, ResponseTemplate};

use openwrt_api::{Client, Error, Section, TimeoutConfig};

// ── Helpers ─────────────────────────────────────────────────────────

const UCI_PATH: &str = "/cgi-bin/luci/rpc/uci";

async fn setup() -> (MockServer, Client) {
    let server = MockServer::start().await;
    let client = Client::with_client(
        reqwest::Client::new(),
        Url::parse(&server.uri()).unwrap(),
        TimeoutConfig::default(),
    );

    Mock::given(method("POST"))
        .and(path("/cgi-bin/luci/rpc/auth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "result": "T", "error": ""})))
        .mount(&server)
        .await;
    client
        .authenticate("root", &SecretString::from("x".to_owned()))
        .await
        .unwrap();

    (server, client)
}

fn ok(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"id": null, "result": result, "error": null}))
}

fn uci_method(name: &str) -> MockBuilder {
    Mock::given(method("POST"))
        .and(path(UCI_PATH))
        .and(body_partial_json(json!({"method": name})))
}

async fn sent_payloads(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|req| req.url.path() == UCI_PATH)
        .map(|req| serde_json::from_slice(&req.body).unwrap())
        .collect()
}

// ── Reads ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_get_all_carries_token_and_decodes_sections() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(UCI_PATH))
        .and(query_param("auth", "T"))
        .and(body_json(json!({"method": "get_all", "params": ["system"]})))
        .respond_with(ok(json!({
            "cfg01e48a": {
                ".anonymous": true,
                ".type": "system",
                ".name": "cfg01e48a",
                ".index": 0,
                "hostname": "OpenWrt",
                "timezone": "UTC"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let sections = client.uci().get_all(&["system"]).await.unwrap();
    assert_eq!(sections.len(), 1);
    assert_eq!(sections[0].id, "cfg01e48a");
    assert_eq!(sections[0].hostname(), Some("OpenWrt"));
}

#[tokio::test]
async fn test_get_all_without_selectors_issues_no_request() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(UCI_PATH))
        .respond_with(ok(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let err = client.uci().get_all(&[]).await.unwrap_err();
    assert!(matches!(err, Error::NoSectionsSpecified));
}

#[tokio::test]
async fn test_get_all_empty_map_is_no_data() {
    let (server, client) = setup().await;

    uci_method("get_all")
        .respond_with(ok(json!({})))
        .mount(&server)
        .await;

    let err = client.uci().get_all(&["wireless"]).await.unwrap_err();
    assert!(matches!(err, Error::NoSectionData { .. }));
}

#[tokio::test]
async fn test_get_system_picks_anonymous_system_section() {
    let (server, client) = setup().await;

    uci_method("get_all")
        .respond_with(ok(json!({
            "ntp": {".anonymous": false, ".type": "timeserver", ".name": "ntp", ".index": 1, "enabled": "1"},
            "cfg01e48a": {".anonymous": true, ".type": "system", ".name": "cfg01e48a", ".index": 0, "hostname": "gw"}
        })))
        .mount(&server)
        .await;

    let system = client.uci().get_system().await.unwrap();
    assert_eq!(system.id, "cfg01e48a");
    assert_eq!(system.hostname(), Some("gw"));
}

#[tokio::test]
async fn test_get_system_not_found() {
    let (server, client) = setup().await;

    uci_method("get_all")
        .respond_with(ok(json!({
            "ntp": {".anonymous": false, ".type": "timeserver", ".name": "ntp"}
        })))
        .mount(&server)
        .await;

    let err = client.uci().get_system().await.unwrap_err();
    assert!(matches!(err, Error::SystemSectionNotFound));
}

// ── Writes ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_tset_strips_identity_keys() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(UCI_PATH))
        .and(body_json(json!({
            "method": "tset",
            "params": ["system", "cfg01e48a", {"hostname": "gw", "timezone": "UTC"}]
        })))
        .respond_with(ok(json!(true)))
        .expect(1)
        .mount(&server)
        .await;

    let mut section = Section::new("system");
    section.id = "cfg01e48a".into();
    section.anonymous = true;
    section.index = Some(0);
    section.set_option("hostname", "gw");
    section.set_option("timezone", "UTC");

    client.uci().tset(&section, &["system", "cfg01e48a"]).await.unwrap();
}

#[tokio::test]
async fn test_tset_strips_identity_keys_from_any_struct() {
    #[derive(Serialize)]
    struct Dropbear {
        #[serde(rename = ".name")]
        name: String,
        #[serde(rename = ".type")]
        kind: String,
        #[serde(rename = ".anonymous")]
        anonymous: bool,
        #[serde(rename = "Port")]
        port: String,
    }

    let (server, client) = setup().await;
    uci_method("tset").respond_with(ok(json!(true))).mount(&server).await;

    let data = Dropbear {
        name: "cfg014dd4".into(),
        kind: "dropbear".into(),
        anonymous: true,
        port: "2222".into(),
    };
    client.uci().tset(&data, &["dropbear", "cfg014dd4"]).await.unwrap();

    let sent = sent_payloads(&server).await;
    let content = sent[0]["params"].as_array().unwrap().last().unwrap().clone();
    assert_eq!(content, json!({"Port": "2222"}));
    for key in [".name", ".type", ".anonymous"] {
        assert!(content.get(key).is_none(), "{key} was transmitted");
    }
}

#[tokio::test]
async fn test_add_returns_allocated_id() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(UCI_PATH))
        .and(body_json(json!({"method": "add", "params": ["firewall", "rule"]})))
        .respond_with(ok(json!("cfg0c92bd")))
        .mount(&server)
        .await;

    let id = client.uci().add(&["firewall", "rule"]).await.unwrap();
    assert_eq!(id, "cfg0c92bd");
}

#[tokio::test]
async fn test_delete_section() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(UCI_PATH))
        .and(body_json(json!({"method": "delete", "params": ["firewall", "cfg0c92bd"]})))
        .respond_with(ok(json!(true)))
        .expect(1)
        .mount(&server)
        .await;

    client.uci().delete(&["firewall", "cfg0c92bd"]).await.unwrap();
}

// ── Commit or revert ────────────────────────────────────────────────

#[tokio::test]
async fn test_successful_commit_issues_no_revert() {
    let (server, client) = setup().await;

    uci_method("commit")
        .respond_with(ok(json!(true)))
        .expect(1)
        .mount(&server)
        .await;
    uci_method("revert")
        .respond_with(ok(json!(true)))
        .expect(0)
        .mount(&server)
        .await;

    client.uci().commit_or_revert(&["system"]).await.unwrap();
}

#[tokio::test]
async fn test_false_commit_is_reverted_once() {
    let (server, client) = setup().await;

    uci_method("commit")
        .respond_with(ok(json!(false)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(UCI_PATH))
        .and(body_json(json!({"method": "revert", "params": ["system"]})))
        .respond_with(ok(json!(true)))
        .expect(1)
        .mount(&server)
        .await;

    let err = client.uci().commit_or_revert(&["system"]).await.unwrap_err();
    let Error::Transaction(tx) = err else {
        panic!("expected a transaction error, got {err:?}");
    };
    assert!(!tx.is_ambiguous());
    assert!(matches!(tx.commit, Error::ExecutionFailure { .. }));
}

#[tokio::test]
async fn test_commit_rpc_error_is_reverted_once() {
    let (server, client) = setup().await;

    uci_method("commit")
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    uci_method("revert")
        .respond_with(ok(json!(true)))
        .expect(1)
        .mount(&server)
        .await;

    let err = client.uci().commit_or_revert(&["network"]).await.unwrap_err();
    assert!(err.is_transport());
}

#[tokio::test]
async fn test_failed_revert_reports_both_errors() {
    let (server, client) = setup().await;

    uci_method("commit")
        .respond_with(ok(json!(false)))
        .expect(1)
        .mount(&server)
        .await;
    uci_method("revert")
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": null,
            "error": {"code": -32000, "message": "revert failed"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client.uci().commit_or_revert(&["network"]).await.unwrap_err();
    let text = err.to_string();
    assert!(text.contains("failed to commit config"), "{text}");
    assert!(text.contains("failed to revert config"), "{text}");

    let Error::Transaction(tx) = err else {
        panic!("expected a transaction error");
    };
    assert!(tx.is_ambiguous());
    assert_eq!(tx.revert.as_ref().and_then(Error::rpc_code), Some(-32000));
}
