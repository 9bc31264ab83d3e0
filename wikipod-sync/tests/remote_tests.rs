use wikipod_sync::{
    RemoteStore, RemoveOutcome, SolidPodClient, SolidPodConfig, SyncError, TRUST_REMEDIATION,
};
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> SolidPodClient {
    SolidPodClient::new(SolidPodConfig {
        pod_origin: server.uri(),
        ..Default::default()
    })
}

// ── Config defaults ─────────────────────────────────────────────

#[test]
fn pod_config_default() {
    let cfg = SolidPodConfig::default();
    assert_eq!(cfg.pod_origin, "https://localhost:8443");
    assert_eq!(cfg.request_timeout_secs, 60);
}

#[test]
fn pod_config_serde_fills_defaults() {
    let cfg: SolidPodConfig =
        serde_json::from_str(r#"{"pod_origin": "https://pod.example"}"#).unwrap();
    assert_eq!(cfg.pod_origin, "https://pod.example");
    assert_eq!(cfg.request_timeout_secs, 60);
}

#[test]
fn url_for_joins_origin_and_passes_absolute_through() {
    let client = SolidPodClient::new(SolidPodConfig {
        pod_origin: "https://pod.example/".to_string(),
        ..Default::default()
    });
    assert_eq!(client.url_for("/public/a"), "https://pod.example/public/a");
    assert_eq!(client.url_for("https://other.example/x"), "https://other.example/x");
}

// ── Read ────────────────────────────────────────────────────────

#[tokio::test]
async fn read_returns_body_with_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/public/wiki/A"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.set_bearer_token(Some("tok".to_string())).await;
    assert_eq!(client.read("/public/wiki/A").await.unwrap(), "hello");
}

#[tokio::test]
async fn read_missing_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client_for(&server).read("/public/wiki/A").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn read_unauthorized_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client_for(&server).read("/private/a").await.unwrap_err();
    assert!(matches!(err, SyncError::Auth(_)));
}

#[tokio::test]
async fn origin_refusal_carries_remediation() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_string("Origin https://wiki.example is not trusted"),
        )
        .mount(&server)
        .await;

    let err = client_for(&server).read("/public/a").await.unwrap_err();
    match &err {
        SyncError::UntrustedOrigin { reason, remediation } => {
            assert!(reason.contains("not trusted"));
            assert_eq!(*remediation, TRUST_REMEDIATION);
        }
        other => panic!("expected UntrustedOrigin, got {other:?}"),
    }
    assert!(err.is_auth());
    assert!(err.to_string().contains("trusted applications"));
}

#[tokio::test]
async fn transport_failure_is_transport_error() {
    let client = SolidPodClient::new(SolidPodConfig {
        pod_origin: "http://127.0.0.1:9".to_string(),
        request_timeout_secs: 2,
    });
    let err = client.read("/public/a").await.unwrap_err();
    assert!(matches!(err, SyncError::Transport(_)));
}

// ── Write ───────────────────────────────────────────────────────

#[tokio::test]
async fn write_sends_type_and_describedby_link() {
    let server = MockServer::start().await;
    let meta_link = format!("<{}/public/wiki/A.metadata>; rel=\"describedby\"", server.uri());
    Mock::given(method("PUT"))
        .and(path("/public/wiki/A"))
        .and(header("content-type", "text/vnd.tiddlywiki"))
        .and(header("link", meta_link.as_str()))
        .and(body_string("body"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server)
        .write(
            "/public/wiki/A",
            "text/vnd.tiddlywiki",
            "body".to_string(),
            Some("/public/wiki/A.metadata"),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn write_accepts_replace_statuses() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/public/a"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/public/b"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.write("/public/a", "text/plain", String::new(), None).await.unwrap();
    client.write("/public/b", "text/plain", String::new(), None).await.unwrap();
}

#[tokio::test]
async fn write_unexpected_status_is_conflict() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(412))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .write("/public/a", "text/plain", String::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Conflict { status: 412, .. }));
}

// ── Remove / exists ─────────────────────────────────────────────

#[tokio::test]
async fn remove_reports_absent_resources() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/public/here"))
        .respond_with(ResponseTemplate::new(205))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/public/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert_eq!(client.remove("/public/here").await.unwrap(), RemoveOutcome::Removed);
    assert_eq!(client.remove("/public/gone").await.unwrap(), RemoveOutcome::Absent);
}

#[tokio::test]
async fn remove_server_error_is_transport() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = client_for(&server).remove("/public/a").await.unwrap_err();
    assert!(matches!(err, SyncError::Transport(_)));
}

#[tokio::test]
async fn exists_uses_head() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/public/wiki/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert!(client.exists("/public/wiki/").await.unwrap());
    assert!(!client.exists("/public/other/").await.unwrap());
}

// ── Containers ──────────────────────────────────────────────────

#[tokio::test]
async fn ensure_container_creates_missing_ancestors_top_down() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/public/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/public/a/"))
        .and(header("content-type", "text/turtle"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/public/a/b/"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server).ensure_container("/public/a/b").await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let puts: Vec<String> = requests
        .iter()
        .filter(|r| r.method.as_str() == "PUT")
        .map(|r| r.url.path().to_string())
        .collect();
    assert_eq!(puts, vec!["/public/a/", "/public/a/b/"]);
}

#[tokio::test]
async fn ensure_existing_container_creates_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.ensure_container("/public/a/b").await.unwrap();
    client.ensure_container("/public/a/b").await.unwrap();
}

#[tokio::test]
async fn create_existing_container_is_ok() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;

    client_for(&server).create_container("/public/a").await.unwrap();
}

#[tokio::test]
async fn external_container_cannot_be_created() {
    let server = MockServer::start().await;
    let err = client_for(&server)
        .ensure_container("https://bob.pod.example/public/x")
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::InvalidPath(_)));
}
