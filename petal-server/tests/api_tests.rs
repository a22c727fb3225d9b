use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use base64::Engine;
use secp256k1::{Keypair, Message, Secp256k1, XOnlyPublicKey};
use sha2::{Digest, Sha256};
use tower::ServiceExt;

use petal_gateway::testing::{MemoryMetadataStore, MemoryObjectStore, MemoryPublisher};
use petal_gateway::{Deleter, Getter, Lister, Uploader};
use petal_server::api::{self, AppState};
use petal_server::config::ServerConfig;

const ADDRESS: &str = "http://localhost:3000";
const SECRET: [u8; 32] = [0x33; 32];

// -- Signed-event helpers -------------------------------------------------

fn tag(name: &str, value: &str) -> Vec<String> {
    vec![name.to_owned(), value.to_owned()]
}

fn caller_pubkey() -> String {
    let secp = Secp256k1::new();
    let keypair = Keypair::from_seckey_slice(&secp, &SECRET).unwrap();
    let (xonly, _) = XOnlyPublicKey::from_keypair(&keypair);
    hex::encode(xonly.serialize())
}

/// Build a `Nostr <base64>` header for a freshly signed capability event.
fn auth_header(tags: Vec<Vec<String>>) -> String {
    auth_header_at(tags, unix_now() - 10, 24242)
}

fn auth_header_at(tags: Vec<Vec<String>>, created_at: i64, kind: u32) -> String {
    let secp = Secp256k1::new();
    let keypair = Keypair::from_seckey_slice(&secp, &SECRET).unwrap();
    let pubkey = caller_pubkey();

    let canonical =
        serde_json::to_vec(&(0u8, &pubkey, created_at, kind, &tags, "")).unwrap();
    let digest: [u8; 32] = Sha256::digest(&canonical).into();
    let sig = secp.sign_schnorr_no_aux_rand(&Message::from_digest(digest), &keypair);

    let event = serde_json::json!({
        "id": hex::encode(digest),
        "pubkey": pubkey,
        "created_at": created_at,
        "kind": kind,
        "tags": tags,
        "content": "",
        "sig": hex::encode(sig.serialize()),
    });

    format!(
        "Nostr {}",
        base64::engine::general_purpose::STANDARD.encode(event.to_string())
    )
}

fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

fn upload_auth(body: &[u8]) -> String {
    let hash = hex::encode(Sha256::digest(body));
    auth_header(vec![
        tag("t", "upload"),
        tag("x", &hash),
        tag("expiration", &(unix_now() + 300).to_string()),
    ])
}

fn verb_auth(verb: &str, x: &str) -> String {
    auth_header(vec![
        tag("t", verb),
        tag("x", x),
        tag("expiration", &(unix_now() + 300).to_string()),
    ])
}

// -- App wiring -----------------------------------------------------------

struct TestApp {
    app: Router,
    objects: Arc<MemoryObjectStore>,
    publisher: Arc<MemoryPublisher>,
}

fn test_app() -> TestApp {
    let objects = Arc::new(MemoryObjectStore::new("blobs"));
    let meta = Arc::new(MemoryMetadataStore::new());
    let publisher = Arc::new(MemoryPublisher::new());

    let state = AppState {
        uploader: Arc::new(Uploader::new(
            objects.clone(),
            meta.clone(),
            publisher.clone(),
            ADDRESS,
        )),
        getter: Arc::new(Getter::new(meta.clone())),
        lister: Arc::new(Lister::new(meta.clone(), ADDRESS)),
        deleter: Arc::new(Deleter::new(objects.clone(), meta)),
    };

    let app = api::router(state, &ServerConfig::default());
    TestApp {
        app,
        objects,
        publisher,
    }
}

fn upload_request(body: &[u8], content_type: &str, auth: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(header::AUTHORIZATION, auth)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, body.len().to_string())
        .body(Body::from(body.to_vec()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn reason(response: &axum::response::Response) -> String {
    response
        .headers()
        .get("x-reason")
        .map(|v| v.to_str().unwrap().to_owned())
        .unwrap_or_default()
}

const HELLO: &[u8] = b"hello, world!";
const HELLO_HASH: &str = "68e656b251e67e8358bef8483ab0d51c6619f3e7a1a9f0e75838d41ff368f728";

// -- Health ---------------------------------------------------------------

#[tokio::test]
async fn health_is_public() {
    let t = test_app();
    let response = t
        .app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"OK");
}

// -- Upload ---------------------------------------------------------------

#[tokio::test]
async fn upload_commits_and_returns_descriptor() {
    let t = test_app();
    let response = t
        .app
        .oneshot(upload_request(HELLO, "text/plain", &upload_auth(HELLO)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["sha256"], HELLO_HASH);
    assert_eq!(body["size"], 13);
    assert_eq!(body["type"], "text/plain; charset=utf-8");
    assert_eq!(body["url"], format!("{ADDRESS}/{HELLO_HASH}.txt"));
    assert!(body["uploaded"].as_i64().unwrap() > 0);

    assert!(t.objects.contains("blobs", HELLO_HASH).await);
    assert_eq!(t.publisher.messages().await, vec![HELLO_HASH.to_owned()]);
}

#[tokio::test]
async fn upload_round_trips_the_exact_bytes() {
    let t = test_app();
    t.app
        .oneshot(upload_request(HELLO, "text/plain", &upload_auth(HELLO)))
        .await
        .unwrap();

    let stored = t.objects.object("blobs", HELLO_HASH).await.unwrap();
    assert_eq!(&stored[..], HELLO);
    assert_eq!(hex::encode(Sha256::digest(&stored)), HELLO_HASH);
}

#[tokio::test]
async fn upload_with_foreign_commitment_is_unauthorized() {
    let t = test_app();
    let auth = verb_auth("upload", &"0".repeat(64));
    let response = t
        .app
        .oneshot(upload_request(HELLO, "text/plain", &auth))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(reason(&response), "invalid sha256 hash as 'x' tag");
}

#[tokio::test]
async fn upload_without_auth_is_unauthorized() {
    let t = test_app();
    let response = t
        .app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/upload")
                .body(Body::from(HELLO))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(reason(&response), "missing Authorization header");
}

#[tokio::test]
async fn upload_replay_is_rejected_as_duplicate() {
    let t = test_app();
    let auth = upload_auth(HELLO);

    let first = t
        .app
        .clone()
        .oneshot(upload_request(HELLO, "text/plain", &auth))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = t
        .app
        .oneshot(upload_request(HELLO, "text/plain", &auth))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);
    assert_eq!(reason(&second), "a blob with the same hash already exists");
    assert_eq!(t.publisher.messages().await.len(), 1);
}

#[tokio::test]
async fn upload_with_wrong_verb_tag_is_invalid_action() {
    let t = test_app();
    let auth = verb_auth("delete", HELLO_HASH);
    let response = t
        .app
        .oneshot(upload_request(HELLO, "text/plain", &auth))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(reason(&response), "invalid action");
}

#[tokio::test]
async fn expired_capability_is_rejected() {
    let t = test_app();
    let auth = auth_header(vec![
        tag("t", "upload"),
        tag("x", HELLO_HASH),
        tag("expiration", &(unix_now() - 5).to_string()),
    ]);
    let response = t
        .app
        .oneshot(upload_request(HELLO, "text/plain", &auth))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(reason(&response), "invalid expiration");
}

#[tokio::test]
async fn future_created_at_is_rejected() {
    let t = test_app();
    let auth = auth_header_at(
        vec![
            tag("t", "upload"),
            tag("x", HELLO_HASH),
            tag("expiration", &(unix_now() + 300).to_string()),
        ],
        unix_now() + 60,
        24242,
    );
    let response = t
        .app
        .oneshot(upload_request(HELLO, "text/plain", &auth))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(reason(&response), "invalid created_at");
}

#[tokio::test]
async fn wrong_kind_is_rejected() {
    let t = test_app();
    let auth = auth_header_at(
        vec![
            tag("t", "upload"),
            tag("x", HELLO_HASH),
            tag("expiration", &(unix_now() + 300).to_string()),
        ],
        unix_now() - 10,
        1,
    );
    let response = t
        .app
        .oneshot(upload_request(HELLO, "text/plain", &auth))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(reason(&response), "invalid kind");
}

#[tokio::test]
async fn mislabeled_content_is_a_bad_request() {
    let t = test_app();
    let png = b"\x89PNG\r\n\x1a\n00000000";
    let response = t
        .app
        .oneshot(upload_request(png, "text/plain", &upload_auth(png)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(reason(&response).contains("invalid file type"));
    assert!(t.publisher.messages().await.is_empty());
}

#[tokio::test]
async fn empty_body_is_a_bad_request() {
    let t = test_app();
    let response = t
        .app
        .oneshot(upload_request(b"", "text/plain", &upload_auth(b"")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(reason(&response), "read error: empty file");
}

// -- Get / Head -----------------------------------------------------------

async fn seeded_app() -> TestApp {
    let t = test_app();
    let response = t
        .app
        .clone()
        .oneshot(upload_request(HELLO, "text/plain", &upload_auth(HELLO)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    t
}

#[tokio::test]
async fn get_redirects_to_the_object_url() {
    let t = seeded_app().await;
    let response = t
        .app
        .oneshot(
            Request::builder()
                .uri(format!("/{HELLO_HASH}"))
                .header(header::AUTHORIZATION, verb_auth("get", HELLO_HASH))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.ends_with(HELLO_HASH));
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "13");
    assert_eq!(response.headers()[header::ACCEPT_RANGES], "bytes");
}

#[tokio::test]
async fn get_accepts_a_trailing_extension() {
    let t = seeded_app().await;
    let response = t
        .app
        .oneshot(
            Request::builder()
                .uri(format!("/{HELLO_HASH}.txt"))
                .header(header::AUTHORIZATION, verb_auth("get", HELLO_HASH))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn get_with_server_tag_capability() {
    let t = seeded_app().await;
    let auth = auth_header(vec![
        tag("t", "get"),
        tag("server", "http://localhost:3000"),
        tag("expiration", &(unix_now() + 300).to_string()),
    ]);
    let response = t
        .app
        .oneshot(
            Request::builder()
                .uri(format!("/{HELLO_HASH}"))
                .header(header::AUTHORIZATION, auth)
                .header(header::HOST, "localhost:3000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn get_bound_to_neither_resource_nor_server_fails() {
    let t = seeded_app().await;
    let auth = verb_auth("get", &"0".repeat(64));
    let response = t
        .app
        .oneshot(
            Request::builder()
                .uri(format!("/{HELLO_HASH}"))
                .header(header::AUTHORIZATION, auth)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(reason(&response), "invalid 'x' and 'server' tag");
}

#[tokio::test]
async fn get_unknown_hash_is_not_found() {
    let t = test_app();
    let missing = "1".repeat(64);
    let response = t
        .app
        .oneshot(
            Request::builder()
                .uri(format!("/{missing}"))
                .header(header::AUTHORIZATION, verb_auth("get", &missing))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(reason(&response), "blob not found");
}

#[tokio::test]
async fn head_reports_headers_without_a_body() {
    let t = seeded_app().await;
    let response = t
        .app
        .oneshot(
            Request::builder()
                .method("HEAD")
                .uri(format!("/{HELLO_HASH}"))
                .header(header::AUTHORIZATION, verb_auth("head", HELLO_HASH))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "13");
    assert_eq!(response.headers()[header::ACCEPT_RANGES], "bytes");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(bytes.is_empty());
}

// -- Delete ---------------------------------------------------------------

#[tokio::test]
async fn delete_then_get_is_not_found() {
    let t = seeded_app().await;

    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/{HELLO_HASH}"))
                .header(header::AUTHORIZATION, verb_auth("delete", HELLO_HASH))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!t.objects.contains("blobs", HELLO_HASH).await);

    let response = t
        .app
        .oneshot(
            Request::builder()
                .uri(format!("/{HELLO_HASH}"))
                .header(header::AUTHORIZATION, verb_auth("get", HELLO_HASH))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_with_upload_capability_is_invalid_action() {
    let t = seeded_app().await;
    let response = t
        .app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/{HELLO_HASH}"))
                .header(header::AUTHORIZATION, verb_auth("upload", HELLO_HASH))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(reason(&response), "invalid action");
}

#[tokio::test]
async fn delete_bound_to_another_hash_is_rejected() {
    let t = seeded_app().await;
    let response = t
        .app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/{HELLO_HASH}"))
                .header(header::AUTHORIZATION, verb_auth("delete", &"0".repeat(64)))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        reason(&response),
        "x tag mismatch with URL sha256 for delete action"
    );
}

// -- List -----------------------------------------------------------------

fn list_auth() -> String {
    auth_header(vec![
        tag("t", "list"),
        tag("expiration", &(unix_now() + 300).to_string()),
    ])
}

#[tokio::test]
async fn list_returns_descriptors_for_the_owner() {
    let t = test_app();
    for body in [&b"first blob"[..], b"second blob"] {
        let response = t
            .app
            .clone()
            .oneshot(upload_request(body, "text/plain", &upload_auth(body)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = t
        .app
        .oneshot(
            Request::builder()
                .uri(format!("/list/{}", caller_pubkey()))
                .header(header::AUTHORIZATION, list_auth())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    for entry in entries {
        assert_eq!(entry["type"], "text/plain; charset=utf-8");
        assert!(entry["url"].as_str().unwrap().starts_with(ADDRESS));
    }
}

#[tokio::test]
async fn list_for_a_stranger_is_empty() {
    let t = seeded_app().await;
    let response = t
        .app
        .oneshot(
            Request::builder()
                .uri(format!("/list/{}", "f".repeat(64)))
                .header(header::AUTHORIZATION, list_auth())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn list_rejects_a_bad_until_timestamp() {
    let t = test_app();
    let response = t
        .app
        .oneshot(
            Request::builder()
                .uri(format!(
                    "/list/{}?since=1700000000&until=bad",
                    caller_pubkey()
                ))
                .header(header::AUTHORIZATION, list_auth())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(reason(&response), "invalid 'until' timestamp");
}
