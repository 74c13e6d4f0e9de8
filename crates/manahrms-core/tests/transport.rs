//! Integration tests for the authenticated transport.
//!
//! Verifies bearer attachment, 401 invalidation with its per-request guard,
//! network failure normalization, and the endpoint bodies.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{api, seed_session, CountingStore, SlowReadStore, TOKEN_KEY};
use manahrms_core::api::{ApiRequest, Attempt, TransportEvent};
use manahrms_core::auth::{CredentialStore, MemoryCredentialStore, PersistedSession};
use manahrms_core::{ApiError, AvatarFile, Profile, UserRecord};
use serde_json::json;
use wiremock::matchers::{body_json, header, header_regex, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

#[tokio::test]
async fn test_bearer_token_attached_from_store() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryCredentialStore::new());
    seed_session(store.as_ref(), "T1", r#"{"email":"a@b.com"}"#).await;

    Mock::given(method("GET"))
        .and(path("/user/profile"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "Asha"})))
        .expect(1)
        .mount(&server)
        .await;

    let profile = api(&server.uri(), store).fetch_profile().await.unwrap();
    assert_eq!(profile.name(), Some("Asha"));
}

#[tokio::test]
async fn test_no_token_dispatches_unauthenticated() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/user/profile"))
        .respond_with(|req: &Request| {
            if req.headers.get("authorization").is_some() {
                ResponseTemplate::new(400)
            } else {
                ResponseTemplate::new(200).set_body_json(json!({}))
            }
        })
        .mount(&server)
        .await;

    let result = api(&server.uri(), Arc::new(MemoryCredentialStore::new()))
        .fetch_profile()
        .await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_login_never_sends_stored_token() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryCredentialStore::new());
    seed_session(store.as_ref(), "STALE", r#"{}"#).await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"token": "T1", "user": {}})),
        )
        .mount(&server)
        .await;

    api(&server.uri(), store).login("a@b.com", "pw").await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_unauthorized_clears_store_once_and_emits_event() {
    let server = MockServer::start().await;
    let store = Arc::new(CountingStore::default());
    seed_session(store.as_ref(), "T1", r#"{"email":"a@b.com"}"#).await;

    Mock::given(method("GET"))
        .and(path("/user/profile"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = api(&server.uri(), store.clone());
    let mut events = client.subscribe();

    let err = client.fetch_profile().await.unwrap_err();
    assert!(err.is_unauthorized());

    // Storage is already cleared when the call resolves
    assert_eq!(store.clears(), 1);
    assert!(store.is_empty().await);
    assert_eq!(
        events.try_recv().unwrap(),
        TransportEvent::SessionInvalidated {
            rejected_token: Some("T1".to_string())
        }
    );
}

#[tokio::test]
async fn test_retried_request_does_not_invalidate_twice() {
    let server = MockServer::start().await;
    let store = Arc::new(CountingStore::default());
    seed_session(store.as_ref(), "T1", r#"{}"#).await;

    Mock::given(method("GET"))
        .and(path("/user/profile"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    let client = api(&server.uri(), store.clone());
    let request = ApiRequest::get("/user/profile");
    let mut attempt = Attempt::new();

    let first = client.execute(&request, &mut attempt).await;
    assert!(matches!(first, Err(ApiError::Unauthorized)));
    assert!(attempt.unauthorized_handled());

    let second = client.execute(&request, &mut attempt).await;
    assert!(matches!(second, Err(ApiError::Unauthorized)));

    assert_eq!(store.clears(), 1);
}

#[tokio::test]
async fn test_concurrent_requests_each_get_one_invalidation() {
    let server = MockServer::start().await;
    let store = Arc::new(CountingStore::default());
    seed_session(store.as_ref(), "T1", r#"{}"#).await;

    Mock::given(method("GET"))
        .and(path("/user/profile"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    let client = api(&server.uri(), store.clone());
    let (a, b) = futures::join!(client.fetch_profile(), client.fetch_profile());
    assert!(a.unwrap_err().is_unauthorized());
    assert!(b.unwrap_err().is_unauthorized());
    assert_eq!(store.clears(), 2);
}

#[tokio::test]
async fn test_unauthorized_keeps_superseding_session() {
    let server = MockServer::start().await;
    let store = Arc::new(CountingStore::default());
    seed_session(store.as_ref(), "T1", r#"{}"#).await;

    Mock::given(method("GET"))
        .and(path("/user/profile"))
        .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(300)))
        .mount(&server)
        .await;

    let client = api(&server.uri(), store.clone());
    let relogin = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        store.set(TOKEN_KEY, "T2").await.unwrap();
    };
    let (result, ()) = futures::join!(client.fetch_profile(), relogin);

    assert!(result.unwrap_err().is_unauthorized());
    assert_eq!(store.clears(), 0);
    assert_eq!(store.get(TOKEN_KEY).await.unwrap().as_deref(), Some("T2"));
}

#[tokio::test]
async fn test_unauthorized_never_wipes_a_save_that_races_it() {
    let server = MockServer::start().await;
    // Each read returns the value it saw 100ms earlier
    let store = Arc::new(SlowReadStore::new(Duration::from_millis(100)));
    seed_session(store.as_ref(), "T1", r#"{}"#).await;

    Mock::given(method("GET"))
        .and(path("/user/profile"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = api(&server.uri(), store.clone());
    let repo = client.session_repository().clone();
    // Lands while the transport is re-reading the token to compare
    let relogin = async {
        tokio::time::sleep(Duration::from_millis(150)).await;
        repo.save(&PersistedSession {
            access_token: "T2".to_string(),
            refresh_token: None,
            user: UserRecord::default(),
        })
        .await;
    };
    let (result, ()) = futures::join!(client.fetch_profile(), relogin);

    assert!(result.unwrap_err().is_unauthorized());
    assert_eq!(store.get(TOKEN_KEY).await.unwrap().as_deref(), Some("T2"));
}

#[tokio::test]
async fn test_no_response_is_network_unavailable() {
    // Nothing listens on port 9
    let client = api("http://127.0.0.1:9", Arc::new(MemoryCredentialStore::new()));
    let err = client.fetch_profile().await.unwrap_err();
    assert!(err.is_network());
    assert_eq!(err.to_string(), "Network error. Please check your connection.");
}

#[tokio::test]
async fn test_change_password_body_and_rejection_message() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/user/change-password"))
        .and(body_json(json!({"oldPassword": "old", "newPassword": "new"})))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(json!({"message": "Old password is incorrect"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = api(&server.uri(), Arc::new(MemoryCredentialStore::new()))
        .change_password("old", "new")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Old password is incorrect");
}

#[tokio::test]
async fn test_avatar_upload_is_multipart() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/user/avatar"))
        .and(header_regex("content-type", "^multipart/form-data"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"avatar": "https://cdn/a.jpg"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let avatar = AvatarFile::from_bytes(vec![0xff, 0xd8, 0xff], "me.jpg");
    let profile = api(&server.uri(), Arc::new(MemoryCredentialStore::new()))
        .upload_avatar(&avatar)
        .await
        .unwrap();
    assert_eq!(profile.avatar_url(), Some("https://cdn/a.jpg"));

    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("name=\"avatar\""));
    assert!(body.contains("filename=\"me.jpg\""));
}

#[tokio::test]
async fn test_non_object_profile_is_invalid_response() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/user/profile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["not", "an", "object"])))
        .mount(&server)
        .await;

    let partial = Profile::from_value(json!({"phone": "555"})).unwrap();
    let err = api(&server.uri(), Arc::new(MemoryCredentialStore::new()))
        .update_profile(&partial)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidResponse(_)));
}
