mod common;

use std::sync::Arc;

use common::{access_token, client_for, sign_in};
use mangogate::models::LoginCredentials;
use mangogate::session::{LogoutReason, SessionEvent};
use mangogate::GatewayError;
use mockito::{Matcher, Server};
use serde_json::{json, Value};

#[tokio::test]
async fn stored_token_and_tenant_are_attached() {
    let mut server = Server::new_async().await;
    let token = access_token("admin", 600);
    let products = server
        .mock("GET", "/api/products/")
        .match_header("authorization", format!("Bearer {}", token).as_str())
        .match_header("x-tenant-id", "42")
        .match_query(Matcher::UrlEncoded("tenant_id".into(), "42".into()))
        .with_body("[]")
        .expect(1)
        .create_async()
        .await;
    let graphql = server
        .mock("POST", "/graphql")
        .match_header("authorization", format!("Bearer {}", token).as_str())
        .match_header("x-tenant-id", "42")
        .with_body(r#"{"data": {"products": []}}"#)
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server.url()).await;
    sign_in(&client, &token, Some("refresh"), Some("42")).await;

    let _: Vec<Value> = client.gateway.get("/products/").await.unwrap();
    let _: Value = client
        .gateway
        .graphql("{ products { id } }", None)
        .await
        .unwrap();

    products.assert_async().await;
    graphql.assert_async().await;
}

#[tokio::test]
async fn expired_token_is_refreshed_once_and_request_retried() {
    let mut server = Server::new_async().await;
    let login = server
        .mock("POST", "/api/auth/login/")
        .match_body(Matcher::PartialJson(
            json!({"username": "admin", "password": "admin"}),
        ))
        .with_body(
            json!({
                "access": "access-1",
                "refresh": "refresh-1",
                "user": {"id": 1, "username": "admin", "email": "admin@example.com", "tenant_id": 1}
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;
    let rejected = server
        .mock("GET", "/api/products/")
        .match_query(Matcher::Any)
        .match_header("authorization", "Bearer access-1")
        .with_status(401)
        .with_body(r#"{"detail": "Given token not valid for any token type"}"#)
        .expect(1)
        .create_async()
        .await;
    let refresh = server
        .mock("POST", "/api/auth/token/refresh/")
        .match_body(Matcher::Json(json!({"refresh": "refresh-1"})))
        .with_body(r#"{"access": "access-2"}"#)
        .expect(1)
        .create_async()
        .await;
    let retried = server
        .mock("GET", "/api/products/")
        .match_query(Matcher::UrlEncoded("tenant_id".into(), "1".into()))
        .match_header("authorization", "Bearer access-2")
        .match_header("x-tenant-id", "1")
        .with_body(r#"[{"id": 7, "name": "Alphonso"}]"#)
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server.url()).await;
    let mut events = client.gateway.session().subscribe();
    client
        .auth
        .login(&LoginCredentials {
            username: Some("admin".to_string()),
            password: "admin".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    let products: Vec<Value> = client.gateway.get("/products/").await.unwrap();
    assert_eq!(products[0]["name"], "Alphonso");

    login.assert_async().await;
    rejected.assert_async().await;
    refresh.assert_async().await;
    retried.assert_async().await;

    let session = client.gateway.session().session().await.unwrap();
    assert_eq!(session.access_token, "access-2");
    assert_eq!(session.refresh_token.as_deref(), Some("refresh-1"));

    assert!(matches!(events.recv().await.unwrap(), SessionEvent::SignedIn { .. }));
    assert!(matches!(
        events.recv().await.unwrap(),
        SessionEvent::TenantChanged { .. }
    ));
    assert_eq!(events.recv().await.unwrap(), SessionEvent::TokensRefreshed);
}

#[tokio::test]
async fn failed_refresh_signs_out_and_returns_original_error() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/sales/")
        .match_query(Matcher::Any)
        .with_status(401)
        .with_body(r#"{"detail": "Token expired"}"#)
        .expect(2)
        .create_async()
        .await;
    let refresh = server
        .mock("POST", "/api/auth/token/refresh/")
        .with_status(401)
        .with_body(r#"{"detail": "Token is blacklisted", "code": "token_not_valid"}"#)
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server.url()).await;
    sign_in(&client, "stale", Some("revoked"), Some("3")).await;
    let mut events = client.gateway.session().subscribe();

    let err = client.gateway.get::<Value>("/sales/").await.unwrap_err();
    match err {
        GatewayError::Api { status, message, .. } => {
            assert_eq!(status.as_u16(), 401);
            assert_eq!(message, "Token expired");
        }
        other => panic!("unexpected error {:?}", other),
    }

    let state = client.gateway.session().snapshot().await;
    assert!(state.session.is_none());
    assert!(state.user.is_none());
    assert_eq!(
        events.recv().await.unwrap(),
        SessionEvent::LoggedOut {
            reason: LogoutReason::RefreshFailed
        }
    );

    // With the session gone, another 401 makes no refresh attempt.
    let err = client.gateway.get::<Value>("/sales/").await.unwrap_err();
    assert!(err.is_unauthorized());
    refresh.assert_async().await;
}

#[tokio::test]
async fn missing_refresh_token_never_calls_refresh_endpoint() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/inventory/")
        .match_query(Matcher::Any)
        .with_status(401)
        .expect(1)
        .create_async()
        .await;
    let refresh = server
        .mock("POST", "/api/auth/token/refresh/")
        .expect(0)
        .create_async()
        .await;

    let client = client_for(&server.url()).await;
    sign_in(&client, "access-only", None, Some("3")).await;
    let mut events = client.gateway.session().subscribe();

    let err = client.gateway.get::<Value>("/inventory/").await.unwrap_err();
    assert!(err.is_unauthorized());

    refresh.assert_async().await;
    assert!(!client.gateway.session().is_authenticated().await);
    assert_eq!(
        events.recv().await.unwrap(),
        SessionEvent::LoggedOut {
            reason: LogoutReason::MissingRefreshToken
        }
    );
}

#[tokio::test]
async fn concurrent_unauthorized_requests_share_one_refresh() {
    let mut server = Server::new_async().await;
    let rejected = server
        .mock("GET", "/api/orders/")
        .match_query(Matcher::Any)
        .match_header("authorization", "Bearer old")
        .with_status(401)
        .expect(8)
        .create_async()
        .await;
    let refresh = server
        .mock("POST", "/api/auth/token/refresh/")
        .with_body(r#"{"access": "new", "refresh": "rotated"}"#)
        .expect(1)
        .create_async()
        .await;
    let retried = server
        .mock("GET", "/api/orders/")
        .match_query(Matcher::Any)
        .match_header("authorization", "Bearer new")
        .with_body("[]")
        .expect(8)
        .create_async()
        .await;

    let client = Arc::new(client_for(&server.url()).await);
    sign_in(&client, "old", Some("refresh"), Some("1")).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            client.gateway.get::<Vec<Value>>("/orders/").await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    rejected.assert_async().await;
    refresh.assert_async().await;
    retried.assert_async().await;
    assert_eq!(
        client.gateway.session().refresh_token().await.as_deref(),
        Some("rotated")
    );
}
