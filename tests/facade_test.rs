use std::sync::Arc;

use auth_fusion::auth::context::RequestContext;
use auth_fusion::auth::driver::{Credentials, LoginOptions, Principal};
use auth_fusion::auth::guard::{MemoryGuard, SharedGuard};
use auth_fusion::facade::AuthFusion;
use auth_fusion::manager::{AuthDriverManager, DriverServices};
use auth_fusion::storage::MemoryTokenStore;

fn fusion() -> AuthFusion {
    let guard: SharedGuard = Arc::new(
        MemoryGuard::new()
            .unwrap()
            .with_account(Principal::new("u1"), "pw")
            .unwrap(),
    );
    let services = DriverServices::new()
        .with_guard("web", guard)
        .with_token_store(Arc::new(MemoryTokenStore::new()));
    AuthFusion::new(AuthDriverManager::new(services, "session"))
}

async fn login(fusion: &AuthFusion) -> String {
    fusion
        .driver(None)
        .unwrap()
        .login(
            &Credentials::new().with("id", "u1").with("secret", "pw"),
            &LoginOptions::default(),
        )
        .await
        .unwrap()
        .token
}

#[tokio::test]
async fn test_request_without_token_is_anonymous() {
    let fusion = fusion();
    let ctx = RequestContext::new();
    let auth = fusion.for_request(&ctx);

    assert_eq!(auth.token(), None);
    assert_eq!(auth.user().await, None);
    assert!(!auth.check().await);
    assert!(!auth.validate(None).await);
    assert!(!auth.logout().await);
}

#[tokio::test]
async fn test_request_resolves_bearer_token() {
    let fusion = fusion();
    let token = login(&fusion).await;

    let ctx = RequestContext::with_bearer(&token);
    let auth = fusion.for_request(&ctx);

    assert_eq!(auth.token().as_deref(), Some(token.as_str()));
    assert_eq!(auth.user().await.map(|p| p.id), Some("u1".to_string()));
    assert!(auth.check().await);
    assert!(auth.validate(None).await);
    assert!(!auth.validate(Some("garbage-token")).await);
}

#[tokio::test]
async fn test_x_auth_token_header_is_accepted() {
    let fusion = fusion();
    let token = login(&fusion).await;

    let ctx = RequestContext::new().with_header("X-Auth-Token", token.clone());
    assert!(fusion.for_request(&ctx).check().await);
}

#[tokio::test]
async fn test_logout_ends_the_request_session() {
    let fusion = fusion();
    let token = login(&fusion).await;
    let other = login(&fusion).await;

    let ctx = RequestContext::with_bearer(&token);
    assert!(fusion.for_request(&ctx).logout().await);
    assert!(!fusion.for_request(&ctx).check().await);

    // Only the presented token is gone
    let ctx = RequestContext::with_bearer(&other);
    assert!(fusion.for_request(&ctx).check().await);
}

#[tokio::test]
async fn test_misconfigured_default_degrades_to_anonymous() {
    let fusion = fusion();
    let token = login(&fusion).await;
    fusion.manager().set_default_driver("missing").unwrap();

    let ctx = RequestContext::with_bearer(&token);
    let auth = fusion.for_request(&ctx);

    assert_eq!(auth.user().await, None);
    assert!(!auth.validate(None).await);
    assert!(!auth.logout().await);
}

#[test]
fn test_clones_share_the_manager() {
    let fusion = fusion();
    let copy = fusion.clone();

    copy.manager().set_default_driver("oauth").unwrap();
    assert_eq!(fusion.manager().get_default_driver().unwrap(), "oauth");

    let ctx = RequestContext::new();
    assert_eq!(
        fusion.for_request(&ctx).available_drivers().unwrap(),
        vec!["oauth", "session", "signed"]
    );
}
