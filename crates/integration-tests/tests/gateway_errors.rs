//! A misrouted gateway surfaces 404s instead of empty lists.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use chrono::Utc;
use mediplus_client::ApiClient;
use mediplus_client::ApiError;
use mediplus_client::session::AccessToken;
use mediplus_core::Role;
use mediplus_integration_tests::FakeBackend;

async fn misrouted(backend: &FakeBackend, role: Role) -> ApiClient {
    let api = ApiClient::with_base_url(
        backend.url().join("wrong-prefix/").unwrap(),
        Duration::from_secs(5),
    )
    .unwrap();
    let exp = Utc::now().timestamp() + 3_600;
    api.set_token(AccessToken::new(backend.issue_token(role, exp).await))
        .await;
    api
}

#[tokio::test]
async fn test_wrong_base_path_is_not_an_empty_queue() {
    let backend = FakeBackend::start().await.unwrap();
    let api = misrouted(&backend, Role::Pharmacist).await;

    assert!(matches!(
        api.pharmacy().queue().await,
        Err(ApiError::NotFound(_))
    ));
    assert!(matches!(
        api.pharmacy().orders().await,
        Err(ApiError::NotFound(_))
    ));
    assert_eq!(backend.queue_requests(), 0);
}

#[tokio::test]
async fn test_wrong_base_path_is_not_an_empty_inventory() {
    let backend = FakeBackend::start().await.unwrap();
    let api = misrouted(&backend, Role::Admin).await;

    assert!(matches!(
        api.inventory().list().await,
        Err(ApiError::NotFound(_))
    ));
    assert!(matches!(
        api.analytics().inventory().await,
        Err(ApiError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_pending_still_reads_404_as_nothing_pending() {
    let backend = FakeBackend::start().await.unwrap();
    let api = backend.api().unwrap();
    let exp = Utc::now().timestamp() + 3_600;
    api.set_token(AccessToken::new(
        backend.issue_token(Role::Pharmacist, exp).await,
    ))
    .await;

    assert!(api.pharmacy().pending().await.unwrap().is_empty());
    assert!(api.pharmacy().queue().await.unwrap().is_empty());
}
