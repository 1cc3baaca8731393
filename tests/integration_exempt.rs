#![allow(
    clippy::unwrap_used,
    clippy::panic,
    clippy::todo,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    missing_debug_implementations,
    clippy::clone_on_ref_ptr,
    unreachable_pub
)]
mod common;

use common::{MockBackend, PASSWORD};
use serde_json::Value;
use std::sync::atomic::Ordering;

#[tokio::test]
async fn test_public_medicine_lookup_carries_no_token() {
    let backend = MockBackend::spawn().await;
    let ctx = backend.client().await;
    ctx.auth.login("alice", PASSWORD).await.unwrap();

    let medicine: Value = ctx.api.get_json("/api/v1/medicines/42").await.unwrap();
    assert_eq!(medicine["name"], "Ibuprofen");
    assert_eq!(backend.state.auth_headers_for("/api/v1/medicines/42"), vec![None]);
}

#[tokio::test]
async fn test_login_never_carries_a_token() {
    let backend = MockBackend::spawn().await;
    let ctx = backend.client().await;

    ctx.auth.login("alice", PASSWORD).await.unwrap();
    ctx.auth.login("alice", PASSWORD).await.unwrap();

    assert_eq!(backend.state.auth_headers_for("/api/v1/auth/login"), vec![None, None]);
    assert_eq!(backend.state.refresh_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_protected_calls_carry_the_token() {
    let backend = MockBackend::spawn().await;
    let ctx = backend.client().await;
    ctx.auth.login("alice", PASSWORD).await.unwrap();

    let _: Value = ctx.api.get_json("/api/v1/reminders").await.unwrap();
    assert_eq!(backend.state.auth_headers_for("/api/v1/reminders"), vec![Some("Bearer access-1".to_string())]);
}
