#![allow(
    clippy::unwrap_used,
    clippy::panic,
    clippy::todo,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    missing_debug_implementations,
    clippy::clone_on_ref_ptr,
    clippy::items_after_statements,
    unreachable_pub,
    clippy::print_stdout
)]
mod common;

use common::{MockBackend, PASSWORD};
use futures::StreamExt;
use medtrack_session::error::ClientError;
use reqwest::StatusCode;
use std::sync::atomic::Ordering;

#[tokio::test]
async fn test_login_persists_session_and_signals_state() {
    let backend = MockBackend::spawn().await;
    let ctx = backend.client().await;

    let mut state = ctx.tokens.login_state_stream();
    assert_eq!(state.next().await, Some(false));

    let user = ctx.auth.login("alice", PASSWORD).await.unwrap();
    assert_eq!(user.user_id, "7");
    assert_eq!(user.username, "alice");

    assert_eq!(state.next().await, Some(true));
    assert!(ctx.tokens.is_logged_in().await);
    assert_eq!(ctx.tokens.access_token().await.unwrap(), backend.state.access_token());

    let stored = ctx.tokens.user_info().await.unwrap();
    assert_eq!(stored.email, "alice@example.com");
}

#[tokio::test]
async fn test_bad_credentials_keep_server_message() {
    let backend = MockBackend::spawn().await;
    let ctx = backend.client().await;

    let err = ctx.auth.login("alice", "wrong").await.unwrap_err();
    match err {
        ClientError::Api { status, message } => {
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(message, "Invalid credentials");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // A rejected login is not an expired session.
    assert_eq!(backend.state.refresh_calls.load(Ordering::SeqCst), 0);
    assert!(!ctx.tokens.is_logged_in().await);
}

#[tokio::test]
async fn test_current_user_sends_stored_token() {
    let backend = MockBackend::spawn().await;
    let ctx = backend.client().await;
    ctx.auth.login("alice", PASSWORD).await.unwrap();

    let me = ctx.auth.current_user().await.unwrap();
    assert_eq!(me.username, "alice");
    assert_eq!(backend.state.auth_headers_for("/api/v1/users/me"), vec![Some("Bearer access-1".to_string())]);
}

#[tokio::test]
async fn test_current_user_requires_session() {
    let backend = MockBackend::spawn().await;
    let ctx = backend.client().await;

    let err = ctx.auth.current_user().await.unwrap_err();
    assert!(matches!(err, ClientError::NotLoggedIn));
    assert_eq!(backend.state.requests_to("/api/v1/users/me"), 0);
}

#[tokio::test]
async fn test_logout_revokes_and_clears() {
    let backend = MockBackend::spawn().await;
    let ctx = backend.client().await;
    ctx.auth.login("alice", PASSWORD).await.unwrap();

    let mut state = ctx.tokens.login_state();
    ctx.auth.logout().await;

    assert_eq!(backend.state.logout_calls.load(Ordering::SeqCst), 1);
    assert!(state.has_changed().unwrap());
    assert!(!*state.borrow_and_update());
    assert!(ctx.tokens.access_token().await.is_none());
    assert!(ctx.tokens.refresh_token().await.is_none());
    assert!(ctx.tokens.session().await.is_none());
}

#[tokio::test]
async fn test_teardown_logs_out() {
    let backend = MockBackend::spawn().await;
    let ctx = backend.client().await;
    ctx.auth.login("alice", PASSWORD).await.unwrap();

    let tokens = ctx.tokens.clone();
    ctx.teardown().await;

    assert_eq!(backend.state.logout_calls.load(Ordering::SeqCst), 1);
    assert!(!tokens.is_logged_in().await);
}
