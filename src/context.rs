// ABOUTME: Per-request ambient identity slot consulted for tenant isolation
// ABOUTME: Task-local storage set by auth middleware and read by tool handlers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MCPHub Contributors

//! # Request Context
//!
//! A per-task ambient slot holding the authenticated caller's identity.
//! The auth middleware sets it at the start of a tool invocation and clears
//! it on every exit path; the tool handler reads it to enforce tenant
//! isolation. The slot is task-local, so concurrent requests never observe
//! each other's identity.
//!
//! Every logical request must run inside [`scope`]; `set`/`get`/`clear` are
//! no-ops outside one.

use std::cell::RefCell;
use std::future::Future;

/// Authenticated caller identity propagated to tool handlers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestIdentity {
    /// API key identifier ("master" for the master key, "oauth_<sub>" for tokens)
    pub key_id: String,
    /// Project the credential is scoped to, or "*" for global access
    pub project_id: String,
    /// Space-separated scopes granted to the credential
    pub scope: String,
    /// Whether the credential grants cross-tenant access
    pub is_global: bool,
}

impl RequestIdentity {
    /// Identity for the master key
    #[must_use]
    pub fn master() -> Self {
        Self {
            key_id: "master".into(),
            project_id: "*".into(),
            scope: "admin".into(),
            is_global: true,
        }
    }
}

tokio::task_local! {
    static REQUEST_IDENTITY: RefCell<Option<RequestIdentity>>;
}

/// Run a future with a fresh (empty) request-identity slot installed.
///
/// The slot is dropped when the future completes or is cancelled, so a
/// cancelled request can never leak its identity into another task.
pub async fn scope<F>(fut: F) -> F::Output
where
    F: Future,
{
    REQUEST_IDENTITY.scope(RefCell::new(None), fut).await
}

/// Store the caller identity for the current request
pub fn set(identity: RequestIdentity) {
    let installed = REQUEST_IDENTITY
        .try_with(|slot| {
            *slot.borrow_mut() = Some(identity);
        })
        .is_ok();
    if !installed {
        tracing::debug!("request identity set outside of a request scope; ignored");
    }
}

/// Retrieve the caller identity for the current request, if any
#[must_use]
pub fn get() -> Option<RequestIdentity> {
    REQUEST_IDENTITY
        .try_with(|slot| slot.borrow().clone())
        .ok()
        .flatten()
}

/// Clear the caller identity for the current request
pub fn clear() {
    let _ = REQUEST_IDENTITY.try_with(|slot| {
        *slot.borrow_mut() = None;
    });
}
