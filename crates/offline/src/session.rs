//! Authentication and organization context attached to outgoing calls.

use std::sync::RwLock;

use comptoir_core::{OrgId, UserId};

/// Header carrying the selected organization on every API call.
pub const ORG_HEADER: &str = "X-Organization-Id";

#[derive(Debug, Default, Clone)]
struct SessionState {
    token: Option<String>,
    organization: Option<OrgId>,
    user: Option<UserId>,
}

/// Current auth/org context.
///
/// Header pairs are attached at send time, for live calls and for calls
/// about to be queued alike, which means queued entries carry the
/// context that was active at enqueue time. Replays reuse what was
/// captured, not the session active at flush time.
#[derive(Debug, Default)]
pub struct Session {
    inner: RwLock<SessionState>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_token(&self, token: Option<String>) {
        self.inner.write().unwrap().token = token;
    }

    pub fn token(&self) -> Option<String> {
        self.inner.read().unwrap().token.clone()
    }

    pub fn set_organization(&self, organization: Option<OrgId>) {
        self.inner.write().unwrap().organization = organization;
    }

    pub fn organization(&self) -> Option<OrgId> {
        self.inner.read().unwrap().organization
    }

    pub fn set_user(&self, user: Option<UserId>) {
        self.inner.write().unwrap().user = user;
    }

    pub fn user(&self) -> Option<UserId> {
        self.inner.read().unwrap().user
    }

    /// Header pairs for the current context, as plain strings.
    pub fn header_pairs(&self) -> Vec<(String, String)> {
        let state = self.inner.read().unwrap().clone();
        let mut pairs = Vec::new();
        if let Some(token) = &state.token {
            pairs.push(("Authorization".to_string(), format!("Bearer {token}")));
        }
        if let Some(org) = state.organization {
            pairs.push((ORG_HEADER.to_string(), org.to_string()));
        }
        pairs
    }
}
