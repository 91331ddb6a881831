//! Access control lists attached to resources and the principals of a request.

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;

pub const EVERYONE: &str = "system.Everyone";
pub const AUTHENTICATED: &str = "system.Authenticated";
/// Permission wildcard in an ACE.
pub const ALL_PERMISSIONS: &str = "*";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Allow,
    Deny,
}

/// One ACL entry. Serialised as `["Allow", "system.Everyone", "view"]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ace(pub Action, pub String, pub String);

impl Ace {
    pub fn allow(principal: impl Into<String>, permission: impl Into<String>) -> Self {
        Ace(Action::Allow, principal.into(), permission.into())
    }

    pub fn deny(principal: impl Into<String>, permission: impl Into<String>) -> Self {
        Ace(Action::Deny, principal.into(), permission.into())
    }

    fn covers(&self, permission: &str) -> bool {
        self.2 == ALL_PERMISSIONS || self.2 == permission
    }
}

/// Ordered entries; the first entry matching a principal and the permission decides.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Acl(pub Vec<Ace>);

impl Acl {
    pub fn new(entries: Vec<Ace>) -> Self {
        Acl(entries)
    }

    pub fn permits(&self, principals: &[String], permission: &str) -> bool {
        for ace in &self.0 {
            if ace.covers(permission) && principals.iter().any(|p| *p == ace.1) {
                return ace.0 == Action::Allow;
            }
        }
        false
    }
}

/// Principals established by the application's authentication layer.
///
/// Insert it as a request extension; when it is absent the request is anonymous.
#[derive(Clone, Debug, Default)]
pub struct Principals(pub Vec<String>);

/// Effective principals of a request, including the system principals.
#[derive(Clone, Debug)]
pub struct EffectivePrincipals(pub Vec<String>);

impl EffectivePrincipals {
    pub fn from_parts(parts: &Parts) -> Self {
        let mut out = vec![EVERYONE.to_string()];
        if let Some(Principals(list)) = parts.extensions.get::<Principals>() {
            if !list.is_empty() {
                out.push(AUTHENTICATED.to_string());
                out.extend(list.iter().cloned());
            }
        }
        EffectivePrincipals(out)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for EffectivePrincipals
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(EffectivePrincipals::from_parts(parts))
    }
}

/// Whether a view guarded by `permission` may run. No permission means public;
/// a permission without an ACL is denied.
pub fn authorize(acl: Option<&Acl>, principals: &[String], permission: Option<&str>) -> bool {
    match (permission, acl) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(p), Some(acl)) => acl.permits(principals, p),
    }
}
