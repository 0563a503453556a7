use std::sync::Arc;

use super::claims::AuthContext;
use crate::error::{AppError, AppResult};

/// Set of roles allowed through a [`require_role`] check.
#[derive(Debug, Clone)]
pub struct AllowedRoles(Arc<[String]>);

impl AllowedRoles {
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(roles.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, role: &str) -> bool {
        self.0.iter().any(|r| r == role)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

/// Admits the request only if an identity is attached and its role is in `allowed`.
///
/// A missing identity means authentication was bypassed; it is rejected exactly like a
/// wrong role.
pub fn require_role<R: AsRef<str>>(ctx: Option<&AuthContext>, allowed: &[R]) -> AppResult<()> {
    match ctx {
        Some(ctx) if allowed.iter().any(|r| r.as_ref() == ctx.role()) => Ok(()),
        _ => Err(AppError::InsufficientRole),
    }
}
