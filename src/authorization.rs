//! Role checks on an already authenticated caller.
//!
//! The caller is passed explicitly into every service call as a
//! [`Principal`]. Checks only look at the role set it carries.

use std::collections::BTreeSet;

use log::warn;
use serde::Serialize;
use thiserror::Error;

use crate::models::{Role, User, UserID};

/// An error without details, returned when access is denied
#[derive(Debug, Error)]
#[error("Access denied.")]
pub struct AccessDenied;

/// The authenticated caller of an operation
#[derive(Debug, Clone, Serialize)]
pub struct Principal {
    pub user_id: UserID,
    pub username: String,
    pub roles: BTreeSet<Role>,
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.to_string(),
            roles: user.roles.clone(),
        }
    }
}

impl Principal {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

/// Fails with [`AccessDenied`] unless `caller` holds `role`.
pub fn require_role(caller: &Principal, role: Role) -> Result<(), AccessDenied> {
    if caller.has_role(role) {
        Ok(())
    } else {
        warn!("{} denied: {} role required", caller.username, role);
        Err(AccessDenied)
    }
}

/// Fails with [`AccessDenied`] unless `caller` holds at least one of `roles`.
pub fn require_any_role(caller: &Principal, roles: &[Role]) -> Result<(), AccessDenied> {
    if roles.iter().any(|role| caller.has_role(*role)) {
        Ok(())
    } else {
        warn!("{} denied: one of {:?} required", caller.username, roles);
        Err(AccessDenied)
    }
}
