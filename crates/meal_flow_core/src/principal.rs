//! Caller identity attached to every request.
//!
//! The transport boundary builds a [`CallerIdentity`] from validated token
//! claims; core logic never reads raw credentials.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{FulfillmentError, Result};

/// Staff role. Exactly one per caller, fixed for the duration of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Manager,
    Pantry,
    Delivery,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Manager, Role::Pantry, Role::Delivery];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manager => "manager",
            Self::Pantry => "pantry",
            Self::Delivery => "delivery",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "manager" => Ok(Self::Manager),
            "pantry" => Ok(Self::Pantry),
            "delivery" => Ok(Self::Delivery),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: Uuid,
    pub role: Role,
}

impl CallerIdentity {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    /// Parse from token claims (`sub`, `role`).
    pub fn from_claims(sub: Option<&str>, role: Option<&str>) -> Result<Self> {
        let sub = sub.ok_or_else(|| FulfillmentError::Unauthenticated("missing sub claim".into()))?;
        let user_id = Uuid::parse_str(sub)
            .map_err(|_| FulfillmentError::Unauthenticated(format!("invalid sub claim: {sub}")))?;
        let role = role
            .ok_or_else(|| FulfillmentError::Unauthenticated("missing role claim".into()))?
            .parse::<Role>()
            .map_err(FulfillmentError::Unauthenticated)?;
        Ok(Self { user_id, role })
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }

    /// Fails with Forbidden unless the caller's role is in `allowed`.
    pub fn require_role(&self, allowed: &[Role]) -> Result<()> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            let allowed: Vec<&str> = allowed.iter().map(Role::as_str).collect();
            Err(FulfillmentError::forbidden(format!(
                "role '{}' is not permitted (requires one of: {})",
                self.role,
                allowed.join(", ")
            )))
        }
    }
}
