use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{GovernanceError, GovernanceResult};

/// Closed capability set handed out by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Csa,
    TeamLead,
    Admin,
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csa => "CSA",
            Self::TeamLead => "TEAM_LEAD",
            Self::Admin => "ADMIN",
            Self::SuperAdmin => "SUPER_ADMIN",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "CSA" => Some(Self::Csa),
            "TEAM_LEAD" => Some(Self::TeamLead),
            "ADMIN" => Some(Self::Admin),
            "SUPER_ADMIN" => Some(Self::SuperAdmin),
            _ => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin | Self::SuperAdmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// A resolved request identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    pub role: Role,
}

impl Caller {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn require_admin(&self) -> GovernanceResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(GovernanceError::forbidden(format!(
                "role {} may not perform administrative actions",
                self.role
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_roles() {
        assert!(Role::Admin.is_admin());
        assert!(Role::SuperAdmin.is_admin());
        assert!(!Role::TeamLead.is_admin());
        assert!(!Role::Csa.is_admin());
    }

    #[test]
    fn test_require_admin_is_forbidden_for_csa() {
        let caller = Caller::new("u1", Role::Csa);
        assert!(matches!(
            caller.require_admin(),
            Err(GovernanceError::Forbidden(_))
        ));
        assert!(Caller::new("u2", Role::SuperAdmin).require_admin().is_ok());
    }

    #[test]
    fn test_role_round_trips_through_wire_name() {
        for role in [Role::Csa, Role::TeamLead, Role::Admin, Role::SuperAdmin] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("ROOT"), None);
    }
}
