use serde::{Deserialize, Serialize};

/// Role claim carried by a verified principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Customer,
    Admin,
}

impl Role {
    /// Parses a role claim. Unknown roles are treated as customers.
    pub fn from_claim(claim: &str) -> Self {
        if claim.eq_ignore_ascii_case("admin") {
            Role::Admin
        } else {
            Role::Customer
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A caller whose identity has been verified by the identity collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Authenticated email address.
    pub email: String,
    pub role: Role,
}

impl Principal {
    pub fn new(email: impl Into<String>, role: Role) -> Self {
        Self {
            email: email.into(),
            role,
        }
    }

    pub fn customer(email: impl Into<String>) -> Self {
        Self::new(email, Role::Customer)
    }

    pub fn admin(email: impl Into<String>) -> Self {
        Self::new(email, Role::Admin)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
