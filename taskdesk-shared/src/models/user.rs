/// User model, roles and resolved identities
///
/// A `User` is the stored account record (including the password hash).
/// An `Identity` is what authentication attaches to a request: the same
/// account minus the credential, immutable for the lifetime of the request.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id BIGSERIAL PRIMARY KEY,
///     email TEXT NOT NULL UNIQUE,
///     password_hash TEXT NOT NULL,
///     role TEXT NOT NULL DEFAULT 'USER'
/// );
/// ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Account role
///
/// Serialized as `"USER"` / `"ADMIN"` both in token claims and in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// Regular account; may act on tasks assigned to it
    User,

    /// Administrator; may manage every task
    Admin,
}

impl Role {
    /// Gets role as its wire string
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored user account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Numeric user ID
    pub id: i64,

    /// Email address, unique across all users; doubles as the token subject
    pub email: String,

    /// Argon2id password hash (PHC string)
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// Account role
    pub role: Role,
}

impl User {
    /// Projects the stored record to the identity attached to requests
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id,
            subject: self.email.clone(),
            role: self.role,
        }
    }
}

/// Input for creating a new user
#[derive(Debug, Clone)]
pub struct CreateUser {
    /// Email address
    pub email: String,

    /// Argon2id password hash (NOT plaintext password!)
    pub password_hash: String,

    /// Account role
    pub role: Role,
}

/// Authenticated identity of a caller
///
/// Sourced from the identity store; never created by the auth layer itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Numeric user ID
    pub id: i64,

    /// Unique subject claim (email)
    pub subject: String,

    /// Account role
    pub role: Role,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_format() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"USER\"");
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"ADMIN\"");

        let parsed: Role = serde_json::from_str("\"ADMIN\"").unwrap();
        assert_eq!(parsed, Role::Admin);
        assert!(serde_json::from_str::<Role>("\"admin\"").is_err());
    }

    #[test]
    fn test_user_identity_projection() {
        let user = User {
            id: 7,
            email: "a@x.com".to_string(),
            password_hash: "$argon2id$...".to_string(),
            role: Role::User,
        };

        let identity = user.identity();
        assert_eq!(identity.id, 7);
        assert_eq!(identity.subject, "a@x.com");
        assert_eq!(identity.role, Role::User);
    }

    #[test]
    fn test_user_serialization_hides_hash() {
        let user = User {
            id: 1,
            email: "a@x.com".to_string(),
            password_hash: "secret-hash".to_string(),
            role: Role::Admin,
        };

        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(json.contains("\"role\":\"ADMIN\""));
    }
}
