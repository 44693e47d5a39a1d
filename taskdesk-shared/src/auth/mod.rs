/// Authentication and authorization core
///
/// # Modules
///
/// - [`jwt`]: Token codec (HS256 JWT issue/verify)
/// - [`password`]: Argon2id credential hashing and verification
/// - [`identity`]: Subject → identity resolution
/// - [`middleware`]: Per-request bearer authentication for Axum
/// - [`authorization`]: Task access policy
///
/// # Example
///
/// ```no_run
/// use chrono::Utc;
/// use taskdesk_shared::auth::jwt::TokenCodec;
/// use taskdesk_shared::auth::password::{hash_password, matches};
/// use taskdesk_shared::models::user::Role;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// // Password authentication
/// let hash = hash_password("user_password")?;
/// assert!(matches("user_password", &hash));
///
/// // Token issuance
/// let codec = TokenCodec::new("secret-key-at-least-32-bytes-long!!");
/// let token = codec.issue("user@example.com", Role::User, Utc::now())?;
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod identity;
pub mod jwt;
pub mod middleware;
pub mod password;
