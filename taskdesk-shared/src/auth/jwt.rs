/// JWT token issuance and verification
///
/// This module provides the token codec used for bearer authentication.
/// Tokens are signed using HS256 (HMAC-SHA256) and carry the caller's
/// subject (email) and role.
///
/// # Security
///
/// - **Algorithm**: HS256 (HMAC with SHA-256)
/// - **Expiration**: Fixed lifetime, 24 hours by default
/// - **Validation**: Signature and claim shape by `jsonwebtoken`, expiry
///   checked against the caller-supplied clock with no leeway
/// - **Secret Management**: The key is handed to [`TokenCodec::new`] once at
///   startup and never changes afterwards
///
/// # Example
///
/// ```
/// use chrono::Utc;
/// use taskdesk_shared::auth::jwt::TokenCodec;
/// use taskdesk_shared::models::user::Role;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let codec = TokenCodec::new("your-secret-key-at-least-32-bytes-long");
/// let now = Utc::now();
///
/// let token = codec.issue("a@x.com", Role::User, now)?;
/// let claims = codec.verify(&token, now)?;
/// assert_eq!(claims.sub, "a@x.com");
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::user::Role;

/// Default token lifetime (24 hours)
pub const DEFAULT_TTL_SECONDS: i64 = 86_400;

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Token signature, format or claims are invalid
    #[error("Invalid token: {0}")]
    Invalid(String),

    /// Token has expired
    #[error("Token has expired")]
    Expired,
}

/// JWT claims structure
///
/// - `sub`: Subject (email)
/// - `role`: Account role at issue time
/// - `iat`: Issued at (Unix timestamp)
/// - `exp`: Expiration (Unix timestamp), `iat + ttl`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    /// Checks if the claims are expired at `now`
    ///
    /// A token is valid strictly before `exp`; at `exp` it is expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.exp
    }
}

/// Stateless token codec
///
/// Holds the read-only signing material. Cheap to share behind an `Arc` and
/// safe to call from any number of tasks concurrently.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("ttl_seconds", &self.ttl.num_seconds())
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Creates a codec with the default 24 hour lifetime
    pub fn new(secret: &str) -> Self {
        Self::with_ttl(secret, Duration::seconds(DEFAULT_TTL_SECONDS))
    }

    /// Creates a codec with a custom token lifetime
    pub fn with_ttl(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    /// Token lifetime
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issues a signed token for `subject` valid from `now` for one TTL
    ///
    /// # Errors
    ///
    /// Returns `JwtError::CreateError` if the expiry is out of range or
    /// encoding fails
    pub fn issue(&self, subject: &str, role: Role, now: DateTime<Utc>) -> Result<String, JwtError> {
        let exp = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| JwtError::CreateError("Token expiry out of range".to_string()))?;

        let claims = Claims {
            sub: subject.to_string(),
            role,
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
    }

    /// Verifies a token and extracts its claims
    ///
    /// Verifies:
    /// - Signature matches the signing key
    /// - Token is well-formed and carries `sub`, `role`, `iat`, `exp`
    /// - `now` is strictly before `exp`
    ///
    /// # Errors
    ///
    /// - `JwtError::Expired` when `now >= exp`
    /// - `JwtError::Invalid` for every other failure, including unexpected
    ///   decoder errors
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked below against the injected clock.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["sub", "exp"]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| JwtError::Invalid(e.to_string()))?;

        let claims = token_data.claims;
        if claims.is_expired_at(now) {
            return Err(JwtError::Expired);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn epoch(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(seconds, 0).unwrap()
    }

    #[test]
    fn test_issue_and_verify() {
        let codec = TokenCodec::new(SECRET);
        let now = Utc::now();

        let token = codec.issue("a@x.com", Role::Admin, now).expect("Should issue token");
        assert_eq!(token.split('.').count(), 3);

        let claims = codec.verify(&token, now).expect("Should verify token");
        assert_eq!(claims.sub, "a@x.com");
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.iat, now.timestamp());
        assert_eq!(claims.exp, now.timestamp() + DEFAULT_TTL_SECONDS);
    }

    #[test]
    fn test_expiry_boundary() {
        let codec = TokenCodec::new(SECRET);
        let token = codec.issue("a@x.com", Role::User, epoch(0)).unwrap();

        let claims = codec.verify(&token, epoch(86_399)).expect("Valid one second before expiry");
        assert_eq!(claims.sub, "a@x.com");
        assert_eq!(claims.role, Role::User);

        let result = codec.verify(&token, epoch(86_400));
        assert!(matches!(result, Err(JwtError::Expired)));

        let result = codec.verify(&token, epoch(200_000));
        assert!(matches!(result, Err(JwtError::Expired)));
    }

    #[test]
    fn test_verify_within_ttl_for_all_roles() {
        let codec = TokenCodec::new(SECRET);
        let issued = epoch(1_700_000_000);

        for role in [Role::User, Role::Admin] {
            let token = codec.issue("someone@x.com", role, issued).unwrap();
            for delta in [0, 1, 3_600, 86_399] {
                let claims = codec.verify(&token, issued + Duration::seconds(delta)).unwrap();
                assert_eq!(claims.role, role);
                assert_eq!(claims.sub, "someone@x.com");
            }
            for delta in [86_400, 86_401, 1_000_000] {
                assert!(codec.verify(&token, issued + Duration::seconds(delta)).is_err());
            }
        }
    }

    #[test]
    fn test_custom_ttl() {
        let codec = TokenCodec::with_ttl(SECRET, Duration::seconds(60));
        let token = codec.issue("a@x.com", Role::User, epoch(1_000)).unwrap();

        assert!(codec.verify(&token, epoch(1_059)).is_ok());
        assert!(matches!(codec.verify(&token, epoch(1_060)), Err(JwtError::Expired)));
    }

    #[test]
    fn test_verify_with_wrong_secret() {
        let now = Utc::now();
        let token = TokenCodec::new(SECRET).issue("a@x.com", Role::User, now).unwrap();

        let other = TokenCodec::new("another-secret-key-that-is-32-bytes-long");
        let result = other.verify(&token, now);
        assert!(matches!(result, Err(JwtError::Invalid(_))));
    }

    #[test]
    fn test_verify_malformed_tokens() {
        let codec = TokenCodec::new(SECRET);
        let now = Utc::now();
        let token = codec.issue("a@x.com", Role::User, now).unwrap();

        let truncated = &token[..token.len() - 5];
        assert!(matches!(codec.verify(truncated, now), Err(JwtError::Invalid(_))));

        for garbage in ["", "not-a-token", "a.b", "a.b.c", "...."] {
            assert!(
                matches!(codec.verify(garbage, now), Err(JwtError::Invalid(_))),
                "'{}' should be rejected",
                garbage
            );
        }
    }

    #[test]
    fn test_verify_tampered_claims() {
        let codec = TokenCodec::new(SECRET);
        let now = Utc::now();
        let user_token = codec.issue("a@x.com", Role::User, now).unwrap();
        let admin_token = codec.issue("a@x.com", Role::Admin, now).unwrap();

        // Admin payload spliced onto the user token's signature
        let user_parts: Vec<&str> = user_token.split('.').collect();
        let admin_parts: Vec<&str> = admin_token.split('.').collect();
        let forged = format!("{}.{}.{}", user_parts[0], admin_parts[1], user_parts[2]);

        assert!(matches!(codec.verify(&forged, now), Err(JwtError::Invalid(_))));
    }

    #[test]
    fn test_claims_expiry_is_exclusive() {
        let claims = Claims {
            sub: "a@x.com".to_string(),
            role: Role::User,
            iat: 0,
            exp: 3_600,
        };

        assert!(claims.is_expired_at(epoch(3_600)));
        assert!(!claims.is_expired_at(epoch(3_599)));
    }

    #[test]
    fn test_issue_with_out_of_range_expiry() {
        let codec = TokenCodec::with_ttl(SECRET, Duration::days(1));

        let result = codec.issue("a@x.com", Role::User, DateTime::<Utc>::MAX_UTC);
        assert!(matches!(result, Err(JwtError::CreateError(_))));
    }
}
