// src/services/jwt_service.rs
use crate::config::TokenLifetimes;
use crate::models::jwt::{Claims, IssuedToken, TokenPair, TokenType};
use crate::models::user::Identity;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token is malformed or its signature does not verify")]
    Invalid,
    #[error("token has expired")]
    Expired,
    #[error("expected a {expected:?} token")]
    WrongType { expected: TokenType },
    #[error("failed to sign token: {0}")]
    Encoding(String),
}

/// Signs and verifies access/refresh tokens with a single HS256 secret.
///
/// Tokens are stateless: nothing is persisted, so a token stays valid until
/// its own `exp` even after the cookies carrying it are cleared.
#[derive(Clone)]
pub struct JwtService {
    enc_key: EncodingKey,
    dec_key: DecodingKey,
    lifetimes: TokenLifetimes,
}

impl JwtService {
    pub fn new(secret_key: &str, lifetimes: TokenLifetimes) -> Self {
        let enc_key = EncodingKey::from_secret(secret_key.as_bytes());
        let dec_key = DecodingKey::from_secret(secret_key.as_bytes());

        Self {
            enc_key,
            dec_key,
            lifetimes,
        }
    }

    /* ---------- CODEC ---------- */

    pub fn encode(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.enc_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Verify signature, then expiry, then the type claim.
    pub fn decode(&self, token: &str, expected: TokenType) -> Result<Claims, TokenError> {
        self.decode_at(token, expected, Utc::now().timestamp())
    }

    fn decode_at(&self, token: &str, expected: TokenType, now: i64) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // exp is compared against `now` below; a token is expired once now >= exp
        validation.validate_exp = false;
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.dec_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "token rejected");
                TokenError::Invalid
            })?;

        if now >= claims.exp {
            return Err(TokenError::Expired);
        }
        if claims.token_type != expected {
            return Err(TokenError::WrongType { expected });
        }

        Ok(claims)
    }

    /* ---------- ISSUER ---------- */

    /// Mint a fresh refresh/access pair for `identity`.
    #[instrument(skip(self, identity), fields(user_id = identity.id))]
    pub fn issue_for_identity(&self, identity: &Identity) -> Result<TokenPair, TokenError> {
        let now = Utc::now();

        let refresh_claims = Claims::new(identity, TokenType::Refresh, now, self.lifetimes.refresh);
        let access_claims = refresh_claims.derive_access(now, self.lifetimes.access);

        let refresh = self.sign(refresh_claims)?;
        let access = self.sign(access_claims)?;

        Ok(TokenPair { access, refresh })
    }

    /// Exchange a valid refresh token for a new access token bound to the same subject.
    ///
    /// The refresh token itself is neither rotated nor consumed; every call
    /// mints an independent access token.
    #[instrument(skip_all)]
    pub fn refresh_access(&self, refresh_token: &str) -> Result<IssuedToken, TokenError> {
        let refresh_claims = self.decode(refresh_token, TokenType::Refresh)?;
        let access_claims = refresh_claims.derive_access(Utc::now(), self.lifetimes.access);

        debug!(user_id = access_claims.sub, "minted access token from refresh token");
        self.sign(access_claims)
    }

    fn sign(&self, claims: Claims) -> Result<IssuedToken, TokenError> {
        let token = self.encode(&claims)?;
        Ok(IssuedToken { token, claims })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn service() -> JwtService {
        JwtService::new("test-secret-key-for-testing", TokenLifetimes::default())
    }

    fn alice() -> Identity {
        Identity {
            id: 7,
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
        }
    }

    /// Replace the first character of the signature segment.
    fn tamper(token: &str) -> String {
        let sig_start = token.rfind('.').unwrap() + 1;
        let mut bytes = token.as_bytes().to_vec();
        bytes[sig_start] = if bytes[sig_start] == b'A' { b'B' } else { b'A' };
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_issue_then_decode_access_recovers_subject() {
        let jwt = service();
        let pair = jwt.issue_for_identity(&alice()).unwrap();

        let claims = jwt.decode(&pair.access.token, TokenType::Access).unwrap();
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.identity(), alice());
        assert!(claims.exp > Utc::now().timestamp());
        assert_eq!(claims, pair.access.claims);
    }

    #[test]
    fn test_pair_uses_configured_lifetimes() {
        let lifetimes = TokenLifetimes {
            access: Duration::minutes(5),
            refresh: Duration::days(14),
        };
        let jwt = JwtService::new("secret", lifetimes);
        let pair = jwt.issue_for_identity(&alice()).unwrap();

        assert_eq!(pair.access.claims.exp - pair.access.claims.iat, 5 * 60);
        assert_eq!(pair.refresh.claims.exp - pair.refresh.claims.iat, 14 * 24 * 60 * 60);
        assert_eq!(pair.access.claims.sub, pair.refresh.claims.sub);
        assert_eq!(pair.refresh.claims.token_type, TokenType::Refresh);
    }

    #[test]
    fn test_expired_token_rejected_despite_valid_signature() {
        let jwt = service();
        let now = Utc::now();
        let claims = Claims::new(&alice(), TokenType::Access, now - Duration::minutes(30), Duration::minutes(15));
        let token = jwt.encode(&claims).unwrap();

        assert_eq!(jwt.decode(&token, TokenType::Access), Err(TokenError::Expired));
    }

    #[test]
    fn test_token_expires_exactly_at_exp() {
        let jwt = service();
        let pair = jwt.issue_for_identity(&alice()).unwrap();
        let exp = pair.access.expires_at();

        assert!(jwt.decode_at(&pair.access.token, TokenType::Access, exp - 1).is_ok());
        assert_eq!(
            jwt.decode_at(&pair.access.token, TokenType::Access, exp),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn test_wrong_token_type_rejected() {
        let jwt = service();
        let pair = jwt.issue_for_identity(&alice()).unwrap();

        assert_eq!(
            jwt.decode(&pair.refresh.token, TokenType::Access),
            Err(TokenError::WrongType { expected: TokenType::Access })
        );
        assert_eq!(
            jwt.decode(&pair.access.token, TokenType::Refresh),
            Err(TokenError::WrongType { expected: TokenType::Refresh })
        );
        assert_eq!(jwt.refresh_access(&pair.access.token), Err(TokenError::WrongType { expected: TokenType::Refresh }));
    }

    #[test]
    fn test_tampered_refresh_token_is_invalid() {
        let jwt = service();
        let pair = jwt.issue_for_identity(&alice()).unwrap();

        assert_eq!(jwt.refresh_access(&tamper(&pair.refresh.token)), Err(TokenError::Invalid));
    }

    #[test]
    fn test_garbage_and_foreign_secret_are_invalid() {
        let jwt = service();
        let other = JwtService::new("another-secret", TokenLifetimes::default());
        let pair = other.issue_for_identity(&alice()).unwrap();

        assert_eq!(jwt.decode("not-a-token", TokenType::Access), Err(TokenError::Invalid));
        assert_eq!(jwt.decode(&pair.access.token, TokenType::Access), Err(TokenError::Invalid));
    }

    #[test]
    fn test_refresh_twice_yields_distinct_valid_tokens() {
        let jwt = service();
        let pair = jwt.issue_for_identity(&alice()).unwrap();

        let first = jwt.refresh_access(&pair.refresh.token).unwrap();
        let second = jwt.refresh_access(&pair.refresh.token).unwrap();

        assert_ne!(first.token, second.token);
        assert_eq!(jwt.decode(&first.token, TokenType::Access).unwrap().sub, 7);
        assert_eq!(jwt.decode(&second.token, TokenType::Access).unwrap().sub, 7);
    }

    #[test]
    fn test_expired_refresh_token_cannot_mint() {
        let jwt = service();
        let claims = Claims::new(&alice(), TokenType::Refresh, Utc::now() - Duration::days(8), Duration::days(7));
        let token = jwt.encode(&claims).unwrap();

        assert_eq!(jwt.refresh_access(&token), Err(TokenError::Expired));
    }
}
