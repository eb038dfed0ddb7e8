use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AuthError;
use crate::{config::AuthConfig, store::MarketStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Seller,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// The account id of the user or seller
    pub sub: String,
    pub role: Role,
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

impl JwtClaims {
    pub fn subject_id(&self) -> Result<i64, AuthError> {
        self.sub.parse().map_err(|_| AuthError::Malformed(format!("subject '{}' is not an account id", self.sub)))
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0).single().unwrap_or_else(Utc::now)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Issues, verifies and revokes JWTs. Revoked tokens are kept in the store's blacklist, which is consulted on every
/// verification.
#[derive(Clone)]
pub struct TokenService<B> {
    db: B,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl<B> std::fmt::Debug for TokenService<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TokenService (access ttl {}, refresh ttl {})", self.access_ttl, self.refresh_ttl)
    }
}

impl<B> TokenService<B>
where B: MarketStore
{
    pub fn new(db: B, config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            db,
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            access_ttl: config.access_token_ttl,
            refresh_ttl: config.refresh_token_ttl,
        }
    }

    fn sign(&self, subject: i64, role: Role, kind: TokenKind) -> Result<String, AuthError> {
        let now = Utc::now();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let claims = JwtClaims {
            sub: subject.to_string(),
            role,
            kind,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| AuthError::Signing(e.to_string()))
    }

    /// Issues a fresh access/refresh token pair for the given account.
    pub fn issue(&self, subject: i64, role: Role) -> Result<TokenPair, AuthError> {
        let access_token = self.sign(subject, role, TokenKind::Access)?;
        let refresh_token = self.sign(subject, role, TokenKind::Refresh)?;
        debug!("Issued token pair for {role:?} {subject}");
        Ok(TokenPair { access_token, refresh_token })
    }

    /// Checks the signature and expiry of `token` without consulting the blacklist.
    pub fn decode(&self, token: &str) -> Result<JwtClaims, AuthError> {
        decode::<JwtClaims>(token, &self.decoding_key, &self.validation).map(|data| data.claims).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                ErrorKind::InvalidSignature => AuthError::BadSignature,
                _ => AuthError::Malformed(e.to_string()),
            }
        })
    }

    /// Full verification: signature, expiry, and revocation.
    pub async fn verify(&self, token: &str) -> Result<JwtClaims, AuthError> {
        let claims = self.decode(token)?;
        if self.db.is_token_blacklisted(token).await.map_err(|e| AuthError::Store(e.to_string()))? {
            debug!("Rejected revoked token for subject {}", claims.sub);
            return Err(AuthError::Revoked);
        }
        Ok(claims)
    }

    /// Adds `token` to the blacklist. Tokens that no longer decode (already expired, forged) are still blacklisted,
    /// with an expiry of now.
    pub async fn revoke(&self, token: &str) -> Result<(), AuthError> {
        let expires_at = self.decode(token).map(|c| c.expires_at()).unwrap_or_else(|_| Utc::now());
        self.db.blacklist_token(token, expires_at).await.map_err(|e| AuthError::Store(e.to_string()))?;
        info!("Token revoked");
        Ok(())
    }

    /// Exchanges a valid refresh token for a new pair. The presented refresh token is revoked.
    pub async fn refresh(&self, refresh_token: &str, role: Role) -> Result<(JwtClaims, TokenPair), AuthError> {
        let claims = self.verify(refresh_token).await?;
        if claims.kind != TokenKind::Refresh {
            return Err(AuthError::WrongKind(TokenKind::Refresh));
        }
        if claims.role != role {
            return Err(AuthError::WrongRole(role));
        }
        let subject = claims.subject_id()?;
        self.revoke(refresh_token).await?;
        let pair = self.issue(subject, role)?;
        Ok((claims, pair))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::MemoryStore;

    fn config(secret: &str) -> AuthConfig {
        AuthConfig {
            jwt_secret: secret.to_string(),
            access_token_ttl: Duration::minutes(5),
            refresh_token_ttl: Duration::hours(1),
        }
    }

    #[actix_web::test]
    async fn issued_tokens_verify() {
        let tokens = TokenService::new(MemoryStore::new(), &config("s3cret"));
        let pair = tokens.issue(42, Role::Seller).unwrap();
        assert_ne!(pair.access_token, pair.refresh_token);
        let claims = tokens.verify(&pair.access_token).await.unwrap();
        assert_eq!(claims.subject_id().unwrap(), 42);
        assert_eq!(claims.role, Role::Seller);
        assert_eq!(claims.kind, TokenKind::Access);
        let claims = tokens.verify(&pair.refresh_token).await.unwrap();
        assert_eq!(claims.kind, TokenKind::Refresh);
        assert!(claims.exp > Utc::now().timestamp() + 30 * 60);
    }

    #[actix_web::test]
    async fn revoked_token_fails_even_if_unexpired() {
        let tokens = TokenService::new(MemoryStore::new(), &config("s3cret"));
        let pair = tokens.issue(1, Role::User).unwrap();
        tokens.revoke(&pair.access_token).await.unwrap();
        tokens.revoke(&pair.access_token).await.unwrap();
        let err = tokens.verify(&pair.access_token).await.unwrap_err();
        assert!(matches!(err, AuthError::Revoked));
        assert!(tokens.verify(&pair.refresh_token).await.is_ok());
    }

    #[actix_web::test]
    async fn expired_token_is_rejected() {
        let mut cfg = config("s3cret");
        cfg.access_token_ttl = Duration::seconds(-10);
        let tokens = TokenService::new(MemoryStore::new(), &cfg);
        let pair = tokens.issue(1, Role::User).unwrap();
        let err = tokens.verify(&pair.access_token).await.unwrap_err();
        assert!(matches!(err, AuthError::Expired));
    }

    #[actix_web::test]
    async fn token_signed_with_another_secret_is_rejected() {
        let ours = TokenService::new(MemoryStore::new(), &config("s3cret"));
        let theirs = TokenService::new(MemoryStore::new(), &config("not-our-secret"));
        let pair = theirs.issue(1, Role::User).unwrap();
        let err = ours.verify(&pair.access_token).await.unwrap_err();
        assert!(matches!(err, AuthError::BadSignature));
        let err = ours.verify("garbage").await.unwrap_err();
        assert!(matches!(err, AuthError::Malformed(_)));
    }

    #[actix_web::test]
    async fn refresh_rotates_the_pair() {
        let tokens = TokenService::new(MemoryStore::new(), &config("s3cret"));
        let pair = tokens.issue(9, Role::User).unwrap();
        let err = tokens.refresh(&pair.access_token, Role::User).await.unwrap_err();
        assert!(matches!(err, AuthError::WrongKind(TokenKind::Refresh)));
        let err = tokens.refresh(&pair.refresh_token, Role::Seller).await.unwrap_err();
        assert!(matches!(err, AuthError::WrongRole(Role::Seller)));

        let (claims, new_pair) = tokens.refresh(&pair.refresh_token, Role::User).await.unwrap();
        assert_eq!(claims.subject_id().unwrap(), 9);
        assert!(tokens.verify(&new_pair.access_token).await.is_ok());
        let err = tokens.refresh(&pair.refresh_token, Role::User).await.unwrap_err();
        assert!(matches!(err, AuthError::Revoked));
    }
}
