use log::{debug, info};
use serde::Serialize;

use crate::{
    auth::{hash_password, verify_password, HashConfig, JwtClaims, Role, TokenPair, TokenService},
    errors::MarketError,
    models::{
        NewSeller,
        NewUser,
        SellerProfile,
        SignInInput,
        SignUpSellerInput,
        SignUpUserInput,
        UserProfile,
    },
    store::MarketStore,
};

/// The result of a successful login.
#[derive(Debug, Clone, Serialize)]
pub struct Login<T> {
    pub account: T,
    pub tokens: TokenPair,
}

/// Registration, login and logout for both account kinds.
#[derive(Clone, Debug)]
pub struct AccountApi<B> {
    db: B,
    tokens: TokenService<B>,
    hashing: HashConfig,
}

fn normalize_email(email: &str) -> Result<String, MarketError> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return Err(MarketError::Validation("Email must not be empty".into()));
    }
    if !email.contains('@') {
        return Err(MarketError::Validation(format!("'{email}' is not a valid email address")));
    }
    Ok(email)
}

fn check_password(password: &str) -> Result<(), MarketError> {
    if password.trim().is_empty() {
        return Err(MarketError::Validation("Password must not be empty".into()));
    }
    Ok(())
}

impl<B> AccountApi<B>
where B: MarketStore + Clone
{
    pub fn new(db: B, tokens: TokenService<B>, hashing: HashConfig) -> Self {
        Self { db, tokens, hashing }
    }

    pub async fn register_user(&self, input: SignUpUserInput) -> Result<UserProfile, MarketError> {
        let email = normalize_email(&input.email)?;
        check_password(&input.password)?;
        if self.db.fetch_user_by_email(&email).await?.is_some() {
            debug!("Registration rejected, user {email} already exists");
            return Err(MarketError::Conflict("User already exists".into()));
        }
        let password_hash = hash_password(input.password.trim(), self.hashing)?;
        let user = self
            .db
            .insert_user(NewUser {
                email,
                password_hash,
                first_name: input.first_name,
                last_name: input.last_name,
                phone: input.phone,
                address: input.address,
            })
            .await?;
        info!("Registered user {} ({})", user.id, user.email);
        Ok(user.into())
    }

    pub async fn register_seller(&self, input: SignUpSellerInput) -> Result<SellerProfile, MarketError> {
        let email = normalize_email(&input.email)?;
        check_password(&input.password)?;
        if self.db.fetch_seller_by_email(&email).await?.is_some() {
            debug!("Registration rejected, seller {email} already exists");
            return Err(MarketError::Conflict("Seller already exists".into()));
        }
        let password_hash = hash_password(input.password.trim(), self.hashing)?;
        let seller = self
            .db
            .insert_seller(NewSeller {
                email,
                password_hash,
                first_name: input.first_name,
                last_name: input.last_name,
                phone: input.phone,
                address: input.address,
                date_of_birth: input.date_of_birth,
                store_name: input.store_name,
                store_category: input.store_category,
            })
            .await?;
        info!("Registered seller {} ({})", seller.id, seller.email);
        Ok(seller.into())
    }

    pub async fn login_user(&self, input: SignInInput) -> Result<Login<UserProfile>, MarketError> {
        let (email, password) = credentials(&input)?;
        let user = self
            .db
            .fetch_user_by_email(&email)
            .await?
            .ok_or_else(|| MarketError::NotFound(format!("Email {email}")))?;
        if !verify_password(&user.password_hash, password) {
            return Err(MarketError::Unauthorized("Invalid password".into()));
        }
        let tokens = self.tokens.issue(user.id, Role::User)?;
        info!("User {} logged in", user.id);
        Ok(Login { account: user.into(), tokens })
    }

    pub async fn login_seller(&self, input: SignInInput) -> Result<Login<SellerProfile>, MarketError> {
        let (email, password) = credentials(&input)?;
        let seller = self
            .db
            .fetch_seller_by_email(&email)
            .await?
            .ok_or_else(|| MarketError::NotFound(format!("Email {email}")))?;
        if !verify_password(&seller.password_hash, password) {
            return Err(MarketError::Unauthorized("Invalid password".into()));
        }
        let tokens = self.tokens.issue(seller.id, Role::Seller)?;
        info!("Seller {} logged in", seller.id);
        Ok(Login { account: seller.into(), tokens })
    }

    pub async fn refresh(&self, refresh_token: &str, role: Role) -> Result<TokenPair, MarketError> {
        let (claims, pair): (JwtClaims, TokenPair) = self.tokens.refresh(refresh_token, role).await?;
        debug!("Rotated tokens for {role:?} {}", claims.sub);
        Ok(pair)
    }

    /// Revokes the access token used for the request and, if supplied, the matching refresh token.
    pub async fn logout(&self, access_token: &str, refresh_token: Option<&str>) -> Result<(), MarketError> {
        self.tokens.revoke(access_token).await?;
        if let Some(token) = refresh_token.filter(|t| !t.trim().is_empty()) {
            self.tokens.revoke(token.trim()).await?;
        }
        Ok(())
    }
}

fn credentials(input: &SignInInput) -> Result<(String, &str), MarketError> {
    let password = input.password.trim();
    if input.email.trim().is_empty() {
        return Err(MarketError::Validation("Email must not be empty".into()));
    }
    if password.is_empty() {
        return Err(MarketError::Validation("Password must not be empty".into()));
    }
    Ok((input.email.trim().to_lowercase(), password))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{market::test_utils::context, store::MemoryStore};

    fn sign_up(email: &str) -> SignUpUserInput {
        SignUpUserInput { email: email.into(), password: "hunter22".into(), ..Default::default() }
    }

    fn sign_in(email: &str, password: &str) -> SignInInput {
        SignInInput { email: email.into(), password: password.into() }
    }

    #[actix_web::test]
    async fn registering_the_same_email_twice_conflicts() {
        let ctx = context(MemoryStore::new());
        ctx.accounts.register_user(sign_up("ada@example.com")).await.unwrap();
        let err = ctx.accounts.register_user(sign_up(" ADA@example.com ")).await.unwrap_err();
        assert!(matches!(err, MarketError::Conflict(_)));
        // Sellers live in their own namespace
        let seller = SignUpSellerInput { email: "ada@example.com".into(), password: "pw".into(), ..Default::default() };
        ctx.accounts.register_seller(seller.clone()).await.unwrap();
        let err = ctx.accounts.register_seller(seller).await.unwrap_err();
        assert!(matches!(err, MarketError::Conflict(_)));
    }

    #[actix_web::test]
    async fn registration_validates_input() {
        let ctx = context(MemoryStore::new());
        let err = ctx.accounts.register_user(sign_up("   ")).await.unwrap_err();
        assert!(matches!(err, MarketError::Validation(_)));
        let err = ctx.accounts.register_user(sign_up("no-at-sign")).await.unwrap_err();
        assert!(matches!(err, MarketError::Validation(_)));
        let input = SignUpUserInput { email: "x@y.z".into(), password: " ".into(), ..Default::default() };
        let err = ctx.accounts.register_user(input).await.unwrap_err();
        assert!(matches!(err, MarketError::Validation(_)));
    }

    #[actix_web::test]
    async fn login_flow() {
        let ctx = context(MemoryStore::new());
        let profile = ctx.accounts.register_user(sign_up("bob@example.com")).await.unwrap();

        let err = ctx.accounts.login_user(sign_in("", "x")).await.unwrap_err();
        assert!(matches!(err, MarketError::Validation(_)));
        let err = ctx.accounts.login_user(sign_in("nobody@example.com", "hunter22")).await.unwrap_err();
        assert!(matches!(err, MarketError::NotFound(_)));
        let err = ctx.accounts.login_user(sign_in("bob@example.com", "wrong")).await.unwrap_err();
        assert!(matches!(err, MarketError::Unauthorized(_)));
        // a user cannot log in through the seller door
        let err = ctx.accounts.login_seller(sign_in("bob@example.com", "hunter22")).await.unwrap_err();
        assert!(matches!(err, MarketError::NotFound(_)));

        let login = ctx.accounts.login_user(sign_in(" bob@example.com ", " hunter22 ")).await.unwrap();
        assert_eq!(login.account, profile);
        let principal = ctx.access.authorize(&login.tokens.access_token, Role::User).await.unwrap();
        assert_eq!(principal.role(), Role::User);
    }

    #[actix_web::test]
    async fn logout_revokes_both_tokens() {
        let ctx = context(MemoryStore::new());
        ctx.accounts.register_user(sign_up("carol@example.com")).await.unwrap();
        let login = ctx.accounts.login_user(sign_in("carol@example.com", "hunter22")).await.unwrap();
        ctx.accounts.logout(&login.tokens.access_token, Some(&login.tokens.refresh_token)).await.unwrap();
        assert!(ctx.access.authorize(&login.tokens.access_token, Role::User).await.is_err());
        let err = ctx.accounts.refresh(&login.tokens.refresh_token, Role::User).await.unwrap_err();
        assert!(matches!(err, MarketError::Unauthorized(_)));
    }
}
