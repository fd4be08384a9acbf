//! Authentication
//!
//! HS256 bearer tokens with username + role claims, bcrypt password
//! hashing, and the registration/login flows. Admin self-registration is
//! gated by a configured shared secret.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::TravelPlannerError;
use crate::models::{NewUser, Role, User};
use crate::store::UserStore;
use crate::Result;

const DEFAULT_TOKEN_EXPIRY_SECS: u64 = 86_400;

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Username
    pub sub: String,
    /// User role
    pub role: String,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
}

/// Authenticated caller as seen by handlers, extracted by the middleware.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub username: String,
    pub role: Role,
}

/// JWT service
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    token_expiry: u64,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
        validation.validate_exp = true;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            token_expiry: DEFAULT_TOKEN_EXPIRY_SECS,
        }
    }

    pub fn generate_token(&self, user: &User) -> Result<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| TravelPlannerError::Internal(format!("Failed to get current time: {}", e)))?
            .as_secs();

        let claims = Claims {
            sub: user.username.clone(),
            role: user.role.to_string(),
            iat: now,
            exp: now + self.token_expiry,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| TravelPlannerError::Internal(format!("Failed to sign token: {}", e)))
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| TravelPlannerError::Unauthorized(format!("Invalid token: {}", e)))
    }

    /// Validated claims projected onto the handler-facing identity.
    pub fn auth_user(&self, token: &str) -> Result<AuthUser> {
        let claims = self.validate_token(token)?;
        let role = claims
            .role
            .parse()
            .map_err(|_| TravelPlannerError::Unauthorized("Invalid role claim".to_string()))?;

        Ok(AuthUser {
            username: claims.sub,
            role,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

pub struct AuthService {
    users: Arc<dyn UserStore>,
    jwt: JwtService,
    admin_secret_code: String,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, jwt: JwtService, admin_secret_code: String) -> Self {
        Self {
            users,
            jwt,
            admin_secret_code,
        }
    }

    pub async fn register(&self, request: Registration) -> Result<(String, User)> {
        self.register_with_role(request, Role::User).await
    }

    /// Admin registration requires the configured shared secret.
    pub async fn register_admin(
        &self,
        request: Registration,
        admin_secret_code: &str,
    ) -> Result<(String, User)> {
        if admin_secret_code != self.admin_secret_code {
            return Err(TravelPlannerError::Forbidden(
                "Invalid admin secret code".to_string(),
            ));
        }
        self.register_with_role(request, Role::Admin).await
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<(String, User)> {
        let user = self
            .users
            .find_by_username(username)
            .await?
            .ok_or_else(|| TravelPlannerError::Unauthorized("Invalid credentials".to_string()))?;

        let matches = bcrypt::verify(password, &user.password_hash)
            .map_err(|e| TravelPlannerError::Internal(format!("Password check failed: {}", e)))?;

        if !matches {
            return Err(TravelPlannerError::Unauthorized(
                "Invalid credentials".to_string(),
            ));
        }

        let token = self.jwt.generate_token(&user)?;
        Ok((token, user))
    }

    async fn register_with_role(&self, request: Registration, role: Role) -> Result<(String, User)> {
        validate_registration(&request)?;

        if self.users.username_exists(&request.username).await? {
            return Err(TravelPlannerError::Conflict(
                "Username already exists".to_string(),
            ));
        }
        if self.users.email_exists(&request.email).await? {
            return Err(TravelPlannerError::Conflict(
                "Email already exists".to_string(),
            ));
        }

        let password_hash = bcrypt::hash(&request.password, bcrypt::DEFAULT_COST)
            .map_err(|e| TravelPlannerError::Internal(format!("Password hash failed: {}", e)))?;

        let user = self
            .users
            .insert_user(NewUser {
                username: request.username,
                email: request.email,
                password_hash,
                role,
            })
            .await?;

        info!("Registered {} user: {}", user.role, user.username);

        let token = self.jwt.generate_token(&user)?;
        Ok((token, user))
    }
}

fn validate_registration(request: &Registration) -> Result<()> {
    if request.username.trim().is_empty() {
        return Err(TravelPlannerError::ValidationError(
            "Username is required".to_string(),
        ));
    }
    if request.email.trim().is_empty() || !request.email.contains('@') {
        return Err(TravelPlannerError::ValidationError(
            "A valid email is required".to_string(),
        ));
    }
    if request.password.len() < 6 {
        return Err(TravelPlannerError::ValidationError(
            "Password must be at least 6 characters".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn registration(username: &str) -> Registration {
        Registration {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            password: "secret-password".to_string(),
        }
    }

    fn service() -> AuthService {
        AuthService::new(
            Arc::new(MemoryStore::new()),
            JwtService::new("unit-test-secret"),
            "let-me-admin".to_string(),
        )
    }

    #[tokio::test]
    async fn test_register_login_round_trip() {
        let service = service();

        let (token, user) = service.register(registration("alice")).await.unwrap();
        assert_eq!(user.role, Role::User);

        let auth_user = service.jwt.auth_user(&token).unwrap();
        assert_eq!(auth_user.username, "alice");
        assert_eq!(auth_user.role, Role::User);

        let (login_token, _) = service.login("alice", "secret-password").await.unwrap();
        assert!(service.jwt.auth_user(&login_token).is_ok());
    }

    #[tokio::test]
    async fn test_wrong_password_rejected() {
        let service = service();
        service.register(registration("bob")).await.unwrap();

        assert!(matches!(
            service.login("bob", "wrong").await,
            Err(TravelPlannerError::Unauthorized(_))
        ));
        assert!(matches!(
            service.login("nobody", "secret-password").await,
            Err(TravelPlannerError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_username_and_email_conflict() {
        let service = service();
        service.register(registration("carol")).await.unwrap();

        assert!(matches!(
            service.register(registration("carol")).await,
            Err(TravelPlannerError::Conflict(_))
        ));

        let mut dup_email = registration("carla");
        dup_email.email = "carol@example.com".to_string();
        assert!(matches!(
            service.register(dup_email).await,
            Err(TravelPlannerError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_admin_registration_requires_secret() {
        let service = service();

        assert!(matches!(
            service
                .register_admin(registration("dave"), "wrong-code")
                .await,
            Err(TravelPlannerError::Forbidden(_))
        ));

        let (_, admin) = service
            .register_admin(registration("dave"), "let-me-admin")
            .await
            .unwrap();
        assert_eq!(admin.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_registration_validation() {
        let service = service();

        let mut bad = registration("eve");
        bad.password = "short".to_string();
        assert!(matches!(
            service.register(bad).await,
            Err(TravelPlannerError::ValidationError(_))
        ));

        let mut bad = registration("eve");
        bad.email = "not-an-email".to_string();
        assert!(matches!(
            service.register(bad).await,
            Err(TravelPlannerError::ValidationError(_))
        ));
    }

    #[test]
    fn test_garbage_token_rejected() {
        let jwt = JwtService::new("unit-test-secret");
        assert!(jwt.auth_user("not.a.token").is_err());
    }

    #[test]
    fn test_token_from_other_secret_rejected() {
        let jwt_a = JwtService::new("secret-a");
        let jwt_b = JwtService::new("secret-b");

        let user = User {
            id: 1,
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "hash".to_string(),
            role: Role::User,
            created_at: chrono::Utc::now(),
        };

        let token = jwt_a.generate_token(&user).unwrap();
        assert!(jwt_b.auth_user(&token).is_err());
    }
}
