//! Account registration, login and profile management.

use std::collections::BTreeMap;

use db::{
    DBService,
    models::user::{CreateUser, UpdateProfile, User, UserProfile, UserRole, is_unique_violation},
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;
use utils::jwt::{JwtError, JwtService};

use super::config::AdminBootstrap;

pub const MIN_PASSWORD_CHARS: usize = 6;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Validation failed")]
    Validation(BTreeMap<String, String>),
    #[error("Cet email est déjà utilisé")]
    EmailTaken,
    #[error("Email ou mot de passe incorrect")]
    InvalidCredentials,
    #[error("Utilisateur non trouvé")]
    UserNotFound,
    #[error(transparent)]
    Token(#[from] JwtError),
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct SignupRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct UpdateAccountRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(rename = "newPassword")]
    pub new_password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct VerifyResponse {
    pub user: UserProfile,
}

/// `local@domain.tld`: one `@`, no whitespace, a dotted domain without empty labels
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check_email(email: Option<&str>, errors: &mut BTreeMap<String, String>) {
    match email {
        None => {
            errors.insert("email".into(), "L'email est requis".into());
        }
        Some(email) if !is_valid_email(email) => {
            errors.insert("email".into(), "Email invalide".into());
        }
        Some(_) => {}
    }
}

fn check_password_length(field: &str, password: &str, errors: &mut BTreeMap<String, String>) {
    if password.chars().count() < MIN_PASSWORD_CHARS {
        errors.insert(
            field.into(),
            format!("Le mot de passe doit contenir au moins {MIN_PASSWORD_CHARS} caractères"),
        );
    }
}

#[derive(Clone)]
pub struct AuthService {
    db: DBService,
    jwt: JwtService,
    bcrypt_cost: u32,
}

impl AuthService {
    pub fn new(db: DBService, jwt: JwtService, bcrypt_cost: u32) -> Self {
        Self {
            db,
            jwt,
            bcrypt_cost,
        }
    }

    pub async fn signup(&self, request: SignupRequest) -> Result<AuthResponse, AuthError> {
        let name = present(request.name);
        let email = present(request.email);
        let password = request.password.filter(|p| !p.is_empty());

        let mut errors = BTreeMap::new();
        if name.is_none() {
            errors.insert("name".into(), "Le nom est requis".into());
        }
        check_email(email.as_deref(), &mut errors);
        match &password {
            None => {
                errors.insert("password".into(), "Le mot de passe est requis".into());
            }
            Some(password) => check_password_length("password", password, &mut errors),
        }
        let (Some(name), Some(email), Some(password), true) =
            (name, email, password, errors.is_empty())
        else {
            return Err(AuthError::Validation(errors));
        };

        if User::find_by_email(&self.db.pool, &email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = self.hash_password(password).await?;
        let user = User::create(
            &self.db.pool,
            &CreateUser {
                name,
                email,
                password_hash,
                phone: present(request.phone),
                role: UserRole::User,
            },
        )
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AuthError::EmailTaken
            } else {
                AuthError::Database(e)
            }
        })?;

        info!(user_id = user.id, "account created");
        self.issue(user)
    }

    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, AuthError> {
        let email = present(request.email);
        let password = request.password.filter(|p| !p.is_empty());

        let mut errors = BTreeMap::new();
        if email.is_none() {
            errors.insert("email".into(), "L'email est requis".into());
        }
        if password.is_none() {
            errors.insert("password".into(), "Le mot de passe est requis".into());
        }
        let (Some(email), Some(password)) = (email, password) else {
            return Err(AuthError::Validation(errors));
        };

        let Some(user) = User::find_by_email(&self.db.pool, &email).await? else {
            return Err(AuthError::InvalidCredentials);
        };
        if !verify_password(password, user.password_hash.clone()).await? {
            warn!(user_id = user.id, "failed login");
            return Err(AuthError::InvalidCredentials);
        }

        info!(user_id = user.id, "login");
        self.issue(user)
    }

    /// Profile of the token's subject; the account may have been deleted since issue
    pub async fn profile(&self, user_id: i64) -> Result<UserProfile, AuthError> {
        User::find_by_id(&self.db.pool, user_id)
            .await?
            .map(UserProfile::from)
            .ok_or(AuthError::UserNotFound)
    }

    pub async fn update_account(
        &self,
        user_id: i64,
        request: UpdateAccountRequest,
    ) -> Result<UserProfile, AuthError> {
        let name = present(request.name);
        let email = present(request.email);
        let new_password = request.new_password.filter(|p| !p.is_empty());

        let mut errors = BTreeMap::new();
        if name.is_none() {
            errors.insert("name".into(), "Le nom est requis".into());
        }
        check_email(email.as_deref(), &mut errors);
        if let Some(password) = &new_password {
            check_password_length("newPassword", password, &mut errors);
        }
        let (Some(name), Some(email), true) = (name, email, errors.is_empty()) else {
            return Err(AuthError::Validation(errors));
        };

        let updated = User::update_profile(
            &self.db.pool,
            user_id,
            &UpdateProfile {
                name,
                email,
                phone: present(request.phone),
            },
        )
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AuthError::EmailTaken
            } else {
                AuthError::Database(e)
            }
        })?
        .ok_or(AuthError::UserNotFound)?;

        if let Some(password) = new_password {
            let hash = self.hash_password(password).await?;
            User::update_password_hash(&self.db.pool, user_id, &hash).await?;
            info!(user_id, "password changed");
        }

        Ok(updated.into())
    }

    pub async fn delete_account(&self, user_id: i64) -> Result<(), AuthError> {
        if User::delete(&self.db.pool, user_id).await? == 0 {
            return Err(AuthError::UserNotFound);
        }
        info!(user_id, "account deleted");
        Ok(())
    }

    /// Make sure the configured admin account exists and carries the admin role
    pub async fn ensure_admin(&self, bootstrap: &AdminBootstrap) -> Result<(), AuthError> {
        match User::find_by_email(&self.db.pool, &bootstrap.email).await? {
            Some(user) if user.is_admin() => {}
            Some(user) => {
                User::set_role(&self.db.pool, user.id, UserRole::Admin).await?;
                info!(user_id = user.id, "promoted existing user to admin");
            }
            None => {
                let password_hash = self
                    .hash_password(bootstrap.password.expose_secret().to_string())
                    .await?;
                let user = User::create(
                    &self.db.pool,
                    &CreateUser {
                        name: "Administrateur".into(),
                        email: bootstrap.email.clone(),
                        password_hash,
                        phone: None,
                        role: UserRole::Admin,
                    },
                )
                .await?;
                info!(user_id = user.id, "admin account created");
            }
        }
        Ok(())
    }

    fn issue(&self, user: User) -> Result<AuthResponse, AuthError> {
        let token = self
            .jwt
            .issue(user.id, &user.email, &user.role.to_string())?;
        Ok(AuthResponse {
            token,
            user: user.into(),
        })
    }

    async fn hash_password(&self, password: String) -> Result<String, AuthError> {
        let cost = self.bcrypt_cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| AuthError::Hash(e.to_string()))?
            .map_err(|e| AuthError::Hash(e.to_string()))
    }
}

/// bcrypt check on the blocking pool. Accepts `$2y$` hashes from older deployments.
async fn verify_password(password: String, hash: String) -> Result<bool, AuthError> {
    let result = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AuthError::Hash(e.to_string()))?;
    match result {
        Ok(matches) => Ok(matches),
        Err(e) => {
            warn!(error = %e, "stored password hash is unreadable");
            Ok(false)
        }
    }
}
