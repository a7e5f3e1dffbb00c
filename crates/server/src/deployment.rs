use std::sync::Arc;

use db::DBService;
use secrecy::ExposeSecret;
use services::services::{
    admin::AdminService,
    auth::AuthService,
    chatbot::ChatbotService,
    config::Config,
    homework::{HomeworkClient, HomeworkError},
    ollama::{OllamaClient, OllamaError},
};
use thiserror::Error;
use utils::jwt::JwtService;

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Ollama(#[from] OllamaError),
    #[error(transparent)]
    Homework(#[from] HomeworkError),
}

/// Shared application state handed to every route
#[derive(Clone)]
pub struct Deployment {
    config: Arc<Config>,
    db: DBService,
    jwt: JwtService,
    auth: AuthService,
    admin: AdminService,
    ollama: OllamaClient,
    chatbot: ChatbotService,
    homework: HomeworkClient,
}

impl Deployment {
    /// Open the configured database and build every service on top of it
    pub async fn new(config: Config) -> Result<Self, DeploymentError> {
        let db = DBService::new(&config.database_url).await?;
        Self::with_db(config, db)
    }

    pub fn with_db(config: Config, db: DBService) -> Result<Self, DeploymentError> {
        let jwt = JwtService::new(
            config.jwt_secret.expose_secret().as_bytes(),
            config.jwt_expiration_secs,
            config.jwt_issuer.clone(),
        );
        let ollama = OllamaClient::new(&config.ollama)?;
        let homework = HomeworkClient::new(&config.homework)?;

        Ok(Self {
            auth: AuthService::new(db.clone(), jwt.clone(), config.bcrypt_cost),
            admin: AdminService::new(db.clone()),
            chatbot: ChatbotService::new(db.clone(), ollama.clone(), config.rag),
            config: Arc::new(config),
            db,
            jwt,
            ollama,
            homework,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn db(&self) -> &DBService {
        &self.db
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    pub fn admin(&self) -> &AdminService {
        &self.admin
    }

    pub fn ollama(&self) -> &OllamaClient {
        &self.ollama
    }

    pub fn chatbot(&self) -> &ChatbotService {
        &self.chatbot
    }

    pub fn homework(&self) -> &HomeworkClient {
        &self.homework
    }
}
