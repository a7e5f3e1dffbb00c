//! Runtime configuration read from the environment.

use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use secrecy::SecretString;
use thiserror::Error;
use tracing::{info, warn};

const DEV_JWT_SECRET: &str = "dev-only-insecure-jwt-secret";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub chat_model: String,
    pub embed_model: String,
}

#[derive(Debug, Clone, Copy)]
pub struct RagConfig {
    /// Chunks must score strictly above this to be used as context
    pub similarity_threshold: f64,
    pub top_k: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.35,
            top_k: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HomeworkConfig {
    pub files_dir: PathBuf,
    pub remote_files_url: String,
    pub api_url: String,
    pub api_token: Option<SecretString>,
}

#[derive(Debug, Clone)]
pub struct AdminBootstrap {
    pub email: String,
    pub password: SecretString,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: SecretString,
    pub jwt_expiration_secs: i64,
    pub jwt_issuer: String,
    pub bcrypt_cost: u32,
    pub ollama: OllamaConfig,
    pub rag: RagConfig,
    pub documents_dir: PathBuf,
    pub homework: HomeworkConfig,
    pub admin_bootstrap: Option<AdminBootstrap>,
    /// Empty means any origin
    pub cors_allowed_origins: Vec<String>,
    /// Take the client address from `X-Forwarded-For`/`X-Real-IP`; only safe behind a proxy that sets them
    pub trust_proxy_headers: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; `from_env` passes the process environment
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env { lookup };

        let jwt_secret = match env.optional("JWT_SECRET") {
            Some(secret) => secret,
            None if cfg!(debug_assertions) => {
                warn!("JWT_SECRET not set, using an insecure development secret");
                DEV_JWT_SECRET.to_string()
            }
            None => return Err(ConfigError::Missing("JWT_SECRET")),
        };

        let admin_bootstrap = match (env.optional("ADMIN_EMAIL"), env.optional("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminBootstrap {
                email,
                password: password.into(),
            }),
            (Some(_), None) | (None, Some(_)) => {
                warn!("ADMIN_EMAIL and ADMIN_PASSWORD must both be set, skipping admin bootstrap");
                None
            }
            (None, None) => None,
        };

        let bcrypt_cost: u32 = env.parse("BCRYPT_COST", "10")?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid {
                key: "BCRYPT_COST",
                reason: format!("{bcrypt_cost} is outside 4..=31"),
            });
        }

        Ok(Self {
            database_url: env.string("DATABASE_URL", "sqlite://family_assistant.db"),
            host: env.string("HOST", "127.0.0.1"),
            port: env.parse("PORT", "8080")?,
            jwt_secret: jwt_secret.into(),
            jwt_expiration_secs: env.parse("JWT_EXPIRATION_SECS", "604800")?,
            jwt_issuer: env.string("JWT_ISSUER", "angular-chat-app"),
            bcrypt_cost,
            ollama: OllamaConfig {
                base_url: trim_url(env.string("OLLAMA_BASE_URL", "http://127.0.0.1:11434")),
                chat_model: env.string("OLLAMA_CHAT_MODEL", "llama3.2"),
                embed_model: env.string("OLLAMA_EMBED_MODEL", "mxbai-embed-large"),
            },
            rag: RagConfig {
                similarity_threshold: env.parse("RAG_SIMILARITY_THRESHOLD", "0.35")?,
                top_k: env.parse("RAG_TOP_K", "5")?,
            },
            documents_dir: env.string("DOCUMENTS_DIR", "./documents").into(),
            homework: HomeworkConfig {
                files_dir: env.string("HOMEWORK_FILES_DIR", "./homework_files").into(),
                remote_files_url: trim_url(
                    env.string("HOMEWORK_REMOTE_FILES_URL", "https://staff.rafi9ni.pro"),
                ),
                api_url: trim_url(env.string("HOMEWORK_API_URL", "https://mon-compte.rafi9ni.pro")),
                api_token: env.optional("HOMEWORK_API_TOKEN").map(SecretString::from),
            },
            admin_bootstrap,
            cors_allowed_origins: env
                .optional("CORS_ALLOWED_ORIGINS")
                .map(|origins| {
                    origins
                        .split(',')
                        .map(str::trim)
                        .filter(|o| !o.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            trust_proxy_headers: env.parse("TRUST_PROXY_HEADERS", "false")?,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

struct Env<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
    }

    fn parse<T: FromStr>(&self, key: &'static str, default: &str) -> Result<T, ConfigError>
    where
        T::Err: Display,
    {
        let raw = self.string(key, default);
        raw.trim().parse().map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");
            ConfigError::Invalid {
                key,
                reason: format!("{raw:?}: {e}"),
            }
        })
    }
}

fn trim_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
