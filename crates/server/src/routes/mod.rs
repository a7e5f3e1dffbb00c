use axum::Router;

use crate::DeploymentImpl;

pub mod account;
pub mod admin;
pub mod auth;
pub mod chatbot;
pub mod children;
pub mod conversations;
pub mod health;
pub mod homework;
pub mod messages;
pub mod tips;

/// Every route, to be nested under `/api`
pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .merge(health::router(deployment))
        .merge(auth::router(deployment))
        .merge(account::router(deployment))
        .merge(children::router(deployment))
        .merge(tips::router(deployment))
        .merge(conversations::router(deployment))
        .merge(messages::router(deployment))
        .merge(admin::router(deployment))
        .merge(homework::router(deployment))
        .merge(chatbot::router(deployment))
}
