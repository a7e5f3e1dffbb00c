pub mod admin;
pub mod auth;
pub mod chatbot;
pub mod config;
pub mod database_validator;
pub mod document_import;
pub mod homework;
pub mod ollama;
pub mod retrieval;
