pub mod admin_log;
pub mod child;
pub mod conversation;
pub mod document_chunk;
pub mod message;
pub mod tip;
pub mod user;
