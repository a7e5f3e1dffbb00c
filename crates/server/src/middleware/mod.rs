pub mod auth;

pub use auth::{AdminUser, AuthUser, ClientIp, OptionalAuthUser};
