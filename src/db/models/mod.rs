//! Database models split into domain-specific modules.

pub mod access_token;
pub mod room;
pub mod user;

pub use access_token::*;
pub use room::*;
pub use user::*;
