pub mod authentication;
pub mod password;
pub mod token;
pub mod user;

pub use authentication::*;
pub use password::*;
pub use token::*;
pub use user::*;
