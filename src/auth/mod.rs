//! Authentication: password hashing, JWT issuing and the request extractor.

pub mod extractor;
pub mod jwt;
pub mod password;

pub use extractor::AuthUser;
pub use jwt::{Claims, TokenManager};
