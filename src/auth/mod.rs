// Bearer token verification and role-based access control.
// Tokens are issued by the hosted auth provider; this service only verifies them.

pub mod errors;
pub mod jwt;
pub mod middleware;
pub mod models;

pub use errors::*;
pub use jwt::*;
pub use middleware::*;
pub use models::*;
