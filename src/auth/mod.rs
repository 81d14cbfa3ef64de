pub mod middleware;
pub mod password;
pub mod rate_limit;
pub mod reset;
pub mod session;
pub mod store;
pub mod token;

pub use middleware::{require_auth, AuthContext};
pub use session::SessionManager;
