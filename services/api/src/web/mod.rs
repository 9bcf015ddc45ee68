pub mod middleware;
pub mod rest;
pub mod state;

pub use middleware::require_user;
pub use rest::ApiDoc;
pub use state::AppState;
