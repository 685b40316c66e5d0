//! REST API under `/api`

pub mod handlers;
pub mod response;
pub mod router;
pub mod state;

pub use response::ApiResponse;
pub use state::AppState;
