pub mod config;
pub mod error;
pub mod routes;
pub mod services;
pub mod state;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use routes::build_router;
pub use services::Services;
pub use state::AppState;
