//! REST API layer
//!
//! - Novel upload and parse task control
//! - Scene background extraction per episode
//! - Generic task lookup and cancellation
//! - Health

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod response;
pub mod routes;

pub use error::{ApiError, ApiErrorResponse, ApiResult};
pub use response::SuccessResponse;
pub use routes::{create_router, create_router_with_cors, AppState};
