//! API middleware layer
//!
//! CORS, request logging and request validation helpers.

pub mod cors;
pub mod logging;
pub mod validation;

pub use cors::{cors_layer, cors_layer_restricted};
pub use logging::logging_layer;
pub use validation::{validate_limit, validate_task_id, validate_upload_name, validate_upload_size};
