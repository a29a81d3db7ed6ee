//! API Module
//!
//! HTTP handlers and routing for the storage server REST API.
//!
//! # Endpoints
//! - `PUT /set` - Store a key-value pair
//! - `GET /get/:key` - Retrieve a value by key
//! - `GET /has/:key` - Check whether a live entry exists
//! - `DELETE /del/:key` - Delete a key
//! - `POST /incr/:key`, `POST /decr/:key` - Adjust an integer entry
//! - `GET /keys?prefix=` - List live keys
//! - `POST /clear` - Remove every entry
//! - `GET /health` - Health check endpoint

pub mod error;
pub mod handlers;
pub mod routes;

pub use error::{ApiError, ApiResult};
pub use handlers::*;
pub use routes::create_router;
