//! Request and Response models for the storage server API
//!
//! DTOs used for serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

pub use requests::{validate_key, CounterRequest, KeysQuery, SetRequest, MAX_KEY_LENGTH};
pub use responses::{
    ClearResponse, CounterResponse, DeleteResponse, ErrorResponse, GetResponse, HasResponse,
    HealthResponse, KeysResponse, SetResponse,
};
