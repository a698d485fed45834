//! Wire types of the HTTP API

pub mod http;

pub use http::{HealthResponse, HttpErrorResponse, VectorizeRequest};
