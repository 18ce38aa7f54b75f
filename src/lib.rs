//! Generation-job client for the Aiko companion product: submit character
//! image/video jobs to the external generation provider and poll them to
//! completion with bounded retries, backoff, and cancellation.

pub mod error;
pub mod schema;
pub mod services;

pub use error::{GenerationError, TransportError};
pub use schema::*;
pub use services::*;
