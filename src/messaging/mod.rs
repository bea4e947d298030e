//! # Messaging Module
//!
//! Message bus abstractions for the pipeline: payload shapes, the base64/JSON
//! envelope, and publisher/subscriber clients.

pub mod clients;
pub mod envelope;
pub mod errors;
pub mod message;

pub use clients::*;
pub use envelope::*;
pub use errors::*;
pub use message::*;
