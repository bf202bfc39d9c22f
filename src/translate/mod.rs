//! Translation between the public chat completions format and the bridge format.
//!
//! The core of the gateway: converts requests, responses, and streaming events
//! between the two wire formats. All translation code is pure (no I/O).

pub mod bridge_types;
pub mod public_types;
pub mod request;
pub mod response;
pub mod streaming;
