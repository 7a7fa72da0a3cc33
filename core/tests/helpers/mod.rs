//! Test helper modules for integration tests

pub mod harness;
pub mod http_responder;

pub use harness::*;
pub use http_responder::*;
