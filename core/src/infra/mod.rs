//! Infrastructure layer - external interfaces

pub mod db;
pub mod event;
pub mod http;
pub mod outbox;
