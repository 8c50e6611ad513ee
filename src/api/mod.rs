//! Gateway to the teaching-record backend.

pub mod absence;
mod backup;
pub mod client;
pub mod export;
pub mod operation;
mod reminders;
pub mod result;
pub mod transport;
pub mod types;

pub use client::Gateway;
pub use operation::{Method, Operation};
pub use result::CallResult;
pub use types::Payload;
