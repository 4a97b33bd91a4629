//! Core types for Switchboard.

pub mod message;
pub mod stream;

pub use message::*;
pub use stream::*;
