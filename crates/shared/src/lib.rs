//! Shared types for the quizroom live session protocol.

pub mod codec;
pub mod error;
pub mod models;
pub mod protocol;

pub use codec::*;
pub use error::*;
pub use models::*;
pub use protocol::*;
