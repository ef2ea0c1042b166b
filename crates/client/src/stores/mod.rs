//! Session state derived from server events.

pub mod projection;

pub use projection::{fold, initial, Projection};
