//! Shared types

mod error;
mod ids;

pub use error::{PollxError, Result};
pub use ids::parse_id;
