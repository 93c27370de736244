//! CLI command implementations.

pub mod inspect;
pub mod prune;
pub mod record;
