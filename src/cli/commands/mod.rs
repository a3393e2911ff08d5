//! Command implementations.

pub mod dump;
pub mod status;
pub mod version;
