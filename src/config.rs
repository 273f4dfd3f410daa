//! Configuration files
pub mod apml;
