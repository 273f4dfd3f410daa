mod types;
pub use types::*;

pub mod error;
pub use error::{ReconError, Result};

pub mod index;
pub mod grid;
pub mod geometry;
pub mod system_matrix;
pub mod projector;
pub mod image;
pub mod penalty;
pub mod apml;
pub use apml::reconstruct;
pub mod config;
pub use config::apml::{read_config_file, Config};
pub mod phantom;
pub mod fom;
