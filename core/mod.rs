// Core module: addresses, service identifiers, configuration and errors (NO I/O)
pub mod types;
pub mod config;
pub mod error;

pub use types::*;
pub use config::*;
pub use error::*;
