pub mod config;
pub mod error;
pub mod types;

pub use config::DocvoxConfig;
pub use error::{DocvoxError, Result};
pub use types::*;
