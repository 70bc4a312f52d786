pub mod config;
pub mod error;
pub mod feed;
pub mod types;

pub use config::Config;
pub use error::{ConfigError, Error, Result};
pub use feed::TickSource;
pub use types::*;
