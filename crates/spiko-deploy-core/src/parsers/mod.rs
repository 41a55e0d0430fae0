//! Parsers for deploy config and dotenv files

pub mod config;
pub mod env_file;

pub use config::{ConfigParser, PROJECT_CONFIG_FILE};
pub use env_file::EnvFile;
