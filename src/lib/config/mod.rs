pub mod app;
pub mod defaults;
pub mod error;
pub mod loader;
pub mod server;

pub use app::AppConfig;
pub use error::ConfigError;
pub use server::{EnvValue, ServerConfig};
