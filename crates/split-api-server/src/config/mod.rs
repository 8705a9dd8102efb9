pub mod settings;

pub use settings::{AuthConfig, DatabaseConfig, ServerConfig, SessionConfig, Settings};
