pub mod js;
pub mod errors;
pub mod config;

pub use config::LaunchConfig;
pub use errors::to_watch_error;
