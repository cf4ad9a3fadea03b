pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod events;
pub mod host;
pub mod launch;
pub mod query;
pub mod snippet;

pub use app::{ActionExecutor, HostResponse, QueryDispatcher, ResultItem};
pub use config::{AppConfig, ConfigLoader, ConfigPaths, Preferences};
pub use host::{Bridge, HostRequest};
