pub mod availability;
pub mod config;
pub mod http_server;
pub mod logging;
pub mod monitor;
pub mod notifications;
pub mod version;
