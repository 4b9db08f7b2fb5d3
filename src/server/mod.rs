mod admin_routes;
mod auth_routes;
pub mod config;
pub mod error;
mod http_layers;
mod marketplace_routes;
mod me_routes;
pub mod metrics;
mod notification_routes;
pub mod server;
pub mod session;
pub mod state;
mod webhook_routes;

pub use config::ServerConfig;
pub use error::ApiError;
pub use http_layers::*;
pub use server::{make_app, run_server};
pub use session::Session;
pub use state::ServerState;
pub use webhook_routes::WEBHOOK_SECRET_HEADER;
