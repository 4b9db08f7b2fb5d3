mod requests_logging;
mod route_guard;

pub use requests_logging::{log_requests, RequestsLoggingLevel};
pub use route_guard::route_guard;
