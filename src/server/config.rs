use super::RequestsLoggingLevel;

#[derive(Clone)]
pub struct ServerConfig {
    pub requests_logging_level: RequestsLoggingLevel,
    pub port: u16,
    pub frontend_dir_path: Option<String>,
    /// Shared secret of the database webhook. None disables the endpoint.
    pub webhook_secret: Option<String>,
    /// Bearer token of the external cron caller. None disables the endpoint.
    pub cron_secret: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            requests_logging_level: RequestsLoggingLevel::Path,
            port: 3001,
            frontend_dir_path: None,
            webhook_secret: None,
            cron_secret: None,
        }
    }
}
