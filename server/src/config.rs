//! Server configuration loaded from environment variables.
//!
//! Every knob has a compiled-in default so the server boots with no
//! environment at all; without `DATABASE_URL` it runs on the in-memory store.

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_HUB_CLIENT_BUFFER: usize = 256;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    /// Postgres URL. `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    /// Queued push messages per live client before deliveries are dropped.
    pub hub_client_buffer: usize,
}

impl ServerConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            port: env_parse("PORT", DEFAULT_PORT),
            database_url: std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            hub_client_buffer: env_parse("HUB_CLIENT_BUFFER", DEFAULT_HUB_CLIENT_BUFFER).max(1),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: None,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            hub_client_buffer: DEFAULT_HUB_CLIENT_BUFFER,
        }
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
