use log::debug;
use std::env;

/// Values that ship in `.env.example` files and must never be treated
/// as a real configuration.
const PLACEHOLDER_VALUES: &[&str] = &[
    "",
    "changeme",
    "your-db-host",
    "your-db-password",
    "your-project-ref.supabase.co",
    "your-api-key",
];

fn is_placeholder(value: &str) -> bool {
    PLACEHOLDER_VALUES.contains(&value.trim())
}

/// Connection settings for the relational backend, read from the
/// current environment on every call so configuration changes take
/// effect without a restart.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
}

impl PostgresConfig {
    pub fn from_env() -> Self {
        PostgresConfig {
            host: env::var("KUEST_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: env::var("KUEST_DB_PORT")
                .unwrap_or_else(|_| "5432".to_string())
                .parse()
                .unwrap_or(5432),
            dbname: env::var("KUEST_DB_NAME").unwrap_or_else(|_| "kuest_db".to_string()),
            user: env::var("KUEST_DB_USER").unwrap_or_else(|_| "kuest_user".to_string()),
            password: env::var("KUEST_DB_PASSWORD").unwrap_or_else(|_| "".to_string()),
        }
    }

    /// Configured means the operator actually set credentials, not the
    /// placeholders from a template file.
    pub fn is_configured(&self) -> bool {
        env::var("KUEST_DB_HOST").is_ok()
            && !is_placeholder(&self.host)
            && !is_placeholder(&self.password)
    }
}

/// Connection settings for the document-bin backend.
#[derive(Debug, Clone)]
pub struct DocBinConfig {
    pub base_url: String,
    pub api_key: String,
    pub collection_id: Option<String>,
}

impl DocBinConfig {
    pub fn from_env() -> Self {
        DocBinConfig {
            base_url: env::var("KUEST_DOCBIN_URL")
                .unwrap_or_else(|_| "https://api.jsonbin.io/v3".to_string()),
            api_key: env::var("KUEST_DOCBIN_KEY").unwrap_or_else(|_| "".to_string()),
            collection_id: env::var("KUEST_DOCBIN_COLLECTION")
                .ok()
                .filter(|c| !is_placeholder(c)),
        }
    }

    pub fn is_configured(&self) -> bool {
        !is_placeholder(&self.api_key) && !is_placeholder(&self.base_url)
    }
}

/// Data directory for the local fallback store.
pub fn local_data_dir() -> std::path::PathBuf {
    let dir = env::var("KUEST_DATA_DIR").unwrap_or_else(|_| ".kuest".to_string());
    debug!("Local data dir: {}", dir);
    std::path::PathBuf::from(dir)
}
