use std::path::PathBuf;
use std::time::Duration;

use crate::error::AnalysisError;

const DEFAULT_DB_PORT: u16 = 5432;
const DEFAULT_SOURCE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_JOIN_MEMORY_LIMIT_MB: usize = 2048;

#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapFiles {
    pub transactions: PathBuf,
    pub households: PathBuf,
    pub products: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub database_url: Option<String>,
    pub source_timeout: Duration,
    pub join_memory_limit_bytes: usize,
    pub bootstrap_files: Option<BootstrapFiles>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            source_timeout: Duration::from_secs(DEFAULT_SOURCE_TIMEOUT_SECS),
            join_memory_limit_bytes: DEFAULT_JOIN_MEMORY_LIMIT_MB * 1024 * 1024,
            bootstrap_files: None,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, AnalysisError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup` so tests need not touch the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AnalysisError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = match lookup("DATABASE_URL") {
            Some(url) => Some(url),
            None => database_url_from_parts(&lookup)?,
        };

        let source_timeout = Duration::from_secs(
            parse_or(&lookup, "SOURCE_TIMEOUT_SECS", DEFAULT_SOURCE_TIMEOUT_SECS)?,
        );
        let join_memory_limit_bytes =
            parse_or(&lookup, "JOIN_MEMORY_LIMIT_MB", DEFAULT_JOIN_MEMORY_LIMIT_MB)? * 1024 * 1024;

        let bootstrap_files = match (
            lookup("BOOTSTRAP_TRANSACTIONS_CSV"),
            lookup("BOOTSTRAP_HOUSEHOLDS_CSV"),
            lookup("BOOTSTRAP_PRODUCTS_CSV"),
        ) {
            (Some(transactions), Some(households), Some(products)) => Some(BootstrapFiles {
                transactions: transactions.into(),
                households: households.into(),
                products: products.into(),
            }),
            (None, None, None) => None,
            _ => {
                return Err(AnalysisError::ConfigError {
                    message: "BOOTSTRAP_TRANSACTIONS_CSV, BOOTSTRAP_HOUSEHOLDS_CSV and \
                              BOOTSTRAP_PRODUCTS_CSV must be set together"
                        .to_string(),
                })
            }
        };

        Ok(Self {
            database_url,
            source_timeout,
            join_memory_limit_bytes,
            bootstrap_files,
        })
    }
}

fn database_url_from_parts<F>(lookup: &F) -> Result<Option<String>, AnalysisError>
where
    F: Fn(&str) -> Option<String>,
{
    let (host, name) = match (lookup("DB_HOST"), lookup("DB_NAME")) {
        (Some(host), Some(name)) => (host, name),
        _ => return Ok(None),
    };
    let port = parse_or(lookup, "DB_PORT", DEFAULT_DB_PORT)?;
    let user = lookup("DB_USER").unwrap_or_else(|| "postgres".to_string());
    let credentials = match lookup("DB_PASS") {
        Some(password) => format!("{}:{}", user, password),
        None => user,
    };
    Ok(Some(format!(
        "postgres://{}@{}:{}/{}",
        credentials, host, port, name
    )))
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AnalysisError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e| AnalysisError::ConfigError {
            message: format!("Invalid {}: {}", key, e),
        }),
        None => Ok(default),
    }
}

/// Hides the credentials of a connection URL for logging.
pub fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end + 3 => {
            format!("{}***{}", &url[..scheme_end + 3], &url[at..])
        }
        _ => url.to_string(),
    }
}
