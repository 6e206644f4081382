// config.rs
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub port: u16,
    pub run_migrations: bool,
    pub log_level: String,
    pub allowed_origins: Vec<String>,
    // Deadline sweeper
    pub sweep_enabled: bool,
    pub sweep_interval: Duration,
    pub sweep_lease: Duration,
    pub sweep_concurrency: usize,
    pub bidding_reopen_extension: chrono::Duration,
    // Email
    pub resend_api_key: Option<String>,
    pub from_email: String,
}

fn var_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .unwrap_or_else(|_| panic!("{} has an invalid value: {}", name, value)),
        Err(_) => default,
    }
}

impl Config {
    /// Reads the environment. Missing required variables and unparseable
    /// values stop the process at startup.
    pub fn init() -> Config {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let jwt_secret = std::env::var("JWT_SECRET_KEY").expect("JWT_SECRET_KEY must be set");
        let port = var_or("PORT", 8000u16);

        let sweep_interval_secs = var_or("SWEEP_INTERVAL_SECS", 60u64);
        let sweep_lease_secs = var_or("SWEEP_LEASE_SECS", sweep_interval_secs * 2);
        let reopen_hours = var_or("BIDDING_REOPEN_EXTENSION_HOURS", 168i64);

        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173,http://localhost:8000".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let resend_api_key = std::env::var("RESEND_API_KEY")
            .ok()
            .filter(|key| !key.is_empty());
        let from_email = std::env::var("FROM_EMAIL")
            .unwrap_or_else(|_| "no-reply@propertydeals.app".to_string());

        Config {
            database_url,
            jwt_secret,
            port,
            run_migrations: var_or("RUN_MIGRATIONS", false),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "debug".to_string()),
            allowed_origins,
            sweep_enabled: var_or("SWEEP_ENABLED", true),
            sweep_interval: Duration::from_secs(sweep_interval_secs.max(1)),
            sweep_lease: Duration::from_secs(sweep_lease_secs.max(1)),
            sweep_concurrency: var_or("SWEEP_CONCURRENCY", 4usize),
            bidding_reopen_extension: chrono::Duration::hours(reopen_hours),
            resend_api_key,
            from_email,
        }
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Config {
        Config {
            database_url: "postgres://localhost/property_deals_test".to_string(),
            jwt_secret: "test-secret".to_string(),
            port: 8000,
            run_migrations: false,
            log_level: "debug".to_string(),
            allowed_origins: vec![],
            sweep_enabled: false,
            sweep_interval: Duration::from_secs(60),
            sweep_lease: Duration::from_secs(120),
            sweep_concurrency: 4,
            bidding_reopen_extension: chrono::Duration::hours(168),
            resend_api_key: None,
            from_email: "no-reply@propertydeals.app".to_string(),
        }
    }
}
