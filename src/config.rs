use std::env;

/// Per-action rate limit budget: `limit` attempts per `window_secs` window.
#[derive(Debug, Clone, Copy)]
pub struct RateBudget {
    pub limit: u32,
    pub window_secs: u64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    /// Site-wide secret used for license key hashing and meta encryption.
    /// Rotating it invalidates every issued key.
    pub site_secret: String,
    /// Bearer token for the admin API (admin routes are disabled when unset)
    pub admin_token: Option<String>,
    pub dev_mode: bool,
    /// Default validity for new and renewed licenses, in days
    pub license_validity_days: i64,
    /// Default seat pool size for new licenses
    pub default_max_domains: i64,
    /// Interval between expiry sweep runs, in seconds
    pub expiry_sweep_interval_secs: u64,
    pub verify_budget: RateBudget,
    pub activate_budget: RateBudget,
    pub deactivate_budget: RateBudget,
    pub update_check_budget: RateBudget,
}

fn env_u32(name: &str, default: u32) -> u32 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_i64(name: &str, default: i64) -> i64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("LICENSE_SERVER_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let site_secret = env::var("SITE_SECRET").unwrap_or_else(|_| {
            tracing::warn!("SITE_SECRET not set; falling back to dev default");
            "dev-site-secret".to_string()
        });

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "license_server.db".to_string()),
            site_secret,
            admin_token: env::var("ADMIN_TOKEN").ok(),
            dev_mode,
            license_validity_days: env_i64("LICENSE_VALIDITY_DAYS", 365),
            default_max_domains: env_i64("DEFAULT_MAX_DOMAINS", 1),
            expiry_sweep_interval_secs: env_u32("EXPIRY_SWEEP_INTERVAL_SECS", 3600) as u64,
            verify_budget: RateBudget {
                limit: env_u32("VERIFY_RATE_LIMIT", 30),
                window_secs: 3600,
            },
            activate_budget: RateBudget {
                limit: env_u32("ACTIVATE_RATE_LIMIT", 10),
                window_secs: 3600,
            },
            deactivate_budget: RateBudget {
                limit: env_u32("DEACTIVATE_RATE_LIMIT", 10),
                window_secs: 3600,
            },
            update_check_budget: RateBudget {
                limit: env_u32("UPDATE_CHECK_RATE_LIMIT", 60),
                window_secs: 3600,
            },
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
