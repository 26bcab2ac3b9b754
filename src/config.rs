use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    pub session_secret: String,
    pub session_ttl_hours: i64,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub business_name: String,
    pub notify_webhook_url: Option<String>,
    pub cors_origin: Option<String>,
    pub change_log_retention_days: i64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let admin_token = env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string());
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "slotbook.db".to_string()),
            session_secret: non_empty("SESSION_SECRET").unwrap_or_else(|| admin_token.clone()),
            admin_token,
            session_ttl_hours: env::var("SESSION_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|h| *h > 0)
                .unwrap_or(12),
            admin_email: non_empty("ADMIN_EMAIL"),
            admin_password: non_empty("ADMIN_PASSWORD"),
            business_name: non_empty("BUSINESS_NAME").unwrap_or_else(|| "Booking".to_string()),
            notify_webhook_url: non_empty("NOTIFY_WEBHOOK_URL"),
            cors_origin: non_empty("CORS_ORIGIN"),
            change_log_retention_days: env::var("CHANGE_LOG_RETENTION_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|d| *d > 0)
                .unwrap_or(30),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            database_url: "slotbook.db".to_string(),
            admin_token: "changeme".to_string(),
            session_secret: "changeme".to_string(),
            session_ttl_hours: 12,
            admin_email: None,
            admin_password: None,
            business_name: "Booking".to_string(),
            notify_webhook_url: None,
            cors_origin: None,
            change_log_retention_days: 30,
        }
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
