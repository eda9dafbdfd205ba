use std::path::PathBuf;

/// Shortest allowed scheduled-collection interval
pub const MIN_COLLECT_INTERVAL_SECS: u64 = 10;

/// Placeholder shipped in sample env files; never sent as a credential
pub const ACCESS_TOKEN_PLACEHOLDER: &str = "YOUR_ACCESS_TOKEN_HERE";

/// Server configuration
///
/// # Environment variables
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | WORK_DIR | ./data | Working directory (database, uploads, logs) |
/// | DATABASE_PATH | {WORK_DIR}/fulfillment.db | SQLite file |
/// | HTTP_PORT | 3000 | Management API port |
/// | ENVIRONMENT | development | development / production |
/// | LOG_LEVEL | info | Crate log level (RUST_LOG overrides) |
/// | LOG_DIR | - | Daily rolling log directory |
/// | STORE_NAME | Gift Card Shop | Prefix of customer messages |
/// | REQUEST_TIMEOUT_SECS | 20 | Timeout for every outbound call |
/// | COLLECT_INTERVAL_SECS | 30 | Scheduled collection interval (min 10) |
/// | AUTO_COLLECT | false | Start scheduled collection at boot |
/// | COLLECT_WINDOW_HOURS | 24 | Look-back window for order listing |
/// | MARKETPLACE_API_URL | https://api.commerce.naver.com | Order source base URL |
/// | MARKETPLACE_CLIENT_ID / _SECRET | - | Client-credential pair |
/// | MARKETPLACE_ACCESS_TOKEN | - | Pre-issued bearer token |
/// | SMS_API_URL | https://sens.apigw.ntruss.com | Messaging gateway base URL |
/// | SMS_ACCESS_KEY / SMS_SECRET_KEY | - | Gateway signing keys |
/// | SMS_SERVICE_ID / SMS_SENDER | - | Gateway service and sender number |
/// | OCR_SERVICE_URL | - | Text extraction endpoint (disabled if unset) |
///
/// # Example
///
/// ```ignore
/// WORK_DIR=/srv/vouchers HTTP_PORT=8080 AUTO_COLLECT=true cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub work_dir: String,
    pub database_path: String,
    pub http_port: u16,
    /// development | production
    pub environment: String,
    pub log_level: Option<String>,
    pub log_dir: Option<String>,
    /// Shown as `[STORE_NAME]` at the top of customer messages
    pub store_name: String,
    pub request_timeout_secs: u64,
    pub collect_interval_secs: u64,
    pub auto_collect: bool,
    pub collect_window_hours: i64,
    pub marketplace: MarketplaceConfig,
    pub sms: SmsConfig,
    pub ocr_service_url: Option<String>,
}

/// Order source credentials
#[derive(Debug, Clone, Default)]
pub struct MarketplaceConfig {
    pub api_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub access_token: Option<String>,
}

impl MarketplaceConfig {
    /// Pre-issued token, unless missing or left at the sample placeholder
    pub fn stored_token(&self) -> Option<&str> {
        self.access_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty() && *t != ACCESS_TOKEN_PLACEHOLDER)
    }

    pub fn can_issue_token(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }
}

/// Messaging gateway credentials
#[derive(Debug, Clone, Default)]
pub struct SmsConfig {
    pub api_url: String,
    pub access_key: String,
    pub secret_key: String,
    pub service_id: String,
    pub sender: String,
}

impl SmsConfig {
    pub fn is_configured(&self) -> bool {
        !self.access_key.is_empty()
            && !self.secret_key.is_empty()
            && !self.service_id.is_empty()
            && !self.sender.is_empty()
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables, defaults for the rest
    pub fn from_env() -> Self {
        let work_dir = env_string("WORK_DIR").unwrap_or_else(|| "./data".into());
        let database_path =
            env_string("DATABASE_PATH").unwrap_or_else(|| format!("{work_dir}/fulfillment.db"));

        Self {
            database_path,
            http_port: env_parse("HTTP_PORT", 3000),
            environment: env_string("ENVIRONMENT").unwrap_or_else(|| "development".into()),
            log_level: env_string("LOG_LEVEL"),
            log_dir: env_string("LOG_DIR"),
            store_name: env_string("STORE_NAME").unwrap_or_else(|| "Gift Card Shop".into()),
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", 20),
            collect_interval_secs: clamp_interval(env_parse("COLLECT_INTERVAL_SECS", 30)),
            auto_collect: env_parse("AUTO_COLLECT", false),
            collect_window_hours: env_parse("COLLECT_WINDOW_HOURS", 24),
            marketplace: MarketplaceConfig {
                api_url: env_string("MARKETPLACE_API_URL")
                    .unwrap_or_else(|| "https://api.commerce.naver.com".into()),
                client_id: env_string("MARKETPLACE_CLIENT_ID").unwrap_or_default(),
                client_secret: env_string("MARKETPLACE_CLIENT_SECRET").unwrap_or_default(),
                access_token: env_string("MARKETPLACE_ACCESS_TOKEN"),
            },
            sms: SmsConfig {
                api_url: env_string("SMS_API_URL")
                    .unwrap_or_else(|| "https://sens.apigw.ntruss.com".into()),
                access_key: env_string("SMS_ACCESS_KEY").unwrap_or_default(),
                secret_key: env_string("SMS_SECRET_KEY").unwrap_or_default(),
                service_id: env_string("SMS_SERVICE_ID").unwrap_or_default(),
                sender: env_string("SMS_SENDER").unwrap_or_default(),
            },
            ocr_service_url: env_string("OCR_SERVICE_URL"),
            work_dir,
        }
    }

    /// Defaults rooted in `work_dir`, no external credentials (tests)
    pub fn with_work_dir(work_dir: impl Into<String>) -> Self {
        let work_dir = work_dir.into();
        Self {
            database_path: format!("{work_dir}/fulfillment.db"),
            http_port: 0,
            environment: "development".into(),
            log_level: None,
            log_dir: None,
            store_name: "Gift Card Shop".into(),
            request_timeout_secs: 20,
            collect_interval_secs: 30,
            auto_collect: false,
            collect_window_hours: 24,
            marketplace: MarketplaceConfig::default(),
            sms: SmsConfig::default(),
            ocr_service_url: None,
            work_dir,
        }
    }

    /// Directory for uploaded image vouchers
    pub fn voucher_upload_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("uploads").join("vouchers")
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Enforce the minimum scheduled-collection interval
pub fn clamp_interval(secs: u64) -> u64 {
    secs.max(MIN_COLLECT_INTERVAL_SECS)
}
