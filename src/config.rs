use serde::{Deserialize, Serialize};
use std::env;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub subscription: SubscriptionConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub postmark: PostmarkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_expires_in: i64,  // seconds
    pub refresh_token_expires_in: i64, // seconds
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Public base URL, used for sitemap entries and login links in emails.
    pub public_url: String,
    #[serde(default)]
    pub allow_public_registration: bool,
    /// Length of the basic-plan trial granted on public registration.
    #[serde(default = "default_trial_days")]
    pub trial_days: i64,
}

fn default_trial_days() -> i64 {
    14
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            public_url: "http://localhost:8080".to_string(),
            allow_public_registration: false,
            trial_days: default_trial_days(),
        }
    }
}

impl AppConfig {
    pub fn login_url(&self) -> String {
        format!("{}/api/v1/auth/login", self.public_url.trim_end_matches('/'))
    }
}

/// What the subscription gate does for a school that has no subscription row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MissingSubscriptionPolicy {
    /// Treat the tenant as ungated.
    #[default]
    Allow,
    /// Treat the tenant as expired.
    Deny,
}

impl std::str::FromStr for MissingSubscriptionPolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(Self::Allow),
            "deny" => Ok(Self::Deny),
            other => Err(AppError::ConfigError(format!(
                "Unknown missing subscription policy: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SubscriptionConfig {
    #[serde(default)]
    pub missing_policy: MissingSubscriptionPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Database holding pending task jobs.
    pub broker_url: String,
    /// Database holding terminal task results.
    pub result_backend_url: String,
    pub poll_interval_secs: u64,
    pub batch_size: u64,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
    pub result_expires_secs: i64,
    /// How long a claimed job may run before another poll takes it back.
    pub visibility_timeout_secs: i64,
    pub run_worker: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            broker_url: String::new(),
            result_backend_url: String::new(),
            poll_interval_secs: 5,
            batch_size: 10,
            max_retries: 3,
            retry_delay_secs: 60,
            result_expires_secs: 3600,
            visibility_timeout_secs: 300,
            run_worker: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PostmarkConfig {
    pub api_key: String,
    pub from_email: String,
    /// Kept as text so that a malformed value is reported by the adapter.
    pub template_id: String,
    pub logo_url: String,
    pub base_url: String,
    pub timeout_secs: u64,
    /// Used by the email task when a job carries no login link.
    #[serde(default)]
    pub default_login_url: Option<String>,
}

impl Default for PostmarkConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            from_email: String::new(),
            template_id: "0".to_string(),
            logo_url: String::new(),
            base_url: "https://api.postmarkapp.com".to_string(),
            timeout_secs: 30,
            default_login_url: None,
        }
    }
}

impl Config {
    pub fn from_toml() -> AppResult<Self> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        // Without a config file everything comes from the environment
        let mut config = match std::fs::read_to_string(&config_path) {
            Ok(config_str) => Self::parse_toml(&config_str)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let database_url = get_env("DATABASE_URL").ok_or_else(|| {
                    AppError::ConfigError(
                        "DATABASE_URL is required when config.toml is absent".to_string(),
                    )
                })?;
                Self::with_defaults(database_url)
            }
            Err(e) => {
                return Err(AppError::ConfigError(format!(
                    "Cannot read config file {config_path}: {e}"
                )));
            }
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn parse_toml(config_str: &str) -> AppResult<Self> {
        toml::from_str(config_str)
            .map_err(|e| AppError::ConfigError(format!("Failed to parse config file: {e}")))
    }

    fn with_defaults(database_url: String) -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: 10,
            },
            jwt: JwtConfig {
                secret: "change-me-in-production".to_string(),
                access_token_expires_in: 7200,
                refresh_token_expires_in: 2_592_000,
            },
            app: AppConfig::default(),
            subscription: SubscriptionConfig::default(),
            queue: QueueConfig::default(),
            postmark: PostmarkConfig::default(),
        }
    }

    fn apply_env_overrides(&mut self) -> AppResult<()> {
        if let Some(v) = get_env("SERVER_HOST") {
            self.server.host = v;
        }
        override_parsed("SERVER_PORT", &mut self.server.port);
        if let Some(v) = get_env("DATABASE_URL") {
            self.database.url = v;
        }
        override_parsed("DB_MAX_CONNECTIONS", &mut self.database.max_connections);
        if let Some(v) = get_env("JWT_SECRET") {
            self.jwt.secret = v;
        }
        override_parsed("JWT_ACCESS_EXPIRES_IN", &mut self.jwt.access_token_expires_in);
        override_parsed("JWT_REFRESH_EXPIRES_IN", &mut self.jwt.refresh_token_expires_in);

        if let Some(v) = get_env("APP_PUBLIC_URL") {
            self.app.public_url = v;
        }
        if let Some(v) = get_env("ALLOW_PUBLIC_REGISTRATION") {
            self.app.allow_public_registration = v.eq_ignore_ascii_case("true");
        }
        override_parsed("TRIAL_DAYS", &mut self.app.trial_days);
        if let Some(v) = get_env("SUBSCRIPTION_MISSING_POLICY") {
            self.subscription.missing_policy = v.parse()?;
        }

        if let Some(v) = get_env("TASK_BROKER_URL") {
            self.queue.broker_url = v;
        }
        if let Some(v) = get_env("TASK_RESULT_BACKEND_URL") {
            self.queue.result_backend_url = v;
        }
        override_parsed("TASK_POLL_INTERVAL_SECS", &mut self.queue.poll_interval_secs);
        override_parsed("TASK_BATCH_SIZE", &mut self.queue.batch_size);
        override_parsed("TASK_MAX_RETRIES", &mut self.queue.max_retries);
        override_parsed("TASK_RETRY_DELAY_SECS", &mut self.queue.retry_delay_secs);
        override_parsed("TASK_RESULT_EXPIRES_SECS", &mut self.queue.result_expires_secs);
        override_parsed(
            "TASK_VISIBILITY_TIMEOUT_SECS",
            &mut self.queue.visibility_timeout_secs,
        );
        override_parsed("TASK_RUN_WORKER", &mut self.queue.run_worker);

        if let Some(v) = get_env("POSTMARK_API_KEY") {
            self.postmark.api_key = v;
        }
        if let Some(v) = get_env("POSTMARK_FROM_EMAIL") {
            self.postmark.from_email = v;
        }
        if let Some(v) = get_env("POSTMARK_TEMPLATE_ID") {
            self.postmark.template_id = v;
        }
        if let Some(v) = get_env("LOGO_URL") {
            self.postmark.logo_url = v;
        }
        if let Some(v) = get_env("POSTMARK_BASE_URL") {
            self.postmark.base_url = v;
        }
        override_parsed("POSTMARK_TIMEOUT_SECS", &mut self.postmark.timeout_secs);
        if let Some(v) = get_env("DEFAULT_LOGIN_URL") {
            self.postmark.default_login_url = Some(v);
        }

        Ok(())
    }

    /// Checks the settings the process cannot start without.
    pub fn validate(&self) -> AppResult<()> {
        if self.queue.broker_url.trim().is_empty() {
            return Err(AppError::ConfigError(
                "TASK_BROKER_URL (queue.broker_url) is required".to_string(),
            ));
        }
        if self.queue.result_backend_url.trim().is_empty() {
            return Err(AppError::ConfigError(
                "TASK_RESULT_BACKEND_URL (queue.result_backend_url) is required".to_string(),
            ));
        }
        if self.queue.poll_interval_secs == 0 {
            return Err(AppError::ConfigError(
                "queue.poll_interval_secs must be positive".to_string(),
            ));
        }
        if self.queue.visibility_timeout_secs <= 0 {
            return Err(AppError::ConfigError(
                "queue.visibility_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Login link put in credential emails when a job does not carry one.
    pub fn default_login_url(&self) -> String {
        self.postmark
            .default_login_url
            .clone()
            .unwrap_or_else(|| self.app.login_url())
    }
}

fn get_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

fn override_parsed<T: std::str::FromStr>(name: &str, target: &mut T) {
    if let Some(v) = get_env(name) {
        match v.parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => log::warn!("Ignoring unparsable value for {name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [server]
        host = "127.0.0.1"
        port = 9000

        [database]
        url = "postgres://localhost/hubsensi"
        max_connections = 5

        [jwt]
        secret = "secret"
        access_token_expires_in = 60
        refresh_token_expires_in = 120

        [app]
        public_url = "https://absen.example.sch.id/"

        [queue]
        broker_url = "postgres://localhost/hubsensi"
        result_backend_url = "postgres://localhost/hubsensi"
        poll_interval_secs = 2
        batch_size = 5
        max_retries = 3
        retry_delay_secs = 60
        result_expires_secs = 3600
        run_worker = false
    "#;

    #[test]
    fn test_parse_toml_with_defaults() {
        let config = Config::parse_toml(SAMPLE).unwrap();
        assert_eq!(config.server.port, 9000);
        assert!(!config.app.allow_public_registration);
        assert_eq!(config.app.trial_days, 14);
        assert_eq!(
            config.subscription.missing_policy,
            MissingSubscriptionPolicy::Allow
        );
        assert_eq!(config.postmark.template_id, "0");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_queue_and_postmark_sections_keep_defaults() {
        let head = SAMPLE.split("[queue]").next().unwrap();
        let toml = format!(
            "{head}
            [queue]
            broker_url = \"postgres://broker/hubsensi\"

            [postmark]
            api_key = \"server-token\"
            "
        );
        let config = Config::parse_toml(&toml).unwrap();
        assert_eq!(config.queue.broker_url, "postgres://broker/hubsensi");
        assert_eq!(config.queue.result_backend_url, "");
        assert_eq!(config.queue.max_retries, 3);
        assert_eq!(config.queue.retry_delay_secs, 60);
        assert_eq!(config.queue.visibility_timeout_secs, 300);
        assert!(config.queue.run_worker);
        assert_eq!(config.postmark.api_key, "server-token");
        assert_eq!(config.postmark.base_url, "https://api.postmarkapp.com");
        assert_eq!(config.postmark.timeout_secs, 30);
    }

    #[test]
    fn test_default_login_url_falls_back_to_public_url() {
        let mut config = Config::parse_toml(SAMPLE).unwrap();
        assert_eq!(
            config.default_login_url(),
            "https://absen.example.sch.id/api/v1/auth/login"
        );

        config.postmark.default_login_url = Some("https://login.example.com".to_string());
        assert_eq!(config.default_login_url(), "https://login.example.com");
    }

    #[test]
    fn test_validate_requires_queue_urls() {
        let mut config = Config::with_defaults("postgres://localhost/db".to_string());
        assert!(matches!(config.validate(), Err(AppError::ConfigError(_))));

        config.queue.broker_url = "postgres://localhost/db".to_string();
        assert!(matches!(config.validate(), Err(AppError::ConfigError(_))));

        config.queue.result_backend_url = "postgres://localhost/db".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_subscription_policy_parse() {
        assert_eq!(
            "Deny".parse::<MissingSubscriptionPolicy>().unwrap(),
            MissingSubscriptionPolicy::Deny
        );
        assert_eq!(
            " allow ".parse::<MissingSubscriptionPolicy>().unwrap(),
            MissingSubscriptionPolicy::Allow
        );
        assert!("sometimes".parse::<MissingSubscriptionPolicy>().is_err());
    }
}
