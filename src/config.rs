use anyhow::Context;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use url::Url;

const DEFAULT_NOWPAYMENTS_API_URL: &str = "https://api.nowpayments.io";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Read on its own so logging can start before the full configuration
    /// is loaded, or for commands that never load it.
    pub fn from_env() -> Self {
        dotenv().ok();
        parse_log_format(&env::var("LOG_FORMAT").unwrap_or_default())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_port: u16,
    /// Absent means the in-memory store is used.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub admin_emails: Vec<String>,
    pub nowpayments_api_url: String,
    pub nowpayments_api_key: String,
    pub nowpayments_ipn_secret: Option<String>,
    pub ipn_callback_url: Option<String>,
    /// Absent disables spreadsheet logging.
    pub sheet_logger_url: Option<String>,
    pub sheet_api_key: String,
    pub cors_allowed_origins: Vec<String>,
    pub log_format: LogFormat,
    /// Log sanitized request bodies up to 1KB.
    pub log_request_body: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        let config = Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("SERVER_PORT must be a port number")?,
            database_url: optional("DATABASE_URL"),
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            admin_emails: list(&env::var("ADMIN_EMAILS").unwrap_or_default()),
            nowpayments_api_url: optional("NOWPAYMENTS_API_URL")
                .unwrap_or_else(|| DEFAULT_NOWPAYMENTS_API_URL.to_string()),
            nowpayments_api_key: env::var("NOWPAYMENTS_API_KEY").unwrap_or_default(),
            nowpayments_ipn_secret: optional("NOWPAYMENTS_IPN_SECRET"),
            ipn_callback_url: optional("IPN_CALLBACK_URL"),
            sheet_logger_url: optional("SHEET_LOGGER_URL"),
            sheet_api_key: env::var("SHEET_API_KEY").context("SHEET_API_KEY must be set")?,
            cors_allowed_origins: list(&env::var("CORS_ALLOWED_ORIGINS").unwrap_or_default()),
            log_format: parse_log_format(&env::var("LOG_FORMAT").unwrap_or_default()),
            log_request_body: env::var("LOG_REQUEST_BODY")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .context("LOG_REQUEST_BODY must be true or false")?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.jwt_secret.len() < 16 {
            anyhow::bail!("JWT_SECRET must be at least 16 characters");
        }
        if self.sheet_api_key.is_empty() {
            anyhow::bail!("SHEET_API_KEY must not be empty");
        }

        validate_http_url("NOWPAYMENTS_API_URL", &self.nowpayments_api_url)?;
        if let Some(url) = &self.ipn_callback_url {
            validate_http_url("IPN_CALLBACK_URL", url)?;
        }
        if let Some(url) = &self.sheet_logger_url {
            validate_http_url("SHEET_LOGGER_URL", url)?;
        }
        for origin in &self.cors_allowed_origins {
            validate_http_url("CORS_ALLOWED_ORIGINS", origin)?;
        }
        Ok(())
    }

    pub fn uses_database(&self) -> bool {
        self.database_url.is_some()
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_log_format(raw: &str) -> LogFormat {
    if raw.trim().eq_ignore_ascii_case("json") {
        LogFormat::Json
    } else {
        LogFormat::Text
    }
}

fn validate_http_url(key: &str, raw: &str) -> anyhow::Result<()> {
    let url = Url::parse(raw).with_context(|| format!("{} is not a valid URL: {}", key, raw))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => anyhow::bail!("{} must use http or https, got '{}'", key, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config {
            server_port: 3000,
            database_url: None,
            jwt_secret: "a-long-enough-test-secret".to_string(),
            admin_emails: vec![],
            nowpayments_api_url: DEFAULT_NOWPAYMENTS_API_URL.to_string(),
            nowpayments_api_key: "np-key".to_string(),
            nowpayments_ipn_secret: None,
            ipn_callback_url: None,
            sheet_logger_url: None,
            sheet_api_key: "sheet-key".to_string(),
            cors_allowed_origins: vec![],
            log_format: LogFormat::Text,
            log_request_body: false,
        }
    }

    #[test]
    fn lists_skip_blank_entries() {
        assert_eq!(
            list(" a@example.com, ,b@example.com "),
            vec!["a@example.com".to_string(), "b@example.com".to_string()]
        );
        assert!(list("").is_empty());
    }

    #[test]
    fn log_format_defaults_to_text() {
        assert_eq!(parse_log_format("JSON"), LogFormat::Json);
        assert_eq!(parse_log_format(""), LogFormat::Text);
        assert_eq!(parse_log_format("pretty"), LogFormat::Text);
    }

    #[test]
    fn validate_accepts_sample() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_urls_and_short_secrets() {
        let mut config = sample();
        config.sheet_logger_url = Some("not a url".to_string());
        assert!(config.validate().is_err());

        let mut config = sample();
        config.ipn_callback_url = Some("ftp://example.com/ipn".to_string());
        assert!(config.validate().is_err());

        let mut config = sample();
        config.jwt_secret = "short".to_string();
        assert!(config.validate().is_err());
    }
}
