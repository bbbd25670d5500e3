//! Configuration for Linkup
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;

/// Secret used for token signing when dev mode runs without JWT_SECRET
const DEV_JWT_SECRET: &str = "dev-mode-secret-not-for-production-use-123456";

/// Linkup - professional network API
#[derive(Parser, Debug, Clone)]
#[command(name = "linkup")]
#[command(about = "Connections, requests and notifications API")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8000")]
    pub listen: SocketAddr,

    /// Prefix all API routes are mounted under
    #[arg(long, env = "API_PREFIX", default_value = "/api/v1")]
    pub api_prefix: String,

    /// Enable development mode (insecure cookies, dev JWT secret, memory store fallback)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "linkup")]
    pub mongodb_db: String,

    /// JWT secret for token signing (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// JWT token expiry in seconds (15 days)
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "1296000")]
    pub jwt_expiry_seconds: u64,

    /// Public URL of the web client, used for CORS and links in emails
    #[arg(long, env = "FRONTEND_URL", default_value = "http://localhost:5173")]
    pub frontend_url: String,

    /// Email configuration
    #[command(flatten)]
    pub email: EmailArgs,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines instead of human-readable text
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,
}

/// Transactional email provider configuration
#[derive(Parser, Debug, Clone)]
pub struct EmailArgs {
    /// Send endpoint of the email provider
    #[arg(long, env = "EMAIL_API_URL", default_value = "https://send.api.mailtrap.io/api/send")]
    pub email_api_url: String,

    /// Provider API token; emails are only logged when unset
    #[arg(long, env = "EMAIL_API_TOKEN")]
    pub email_api_token: Option<String>,

    /// Sender address
    #[arg(long, env = "EMAIL_FROM", default_value = "no-reply@linkup.local")]
    pub email_from: String,

    /// Sender display name
    #[arg(long, env = "EMAIL_FROM_NAME", default_value = "Linkup")]
    pub email_from_name: String,
}

impl Args {
    /// Get effective JWT secret (uses default in dev mode)
    pub fn jwt_secret(&self) -> Option<String> {
        match (&self.jwt_secret, self.dev_mode) {
            (Some(secret), _) => Some(secret.clone()),
            (None, true) => Some(DEV_JWT_SECRET.to_string()),
            (None, false) => None,
        }
    }

    /// Normalized API prefix: leading slash, no trailing slash, "" for root
    pub fn api_prefix(&self) -> &str {
        self.api_prefix.trim_end_matches('/')
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode {
            match &self.jwt_secret {
                None => return Err("JWT_SECRET is required in production mode".to_string()),
                Some(s) if s.len() < 32 => {
                    return Err("JWT_SECRET must be at least 32 characters".to_string())
                }
                Some(_) => {}
            }
        }

        if !self.api_prefix.is_empty() && !self.api_prefix.starts_with('/') {
            return Err("API_PREFIX must start with '/'".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["linkup"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    /// Production settings regardless of DEV_MODE or JWT_SECRET in the environment
    fn production(jwt_secret: Option<&str>) -> Args {
        let mut args = parse(&[]);
        args.dev_mode = false;
        args.jwt_secret = jwt_secret.map(str::to_string);
        args
    }

    #[test]
    fn test_production_requires_secret() {
        let args = production(None);
        assert_eq!(
            args.validate().unwrap_err(),
            "JWT_SECRET is required in production mode"
        );
        assert!(args.jwt_secret().is_none());

        let args = production(Some("short"));
        assert_eq!(
            args.validate().unwrap_err(),
            "JWT_SECRET must be at least 32 characters"
        );

        let args = production(Some("this-secret-is-at-least-32-chars-long"));
        assert!(args.validate().is_ok());

        let args = parse(&["--jwt-secret", "this-secret-is-at-least-32-chars-long"]);
        assert_eq!(
            args.jwt_secret.as_deref(),
            Some("this-secret-is-at-least-32-chars-long")
        );
    }

    #[test]
    fn test_dev_mode_secret_fallback() {
        let args = parse(&["--dev-mode"]);
        assert!(args.validate().is_ok());
        assert!(args.jwt_secret().is_some());
    }

    #[test]
    fn test_api_prefix_normalized() {
        let args = parse(&["--api-prefix", "/api/v1/"]);
        assert_eq!(args.api_prefix(), "/api/v1");

        let args = parse(&["--api-prefix", "api"]);
        assert!(args.validate().is_err());
    }
}
