use anyhow::{Context, Result};
use chrono::Duration;

/// Process configuration, read from the environment once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub public_url: String,
    pub google_client_id: String,
    pub google_client_secret: String,
    pub allowed_email_domain: String,
    pub cloudinary: CloudinaryConfig,
    pub secure_cookies: bool,
    pub session_ttl: Duration,
    pub max_db_connections: u32,
}

#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub folder: String,
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("{} must be set", key))
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let port = optional("PORT", "3000")
            .parse::<u16>()
            .context("Invalid PORT")?;
        let session_ttl_days = optional("SESSION_TTL_DAYS", "7")
            .parse::<i64>()
            .context("Invalid SESSION_TTL_DAYS")?;
        let max_db_connections = optional("DATABASE_MAX_CONNECTIONS", "5")
            .parse::<u32>()
            .context("Invalid DATABASE_MAX_CONNECTIONS")?;
        let secure_cookies = optional("SECURE_COOKIES", "false")
            .parse::<bool>()
            .unwrap_or(false);

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            host: optional("HOST", "0.0.0.0"),
            port,
            public_url: optional("PUBLIC_URL", "http://localhost:3000")
                .trim_end_matches('/')
                .to_string(),
            google_client_id: required("GOOGLE_CLIENT_ID")?,
            google_client_secret: required("GOOGLE_CLIENT_SECRET")?,
            allowed_email_domain: optional("ALLOWED_EMAIL_DOMAIN", "kiit.ac.in")
                .trim_start_matches('@')
                .to_lowercase(),
            cloudinary: CloudinaryConfig {
                cloud_name: required("CLOUDINARY_NAME")?,
                api_key: required("CLOUDINARY_KEY")?,
                api_secret: required("CLOUDINARY_SECRET")?,
                folder: optional("CLOUDINARY_FOLDER", "K-1000"),
            },
            secure_cookies,
            session_ttl: Duration::days(session_ttl_days),
            max_db_connections,
        })
    }

    pub fn oauth_redirect_url(&self) -> String {
        format!("{}/auth/google/callback", self.public_url)
    }
}
