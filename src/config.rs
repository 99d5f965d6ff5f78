use std::env;

use anyhow::{anyhow, bail, Context};
use chrono_tz::Tz;

pub const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Clone, Debug)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    /// Custom endpoint (MinIO, localstack); unset for AWS.
    pub endpoint: Option<String>,
    pub public_url: Option<String>,
}

impl S3Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            bucket: env::var("AWS_BUCKET_NAME").context("AWS_BUCKET_NAME must be set")?,
            region: env::var("AWS_REGION").unwrap_or_else(|_| "ap-northeast-2".into()),
            access_key: optional("AWS_ACCESS_KEY_ID"),
            secret_key: optional("AWS_SECRET_ACCESS_KEY"),
            endpoint: optional("S3_ENDPOINT"),
            public_url: optional("S3_PUBLIC_URL"),
        })
    }

    /// Prefix of every object URL handed out to clients.
    pub fn public_base_url(&self) -> String {
        if let Some(url) = &self.public_url {
            return url.trim_end_matches('/').to_string();
        }
        match &self.endpoint {
            Some(ep) => format!("{}/{}", ep.trim_end_matches('/'), self.bucket),
            None => format!("https://{}.s3.{}.amazonaws.com", self.bucket, self.region),
        }
    }
}

/// Process configuration, read once from the environment at startup.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: String,
    /// Unset selects the in-memory store when that feature is compiled in.
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub stats_timezone: Tz,
    pub frontend_url: Option<String>,
    /// Snapshot directory for the in-memory store.
    pub data_dir: Option<String>,
    pub s3: S3Config,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        validate_jwt_secret(env::var("JWT_SECRET").ok().as_deref())?;

        let stats_timezone = env::var("STATS_TIMEZONE")
            .unwrap_or_else(|_| "Asia/Seoul".into())
            .parse::<Tz>()
            .map_err(|e| anyhow!("STATS_TIMEZONE: {e}"))?;

        Ok(Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            database_url: optional("DATABASE_URL"),
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            stats_timezone,
            frontend_url: optional("FRONTEND_URL"),
            data_dir: optional("BOARDHUB_DATA_DIR"),
            s3: S3Config::from_env()?,
        })
    }
}

pub fn validate_jwt_secret(secret: Option<&str>) -> anyhow::Result<()> {
    match secret {
        None => bail!("JWT_SECRET must be set"),
        Some(s) if s.len() < MIN_JWT_SECRET_LEN => {
            bail!("JWT_SECRET must be at least {MIN_JWT_SECRET_LEN} characters long")
        }
        Some(_) => Ok(()),
    }
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}
