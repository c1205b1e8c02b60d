use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

/// Default reconciliation sweep interval (1 hour).
const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 3600;

/// Default grace period before an unreferenced storage object is considered
/// orphaned. Must be longer than a single generation request can take, so an
/// object whose metadata insert is still in flight is never reclaimed.
const DEFAULT_ORPHAN_GRACE_SECS: u64 = 600;

#[derive(Debug, Clone, Deserialize)]
pub struct ImageServiceConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub mongodb: MongoConfig,
    pub metadata: MetadataConfig,
    pub storage: StorageConfig,
    pub provider: ProviderConfig,
    pub http: HttpConfig,
    pub reconcile: ReconcileConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetadataConfig {
    pub backend: MetadataBackend,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum MetadataBackend {
    Mongo,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub local_path: String,
    pub s3_bucket: Option<String>,
    pub s3_endpoint: Option<String>,
    pub s3_region: Option<String>,
    pub s3_access_key_id: Option<String>,
    pub s3_secret_access_key: Option<String>,
    /// Externally resolvable domain the stored artifacts are served from,
    /// e.g. `https://images.example.com`.
    pub public_domain: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Local,
    S3,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub backend: ProviderBackend,
    pub openai_api_key: Option<String>,
    pub openai_api_base: String,
    pub image_size: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderBackend {
    OpenAi,
    Mock,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Comma-separated list of allowed CORS origins. Empty means permissive.
    pub cors_allowed_origins: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconcileConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub retention: RetentionMode,
    pub max_age_days: i64,
    pub concurrency: usize,
    pub orphan_grace_secs: u64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum RetentionMode {
    /// Sweep records older than `max_age_days`.
    Age,
    /// Sweep every record on every run.
    All,
}

impl ImageServiceConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        Ok(ImageServiceConfig {
            common: common_config,
            mongodb: MongoConfig {
                uri: get_env("MONGODB_URI", Some("mongodb://localhost:27017"), is_prod)?,
                database: get_env("MONGODB_DATABASE", Some("image_db"), is_prod)?,
            },
            metadata: MetadataConfig {
                backend: get_env("METADATA_BACKEND", Some("mongo"), is_prod)?
                    .parse()
                    .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
            },
            storage: StorageConfig {
                backend: get_env("STORAGE_BACKEND", Some("local"), is_prod)?
                    .parse()
                    .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
                local_path: get_env("STORAGE_LOCAL_PATH", Some("storage"), is_prod)?,
                s3_bucket: env::var("S3_BUCKET").ok(),
                s3_endpoint: env::var("S3_ENDPOINT").ok(),
                s3_region: env::var("S3_REGION").ok(),
                s3_access_key_id: env::var("S3_ACCESS_KEY_ID").ok(),
                s3_secret_access_key: env::var("S3_SECRET_ACCESS_KEY").ok(),
                public_domain: get_env(
                    "STORAGE_PUBLIC_DOMAIN",
                    Some("http://localhost:8080/images"),
                    is_prod,
                )?,
            },
            provider: ProviderConfig {
                backend: get_env("PROVIDER_BACKEND", Some("openai"), is_prod)?
                    .parse()
                    .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
                openai_api_key: env::var("OPENAI_API_KEY").ok(),
                openai_api_base: get_env(
                    "OPENAI_API_BASE",
                    Some("https://api.openai.com/v1"),
                    is_prod,
                )?,
                image_size: get_env("OPENAI_IMAGE_SIZE", Some("1024x1024"), is_prod)?,
            },
            http: HttpConfig {
                cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS").ok(),
            },
            reconcile: ReconcileConfig {
                enabled: get_env("RECONCILE_ENABLED", Some("true"), is_prod)?
                    .parse()
                    .unwrap_or(true),
                interval_secs: get_env(
                    "RECONCILE_INTERVAL_SECS",
                    Some(&DEFAULT_RECONCILE_INTERVAL_SECS.to_string()),
                    is_prod,
                )?
                .parse()
                .unwrap_or(DEFAULT_RECONCILE_INTERVAL_SECS),
                retention: get_env("RECONCILE_RETENTION", Some("age"), is_prod)?
                    .parse()
                    .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
                max_age_days: get_env("RECONCILE_MAX_AGE_DAYS", Some("30"), is_prod)?
                    .parse()
                    .unwrap_or(30),
                concurrency: get_env("RECONCILE_CONCURRENCY", Some("8"), is_prod)?
                    .parse()
                    .unwrap_or(8),
                orphan_grace_secs: get_env(
                    "RECONCILE_ORPHAN_GRACE_SECS",
                    Some(&DEFAULT_ORPHAN_GRACE_SECS.to_string()),
                    is_prod,
                )?
                .parse()
                .unwrap_or(DEFAULT_ORPHAN_GRACE_SECS),
            },
        })
    }
}

impl std::str::FromStr for MetadataBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mongo" => Ok(MetadataBackend::Mongo),
            "memory" => Ok(MetadataBackend::Memory),
            _ => Err(format!("Invalid metadata backend: {}", s)),
        }
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(StorageBackend::Local),
            "s3" => Ok(StorageBackend::S3),
            _ => Err(format!("Invalid storage backend: {}", s)),
        }
    }
}

impl std::str::FromStr for ProviderBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(ProviderBackend::OpenAi),
            "mock" => Ok(ProviderBackend::Mock),
            _ => Err(format!("Invalid provider backend: {}", s)),
        }
    }
}

impl std::str::FromStr for RetentionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "age" => Ok(RetentionMode::Age),
            "all" => Ok(RetentionMode::All),
            _ => Err(format!("Invalid retention mode: {}", s)),
        }
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}
