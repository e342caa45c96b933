//! Configuration module
//!
//! Worker configuration is read from the environment (after loading a `.env`
//! file if present). Every numeric setting has a default that is also used
//! when the variable does not parse.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::constants::{AVIF_QUALITY_RANGE, AVIF_SPEED_RANGE};
use crate::storage_types::StorageBackend;

const DB_MAX_CONNECTIONS: u32 = 10;
const HLS_SEGMENT_DURATION: u32 = 6;
const AVIF_QUALITY: u8 = 80;
const AVIF_SPEED: u8 = 8;
const WORKER_MAX_JOBS: usize = 2;
const WORKER_MAX_RETRIES: u32 = 3;
const MIN_DISK_FREE_GB: u64 = 1;

/// What to do when a video job would push the disk below the free-space floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskCheckBehavior {
    Fail,
    Warn,
}

impl FromStr for DiskCheckBehavior {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fail" => Ok(DiskCheckBehavior::Fail),
            "warn" => Ok(DiskCheckBehavior::Warn),
            _ => Err(anyhow::anyhow!("Invalid disk check behavior: {}", s)),
        }
    }
}

impl fmt::Display for DiskCheckBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiskCheckBehavior::Fail => f.write_str("fail"),
            DiskCheckBehavior::Warn => f.write_str("warn"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(anyhow::anyhow!("Invalid log format: {}", s)),
        }
    }
}

/// Media pipeline configuration
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub environment: String,
    // Storage configuration
    pub storage_backend: StorageBackend,
    pub local_storage_path: Option<String>,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO etc.)
    pub aws_region: Option<String>,
    // Persistence
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    // Media toolchain
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub video_work_dir: PathBuf,
    pub hls_segment_duration: u32,
    pub avif_quality: u8,
    pub avif_speed: u8,
    // Worker
    pub worker_max_jobs: usize,
    pub worker_max_retries: u32,
    // Capacity
    pub min_disk_free_gb: u64,
    pub disk_check_behavior: DiskCheckBehavior,
    pub log_format: LogFormat,
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("ENVIRONMENT")
            .or_else(|| lookup("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let storage_backend = match non_empty(lookup("STORAGE_BACKEND")) {
            Some(raw) => raw.parse::<StorageBackend>()?,
            None => StorageBackend::Local,
        };

        let disk_check_behavior = match non_empty(lookup("DISK_CHECK_BEHAVIOR")) {
            Some(raw) => raw.parse::<DiskCheckBehavior>()?,
            None => DiskCheckBehavior::Warn,
        };

        let log_format = match non_empty(lookup("LOG_FORMAT")) {
            Some(raw) => raw.parse::<LogFormat>()?,
            None => LogFormat::Pretty,
        };

        let video_work_dir = non_empty(lookup("VIDEO_WORK_DIR"))
            .map(PathBuf::from)
            .unwrap_or_else(|| env::temp_dir().join("salingtau").join("videos"));

        Ok(Self {
            environment,
            storage_backend,
            local_storage_path: non_empty(lookup("LOCAL_STORAGE_PATH")),
            s3_bucket: non_empty(lookup("S3_BUCKET")),
            s3_region: non_empty(lookup("S3_REGION")),
            s3_endpoint: non_empty(lookup("S3_ENDPOINT")),
            aws_region: non_empty(lookup("AWS_REGION")),
            database_url: non_empty(lookup("DATABASE_URL")),
            db_max_connections: parse_or(lookup("DB_MAX_CONNECTIONS"), DB_MAX_CONNECTIONS),
            ffmpeg_path: non_empty(lookup("FFMPEG_PATH")).unwrap_or_else(|| "ffmpeg".to_string()),
            ffprobe_path: non_empty(lookup("FFPROBE_PATH"))
                .unwrap_or_else(|| "ffprobe".to_string()),
            video_work_dir,
            hls_segment_duration: parse_or(lookup("HLS_SEGMENT_DURATION"), HLS_SEGMENT_DURATION),
            avif_quality: parse_or(lookup("AVIF_QUALITY"), AVIF_QUALITY),
            avif_speed: parse_or(lookup("AVIF_SPEED"), AVIF_SPEED),
            worker_max_jobs: parse_or(lookup("WORKER_MAX_JOBS"), WORKER_MAX_JOBS),
            worker_max_retries: parse_or(lookup("WORKER_MAX_RETRIES"), WORKER_MAX_RETRIES),
            min_disk_free_gb: parse_or(lookup("MIN_DISK_FREE_GB"), MIN_DISK_FREE_GB),
            disk_check_behavior,
            log_format,
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.s3_region.is_none() && self.aws_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
            }
            StorageBackend::Memory => {}
        }

        if let Some(url) = &self.database_url {
            if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                return Err(anyhow::anyhow!(
                    "DATABASE_URL must be a valid PostgreSQL connection string"
                ));
            }
        }

        if self.hls_segment_duration == 0 {
            return Err(anyhow::anyhow!("HLS_SEGMENT_DURATION must be greater than 0"));
        }

        if !AVIF_QUALITY_RANGE.contains(&self.avif_quality) {
            return Err(anyhow::anyhow!(
                "AVIF_QUALITY must be between {} and {}",
                AVIF_QUALITY_RANGE.start(),
                AVIF_QUALITY_RANGE.end()
            ));
        }

        if !AVIF_SPEED_RANGE.contains(&self.avif_speed) {
            return Err(anyhow::anyhow!(
                "AVIF_SPEED must be between {} and {}",
                AVIF_SPEED_RANGE.start(),
                AVIF_SPEED_RANGE.end()
            ));
        }

        if self.worker_max_jobs == 0 {
            return Err(anyhow::anyhow!("WORKER_MAX_JOBS must be greater than 0"));
        }

        Ok(())
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<PipelineConfig>);

impl Config {
    fn inner(&self) -> &PipelineConfig {
        &self.0
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        Ok(Config(Box::new(PipelineConfig::from_env()?)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    pub fn is_production(&self) -> bool {
        matches!(
            self.inner().environment.to_lowercase().as_str(),
            "production" | "prod"
        )
    }

    pub fn environment(&self) -> &str {
        &self.inner().environment
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.inner().storage_backend
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.inner().local_storage_path.as_deref()
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.inner().s3_bucket.as_deref()
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.inner().s3_region.as_deref()
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.inner().s3_endpoint.as_deref()
    }

    pub fn aws_region(&self) -> Option<&str> {
        self.inner().aws_region.as_deref()
    }

    pub fn database_url(&self) -> Option<&str> {
        self.inner().database_url.as_deref()
    }

    pub fn db_max_connections(&self) -> u32 {
        self.inner().db_max_connections
    }

    pub fn ffmpeg_path(&self) -> &str {
        &self.inner().ffmpeg_path
    }

    pub fn ffprobe_path(&self) -> &str {
        &self.inner().ffprobe_path
    }

    pub fn video_work_dir(&self) -> &std::path::Path {
        &self.inner().video_work_dir
    }

    pub fn hls_segment_duration(&self) -> u32 {
        self.inner().hls_segment_duration
    }

    pub fn avif_quality(&self) -> u8 {
        self.inner().avif_quality
    }

    pub fn avif_speed(&self) -> u8 {
        self.inner().avif_speed
    }

    pub fn worker_max_jobs(&self) -> usize {
        self.inner().worker_max_jobs
    }

    pub fn worker_max_retries(&self) -> u32 {
        self.inner().worker_max_retries
    }

    pub fn min_disk_free_gb(&self) -> u64 {
        self.inner().min_disk_free_gb
    }

    pub fn disk_check_behavior(&self) -> DiskCheckBehavior {
        self.inner().disk_check_behavior
    }

    pub fn log_format(&self) -> LogFormat {
        self.inner().log_format
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<PipelineConfig, anyhow::Error> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        PipelineConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.environment, "development");
        assert_eq!(config.storage_backend, StorageBackend::Local);
        assert_eq!(config.hls_segment_duration, 6);
        assert_eq!(config.avif_quality, 80);
        assert_eq!(config.worker_max_jobs, 2);
        assert_eq!(config.worker_max_retries, 3);
        assert_eq!(config.ffmpeg_path, "ffmpeg");
        assert_eq!(config.ffprobe_path, "ffprobe");
        assert_eq!(config.disk_check_behavior, DiskCheckBehavior::Warn);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.video_work_dir.ends_with("salingtau/videos"));
    }

    #[test]
    fn unparsable_numbers_fall_back_to_defaults() {
        let config = config_from(&[("HLS_SEGMENT_DURATION", "six"), ("WORKER_MAX_JOBS", "8")])
            .unwrap();
        assert_eq!(config.hls_segment_duration, 6);
        assert_eq!(config.worker_max_jobs, 8);
    }

    #[test]
    fn invalid_backend_is_an_error() {
        assert!(config_from(&[("STORAGE_BACKEND", "nfs")]).is_err());
    }

    #[test]
    fn local_backend_requires_path() {
        let config = config_from(&[("STORAGE_BACKEND", "local")]).unwrap();
        assert!(config.validate().is_err());

        let config = config_from(&[
            ("STORAGE_BACKEND", "local"),
            ("LOCAL_STORAGE_PATH", "/var/lib/salingtau"),
        ])
        .unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn s3_backend_requires_bucket_and_region() {
        let config = config_from(&[("STORAGE_BACKEND", "s3"), ("S3_BUCKET", "media")]).unwrap();
        assert!(config.validate().is_err());

        let config = config_from(&[
            ("STORAGE_BACKEND", "s3"),
            ("S3_BUCKET", "media"),
            ("AWS_REGION", "ap-southeast-1"),
        ])
        .unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn database_url_must_be_postgres() {
        let config = config_from(&[
            ("STORAGE_BACKEND", "memory"),
            ("DATABASE_URL", "mysql://localhost/db"),
        ])
        .unwrap();
        assert!(config.validate().is_err());

        let config = config_from(&[
            ("STORAGE_BACKEND", "memory"),
            ("DATABASE_URL", "postgres://localhost/db"),
        ])
        .unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn avif_settings_must_be_in_encoder_range() {
        for (key, value) in [
            ("AVIF_QUALITY", "0"),
            ("AVIF_QUALITY", "150"),
            ("AVIF_SPEED", "0"),
            ("AVIF_SPEED", "11"),
        ] {
            let config = config_from(&[("STORAGE_BACKEND", "memory"), (key, value)]).unwrap();
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains(key), "{}={}: {}", key, value, err);
        }

        let config = config_from(&[
            ("STORAGE_BACKEND", "memory"),
            ("AVIF_QUALITY", "100"),
            ("AVIF_SPEED", "1"),
        ])
        .unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn production_detection() {
        let config = Config(Box::new(config_from(&[("ENVIRONMENT", "Prod")]).unwrap()));
        assert!(config.is_production());
    }
}
