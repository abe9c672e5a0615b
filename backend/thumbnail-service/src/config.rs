/// Configuration for the thumbnail service binaries
///
/// Loaded from environment variables with defaults. Every struct can also be
/// built from an arbitrary lookup function so tests never touch the process
/// environment. Values that are present but unusable are rejected with a
/// `ConfigError` rather than silently replaced by the default.
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::services::notifier::RelevancePolicy;
use crate::services::thumbnail::{DerivativeNaming, OutputFormat, ThumbnailConfig};

const DEFAULT_EXTENSIONS: &str = "jpg,jpeg,png,gif,bmp,webp";
const DEFAULT_SUBJECT: &str = "New S3 Upload";

/// Settings shared by the notifier and the worker
///
/// Both processes must agree on the derivative naming, otherwise the notifier
/// would queue the worker's own output.
#[derive(Clone, Debug)]
pub struct PipelineSettings {
    pub extensions: Vec<String>,
    pub thumbnail: ThumbnailConfig,
    pub naming: DerivativeNaming,
}

impl PipelineSettings {
    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let extensions: Vec<String> = lookup("THUMB_EXTENSIONS")
            .unwrap_or_else(|| DEFAULT_EXTENSIONS.to_string())
            .split(',')
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();

        if extensions.is_empty() {
            return Err(ConfigError::Invalid {
                var: "THUMB_EXTENSIONS",
                value: lookup("THUMB_EXTENSIONS").unwrap_or_default(),
                reason: "at least one extension is required".to_string(),
            });
        }

        let format = match lookup("THUMB_FORMAT") {
            Some(raw) => OutputFormat::from_str(&raw).map_err(|reason| ConfigError::Invalid {
                var: "THUMB_FORMAT",
                value: raw,
                reason,
            })?,
            None => OutputFormat::Source,
        };

        let thumbnail = ThumbnailConfig {
            max_width: parse_in_range(lookup, "THUMB_MAX_WIDTH", 300, 1..=u32::MAX)?,
            max_height: parse_in_range(lookup, "THUMB_MAX_HEIGHT", 300, 1..=u32::MAX)?,
            format,
            quality: parse_in_range(lookup, "THUMB_QUALITY", 80u8, 1..=100)?,
        };

        let naming = DerivativeNaming::new(
            &lookup("THUMB_DERIVATIVE_PREFIX").unwrap_or_else(|| "derivatives/".to_string()),
            &lookup("THUMB_DERIVATIVE_SUFFIX").unwrap_or_else(|| "_thumb".to_string()),
        )?;

        Ok(Self {
            extensions,
            thumbnail,
            naming,
        })
    }

    pub fn relevance_policy(&self) -> RelevancePolicy {
        RelevancePolicy::new(self.naming.clone(), &self.extensions)
    }
}

/// Configuration for the `thumb-worker` binary
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    pub queue_url: String,
    pub pipeline: PipelineSettings,
    pub wait: Duration,
    pub max_messages: u32,
    pub visibility_timeout: Option<Duration>,
    pub concurrency: usize,
    pub storage_timeout: Duration,
    pub poll_failure_limit: u32,
    pub supervisor_max_restarts: u32,
    pub supervisor_window: Duration,
    /// Bind address of the metrics and liveness listener
    pub metrics_host: String,
    pub metrics_port: u16,
}

impl WorkerConfig {
    /// Load configuration from environment variables (and `.env` if present)
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let queue_url = required(&lookup, "SQS_QUEUE_URL")?;

        let visibility_timeout = match lookup("QUEUE_VISIBILITY_TIMEOUT_SECS") {
            Some(_) => Some(Duration::from_secs(parse_in_range(
                &lookup,
                "QUEUE_VISIBILITY_TIMEOUT_SECS",
                30u64,
                0..=43_200,
            )?)),
            None => None,
        };

        Ok(Self {
            queue_url,
            pipeline: PipelineSettings::from_lookup(&lookup)?,
            wait: Duration::from_secs(parse_in_range(&lookup, "QUEUE_WAIT_SECS", 20u64, 0..=20)?),
            max_messages: parse_in_range(&lookup, "QUEUE_MAX_MESSAGES", 1u32, 1..=10)?,
            visibility_timeout,
            concurrency: parse_in_range(&lookup, "WORKER_CONCURRENCY", 4usize, 1..=usize::MAX)?,
            storage_timeout: Duration::from_secs(parse_in_range(
                &lookup,
                "STORAGE_TIMEOUT_SECS",
                30u64,
                1..=u64::MAX,
            )?),
            poll_failure_limit: parse_in_range(&lookup, "POLL_FAILURE_LIMIT", 5u32, 1..=u32::MAX)?,
            supervisor_max_restarts: parse_in_range(
                &lookup,
                "SUPERVISOR_MAX_RESTARTS",
                5u32,
                0..=u32::MAX,
            )?,
            supervisor_window: Duration::from_secs(parse_in_range(
                &lookup,
                "SUPERVISOR_WINDOW_SECS",
                300u64,
                1..=u64::MAX,
            )?),
            metrics_host: lookup("WORKER_METRICS_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            metrics_port: parse_in_range(&lookup, "WORKER_METRICS_PORT", 9090u16, 1..=u16::MAX)?,
        })
    }

    pub fn metrics_address(&self) -> String {
        format!("{}:{}", self.metrics_host, self.metrics_port)
    }
}

/// Configuration for the `upload-notifier` binary
#[derive(Clone, Debug)]
pub struct NotifierConfig {
    pub host: String,
    pub port: u16,
    pub topic_arn: String,
    pub subject: String,
    pub pipeline: PipelineSettings,
}

impl NotifierConfig {
    /// Load configuration from environment variables (and `.env` if present)
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            host: lookup("NOTIFIER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_in_range(&lookup, "NOTIFIER_PORT", 8080u16, 1..=u16::MAX)?,
            topic_arn: required(&lookup, "SNS_TOPIC_ARN")?,
            subject: lookup("SNS_SUBJECT").unwrap_or_else(|| DEFAULT_SUBJECT.to_string()),
            pipeline: PipelineSettings::from_lookup(&lookup)?,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn required(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<String, ConfigError> {
    match lookup(var) {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(ConfigError::Missing(var)),
    }
}

fn parse_in_range<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
    range: std::ops::RangeInclusive<T>,
) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(var) else {
        return Ok(default);
    };

    let value: T = raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        value: raw.clone(),
        reason: e.to_string(),
    })?;

    if !range.contains(&value) {
        return Err(ConfigError::Invalid {
            var,
            value: raw,
            reason: format!("must be between {} and {}", range.start(), range.end()),
        });
    }

    Ok(value)
}
