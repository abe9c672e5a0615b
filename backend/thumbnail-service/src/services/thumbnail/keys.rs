//! Derivative key naming
//!
//! `derivative_key` relocates a source key under the reserved prefix and puts
//! the derivative marker in front of the extension:
//! `photos/cat.jpg` -> `derivatives/photos/cat_thumb.jpg`.
//!
//! The source extension is kept verbatim, so the mapping is injective: strip
//! the prefix, split off the last extension, strip the marker, and the source
//! key comes back. Every derivative key starts with the reserved prefix and
//! contains the marker, so it never passes the relevance check.

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivativeNaming {
    prefix: String,
    marker: String,
}

impl DerivativeNaming {
    pub fn new(prefix: &str, marker: &str) -> Result<Self, ConfigError> {
        let prefix = prefix.trim();
        if prefix.is_empty() || prefix == "/" {
            return Err(ConfigError::Invalid {
                var: "THUMB_DERIVATIVE_PREFIX",
                value: prefix.to_string(),
                reason: "must name a non-empty key prefix".to_string(),
            });
        }

        if marker.is_empty() || marker.contains('.') || marker.contains('/') {
            return Err(ConfigError::Invalid {
                var: "THUMB_DERIVATIVE_SUFFIX",
                value: marker.to_string(),
                reason: "must be non-empty and contain neither '.' nor '/'".to_string(),
            });
        }

        let prefix = if prefix.ends_with('/') {
            prefix.to_string()
        } else {
            format!("{prefix}/")
        };

        Ok(Self {
            prefix,
            marker: marker.to_string(),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Literal, case-sensitive match on the reserved prefix or the marker
    pub fn is_derivative(&self, key: &str) -> bool {
        key.starts_with(&self.prefix) || key.contains(&self.marker)
    }

    pub fn derivative_key(&self, source_key: &str) -> String {
        match split_extension(source_key) {
            Some((stem, ext)) => format!("{}{}{}.{}", self.prefix, stem, self.marker, ext),
            None => format!("{}{}{}", self.prefix, source_key, self.marker),
        }
    }
}

impl Default for DerivativeNaming {
    fn default() -> Self {
        Self {
            prefix: "derivatives/".to_string(),
            marker: "_thumb".to_string(),
        }
    }
}

/// Split `key` at the last `.` of its final path segment
pub fn split_extension(key: &str) -> Option<(&str, &str)> {
    let segment_start = key.rfind('/').map(|i| i + 1).unwrap_or(0);
    let dot = key[segment_start..].rfind('.')? + segment_start;
    Some((&key[..dot], &key[dot + 1..]))
}
