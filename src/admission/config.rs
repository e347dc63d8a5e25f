//! Configuration for the admission controller.

use std::time::Duration;

/// Quota configuration for the admission controller
#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    /// Maximum tokens a sender may consume per UTC calendar day
    pub daily_quota: u64,

    /// Hard ceiling on a single request's estimated tokens, checked before
    /// any quota or cache interaction
    pub per_request_ceiling: u64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            daily_quota: 100_000,
            per_request_ceiling: 500,
        }
    }
}

impl AdmissionConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("TOLLGATE_DAILY_QUOTA") {
            if let Ok(n) = val.parse() {
                config.daily_quota = n;
            }
        }

        if let Ok(val) = std::env::var("TOLLGATE_REQUEST_CEILING") {
            if let Ok(n) = val.parse() {
                config.per_request_ceiling = n;
            }
        }

        config
    }
}

/// Batch pacing settings, replaced atomically via the settings-update
/// operation and read by every admission decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSettings {
    /// Upper bound on items dispatched per chunk
    pub max_batch_size: usize,

    /// Preferred number of work items per dispatch chunk
    pub optimal_chunk_size: usize,

    /// Delay inserted between chunks when pacing applies
    pub delay: Duration,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            max_batch_size: 10,
            optimal_chunk_size: 3,
            delay: Duration::from_millis(1000),
        }
    }
}

impl BatchSettings {
    /// Effective chunk size: the optimal size clamped to the batch cap,
    /// never zero
    pub fn chunk_size(&self) -> usize {
        self.optimal_chunk_size.clamp(1, self.max_batch_size.max(1))
    }

    /// Create settings from environment variables
    pub fn from_env() -> Self {
        let mut settings = Self::default();

        if let Ok(val) = std::env::var("TOLLGATE_MAX_BATCH_SIZE") {
            if let Ok(n) = val.parse() {
                settings.max_batch_size = n;
            }
        }

        if let Ok(val) = std::env::var("TOLLGATE_OPTIMAL_CHUNK_SIZE") {
            if let Ok(n) = val.parse() {
                settings.optimal_chunk_size = n;
            }
        }

        if let Ok(val) = std::env::var("TOLLGATE_BATCH_DELAY_MS") {
            if let Ok(n) = val.parse() {
                settings.delay = Duration::from_millis(n);
            }
        }

        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AdmissionConfig::default();
        assert_eq!(config.daily_quota, 100_000);
        assert_eq!(config.per_request_ceiling, 500);
    }

    #[test]
    fn test_default_settings() {
        let settings = BatchSettings::default();
        assert_eq!(settings.optimal_chunk_size, 3);
        assert_eq!(settings.chunk_size(), 3);
    }

    #[test]
    fn test_chunk_size_clamped() {
        let settings = BatchSettings {
            max_batch_size: 2,
            optimal_chunk_size: 5,
            delay: Duration::ZERO,
        };
        assert_eq!(settings.chunk_size(), 2);

        let degenerate = BatchSettings {
            max_batch_size: 0,
            optimal_chunk_size: 0,
            delay: Duration::ZERO,
        };
        assert_eq!(degenerate.chunk_size(), 1);
    }
}
