//! Lookup session configuration

use std::time::Duration;

/// Configuration for lookup sessions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupConfig {
    /// Lifetime of a session payload
    pub ttl: Duration,

    /// Lifetime of the token -> context index used to repair expired sessions
    pub recovery_ttl: Duration,

    /// Prefix of every store key
    pub key_prefix: String,
}

impl LookupConfig {
    /// Create a configuration with a custom payload TTL
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            ..Self::default()
        }
    }

    /// Create a configuration for testing
    pub fn testing() -> Self {
        Self {
            ttl: Duration::from_millis(100),
            recovery_ttl: Duration::from_secs(60),
            key_prefix: "lookup-test".to_string(),
        }
    }

    /// Store key of a session payload
    pub fn payload_key(&self, token: &str) -> String {
        format!("{}:{token}", self.key_prefix)
    }

    /// Store key of a session's context index
    pub fn context_key(&self, token: &str) -> String {
        format!("{}:{token}:context", self.key_prefix)
    }
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30 * 60),
            recovery_ttl: Duration::from_secs(24 * 60 * 60),
            key_prefix: "lookup".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LookupConfig::default();
        assert_eq!(config.ttl, Duration::from_secs(1800));
        assert_eq!(config.recovery_ttl, Duration::from_secs(86_400));
        assert_eq!(config.payload_key("abc"), "lookup:abc");
        assert_eq!(config.context_key("abc"), "lookup:abc:context");
    }

    #[test]
    fn test_testing_config_is_short_lived() {
        let config = LookupConfig::testing();
        assert!(config.ttl < LookupConfig::default().ttl);
        assert!(config.recovery_ttl > config.ttl);
    }

    #[test]
    fn test_new_keeps_defaults() {
        let config = LookupConfig::new(Duration::from_secs(5));
        assert_eq!(config.ttl, Duration::from_secs(5));
        assert_eq!(config.key_prefix, "lookup");
    }
}
