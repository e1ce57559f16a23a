use std::time::Duration;

use relay_core::config::CacheConfig;

/// Bounds applied by [`ConversationCache`](crate::ConversationCache).
///
/// Both bounds are opt-out: with `max_users == 0` and `idle_ttl == None`
/// every history is kept until the user resets it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLimits {
    /// Maximum number of cached users; `0` means unbounded.
    pub max_users: usize,
    /// Histories untouched for longer than this are discarded.
    pub idle_ttl: Option<Duration>,
}

impl CacheLimits {
    pub fn unbounded() -> Self {
        Self {
            max_users: 0,
            idle_ttl: None,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            max_users: config.max_users,
            idle_ttl: (config.idle_ttl_secs > 0).then(|| Duration::from_secs(config.idle_ttl_secs)),
        }
    }
}

impl Default for CacheLimits {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_ttl_disables_expiry() {
        let limits = CacheLimits::from_config(&CacheConfig {
            max_users: 5,
            idle_ttl_secs: 0,
        });
        assert_eq!(limits.max_users, 5);
        assert_eq!(limits.idle_ttl, None);
    }

    #[test]
    fn default_is_bounded() {
        let limits = CacheLimits::default();
        assert!(limits.max_users > 0);
        assert_eq!(limits.idle_ttl, Some(Duration::from_secs(86_400)));
    }
}
