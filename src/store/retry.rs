//! Bounded exponential backoff for busy or locked storage.
//!
//! Only errors classified by [`GeoAddressError::is_busy`] are retried.
//! Everything else returns immediately.

use std::thread;

use log::warn;

use crate::config::RetryConfig;
use crate::error::{GeoAddressError, Result};

/// Run `op`, retrying busy failures up to `config.max_retries` times.
pub fn retry_busy<T, F>(config: &RetryConfig, what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let mut attempt = 0;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if e.is_busy() && attempt < config.max_retries => {
                let delay = config.delay_for_attempt(attempt);
                warn!(
                    "{what}: store busy, retry {}/{} in {delay:?}",
                    attempt + 1,
                    config.max_retries
                );
                thread::sleep(delay);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Convenience for store calls that return `rusqlite::Result`.
pub fn retry_sql<T, F>(config: &RetryConfig, what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> rusqlite::Result<T>,
{
    retry_busy(config, what, || op().map_err(GeoAddressError::from))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn busy() -> GeoAddressError {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".to_string()),
        )
        .into()
    }

    fn fast() -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    #[test]
    fn test_succeeds_after_busy() {
        let mut calls = 0;
        let value = retry_busy(&fast(), "test", || {
            calls += 1;
            if calls < 3 { Err(busy()) } else { Ok(42) }
        })
        .unwrap();
        assert_eq!(value, 42);
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_gives_up_after_max_retries() {
        let mut calls = 0;
        let result: Result<()> = retry_busy(&fast(), "test", || {
            calls += 1;
            Err(busy())
        });
        assert!(result.unwrap_err().is_busy());
        assert_eq!(calls, 4);
    }

    #[test]
    fn test_other_errors_not_retried() {
        let mut calls = 0;
        let result: Result<()> = retry_busy(&fast(), "test", || {
            calls += 1;
            Err(GeoAddressError::config("nope"))
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_disabled_retry() {
        let mut calls = 0;
        let result: Result<()> = retry_busy(&RetryConfig::disabled(), "test", || {
            calls += 1;
            Err(busy())
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
