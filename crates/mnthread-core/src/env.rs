//! Environment variable utilities
//!
//! Generic `env_get<T>` for parsing environment overrides with defaults.

use std::str::FromStr;

/// Get environment variable parsed as type T, or return default
///
/// Works with any type that implements `FromStr`; unset or unparsable
/// values fall back to the default.
///
/// # Examples
///
/// ```ignore
/// let kernels: usize = env_get("MNT_KERNELS", 4);
/// let stack: usize = env_get("MNT_STACK_SIZE", 256 * 1024);
/// ```
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_get_default() {
        let v: usize = env_get("MNT_TEST_UNSET_VARIABLE", 7);
        assert_eq!(v, 7);
    }

    #[test]
    fn test_env_get_parses() {
        std::env::set_var("MNT_TEST_SET_VARIABLE", "42");
        let v: usize = env_get("MNT_TEST_SET_VARIABLE", 7);
        assert_eq!(v, 42);
        std::env::remove_var("MNT_TEST_SET_VARIABLE");
    }
}
