//! Environment variable helpers
//!
//! Small typed wrappers over `std::env::var`; all runtime knobs
//! (`CORO_*`) go through these.

use std::str::FromStr;

/// Parse an environment variable as `T`, falling back to `default`
/// when unset or unparsable.
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

/// Parse an environment variable as `T` when set.
#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Boolean knob: "1", "true", "yes", "on" (case-insensitive) are
/// true; any other set value is false; unset is the default.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

/// String value with a default, no `FromStr` needed.
#[inline]
pub fn env_get_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Whether the variable is set at all.
#[inline]
pub fn env_is_set(key: &str) -> bool {
    std::env::var(key).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_returns_default() {
        let v: usize = env_get("__CORO_TEST_UNSET__", 7);
        assert_eq!(v, 7);
        assert!(env_get_opt::<u32>("__CORO_TEST_UNSET__").is_none());
        assert!(env_get_bool("__CORO_TEST_UNSET__", true));
        assert_eq!(env_get_str("__CORO_TEST_UNSET__", "dflt"), "dflt");
        assert!(!env_is_set("__CORO_TEST_UNSET__"));
    }

    #[test]
    fn test_set_values_parse() {
        std::env::set_var("__CORO_TEST_NUM__", "4096");
        assert_eq!(env_get("__CORO_TEST_NUM__", 0usize), 4096);
        std::env::set_var("__CORO_TEST_NUM__", "nope");
        assert_eq!(env_get("__CORO_TEST_NUM__", 33usize), 33);
        std::env::remove_var("__CORO_TEST_NUM__");
    }

    #[test]
    fn test_bool_variants() {
        std::env::set_var("__CORO_TEST_BOOL__", "on");
        assert!(env_get_bool("__CORO_TEST_BOOL__", false));
        std::env::set_var("__CORO_TEST_BOOL__", "0");
        assert!(!env_get_bool("__CORO_TEST_BOOL__", true));
        std::env::remove_var("__CORO_TEST_BOOL__");
    }
}
