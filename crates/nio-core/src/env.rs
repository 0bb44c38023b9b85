//! Generic environment-variable parsing, used to tune `EngineConfig` and
//! the logging module without a config file or CLI.

use std::str::FromStr;

#[inline]
pub fn env_get<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => matches!(val.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_get_falls_back_to_default() {
        let v: usize = env_get("__NIO_TEST_UNSET__", 42);
        assert_eq!(v, 42);
    }

    #[test]
    fn env_get_parses_set_value() {
        std::env::set_var("__NIO_TEST_NUM__", "123");
        let v: usize = env_get("__NIO_TEST_NUM__", 0);
        assert_eq!(v, 123);
        std::env::remove_var("__NIO_TEST_NUM__");
    }

    #[test]
    fn env_get_bool_variants() {
        std::env::set_var("__NIO_TEST_BOOL__", "yes");
        assert!(env_get_bool("__NIO_TEST_BOOL__", false));
        std::env::set_var("__NIO_TEST_BOOL__", "0");
        assert!(!env_get_bool("__NIO_TEST_BOOL__", true));
        std::env::remove_var("__NIO_TEST_BOOL__");
    }
}
