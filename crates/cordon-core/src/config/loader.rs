//! Small helpers for reading configuration from the process environment.

use std::env;

/// Read `key`, falling back to `default()` when unset or empty.
pub fn env_or(key: &str, default: impl FnOnce() -> String) -> String {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => v,
        _ => default(),
    }
}

/// Read `key` as an optional value. Empty strings count as unset.
pub fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Read `key` as a boolean: `1`, `true`, `yes` (case-insensitive) are true.
pub fn env_bool(key: &str) -> bool {
    env::var(key)
        .map(|v| {
            let v = v.trim();
            v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes")
        })
        .unwrap_or(false)
}

/// Read `key` as a number, falling back to `default` on unset or parse failure.
pub fn env_num<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Read `key` as a comma-separated list, trimming entries and dropping empties.
/// Returns `None` when unset so callers can apply their default list.
pub fn env_list(key: &str) -> Option<Vec<String>> {
    env_optional(key).map(|v| {
        v.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    })
}
