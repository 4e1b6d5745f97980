//! Credential predicate over basenames.
//!
//! Computed independently of path classification: a credential match refuses
//! read/create/update regardless of level, and directory listings omit the
//! entry unless the caller opts in.

use regex::Regex;
use std::sync::OnceLock;

/// Exact basenames that always count as credentials.
const CREDENTIAL_FILENAMES: &[&str] = &[
    ".env",
    ".env.local",
    ".env.development",
    ".env.production",
    ".env.test",
    "credentials.json",
    "service-account.json",
    "id_rsa",
    "id_dsa",
    "id_ecdsa",
    "id_ed25519",
    ".npmrc",
    ".netrc",
    ".htpasswd",
    "secrets.json",
    "secrets.yaml",
    "secrets.yml",
];

/// Substring / suffix patterns, matched against the lowercased basename.
const CREDENTIAL_PATTERNS: &[&str] = &[
    r"secret",
    r"password",
    r"passwd",
    r"token",
    r"credential",
    r"private[-_]?key",
    r"api[-_]?key",
    r"\.pem$",
    r"\.p12$",
    r"\.pfx$",
    r"\.key$",
    r"\.keystore$",
    r"\.jks$",
];

fn compiled_patterns() -> &'static Vec<Regex> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        CREDENTIAL_PATTERNS
            .iter()
            .map(|p| Regex::new(p).expect("credential pattern must compile"))
            .collect()
    })
}

/// Whether `basename` names a credential file.
pub fn is_credential_name(basename: &str) -> bool {
    let lower = basename.to_lowercase();
    if CREDENTIAL_FILENAMES.iter().any(|n| *n == lower) {
        return true;
    }
    compiled_patterns().iter().any(|re| re.is_match(&lower))
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---- literal names ----

    #[test]
    fn test_dotenv_family() {
        assert!(is_credential_name(".env"));
        assert!(is_credential_name(".env.local"));
        assert!(is_credential_name(".ENV"));
    }

    #[test]
    fn test_ssh_keys() {
        assert!(is_credential_name("id_rsa"));
        assert!(is_credential_name("id_ed25519"));
    }

    // ---- patterns ----

    #[test]
    fn test_substring_patterns() {
        assert!(is_credential_name("jwt-secret.txt"));
        assert!(is_credential_name("db_password.cfg"));
        assert!(is_credential_name("access-token.json"));
        assert!(is_credential_name("API_KEY.txt"));
    }

    #[test]
    fn test_suffix_patterns() {
        assert!(is_credential_name("server.pem"));
        assert!(is_credential_name("bundle.p12"));
        assert!(is_credential_name("tls.key"));
    }

    // ---- non-matches ----

    #[test]
    fn test_ordinary_files_pass() {
        assert!(!is_credential_name("App.tsx"));
        assert!(!is_credential_name("package.json"));
        assert!(!is_credential_name("environment.md"));
        assert!(!is_credential_name("keyboard.rs"));
    }
}
