const ENV_PREFIX: &str = "TIDEHOOK_";

/// Get environment variable with TIDEHOOK_ prefix, falling back to unprefixed version
///
/// # Examples
///
/// ```rust
/// use tidehook::utils::get_env_with_prefix;
///
/// // Checks TIDEHOOK_PORT first, then PORT
/// let port = get_env_with_prefix("PORT");
/// ```
pub fn get_env_with_prefix(key: &str) -> Option<String> {
    std::env::var(format!("{}{}", ENV_PREFIX, key))
        .or_else(|_| std::env::var(key))
        .ok()
}

/// Collect every variable named `TIDEHOOK_{prefix}{suffix}` or
/// `{prefix}{suffix}` as `(suffix, value)` pairs.
///
/// The prefixed form wins when both are set for the same suffix. Variables
/// with an empty suffix or a non-unicode value are skipped.
pub fn vars_with_prefix(prefix: &str) -> Vec<(String, String)> {
    let prefixed = format!("{}{}", ENV_PREFIX, prefix);
    let mut bare = Vec::new();
    let mut found: Vec<(String, String)> = Vec::new();

    for (key, value) in std::env::vars_os() {
        let (Some(key), Some(value)) = (key.to_str(), value.to_str()) else {
            continue;
        };
        if let Some(suffix) = key.strip_prefix(&prefixed) {
            if !suffix.is_empty() {
                found.push((suffix.to_string(), value.to_string()));
            }
        } else if let Some(suffix) = key.strip_prefix(prefix) {
            if !suffix.is_empty() {
                bare.push((suffix.to_string(), value.to_string()));
            }
        }
    }

    for (suffix, value) in bare {
        if !found.iter().any(|(s, _)| s == &suffix) {
            found.push((suffix, value));
        }
    }

    found.sort_by(|a, b| a.0.cmp(&b.0));
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_env_with_prefix() {
        unsafe {
            std::env::set_var("TIDEHOOK_ENV_TEST_VAR", "prefixed_value");
        }
        assert_eq!(get_env_with_prefix("ENV_TEST_VAR"), Some("prefixed_value".to_string()));
        unsafe {
            std::env::remove_var("TIDEHOOK_ENV_TEST_VAR");
        }

        unsafe {
            std::env::set_var("ENV_FALLBACK_VAR", "unprefixed_value");
        }
        assert_eq!(get_env_with_prefix("ENV_FALLBACK_VAR"), Some("unprefixed_value".to_string()));
        unsafe {
            std::env::remove_var("ENV_FALLBACK_VAR");
        }

        assert_eq!(get_env_with_prefix("ENV_NON_EXISTENT_VAR"), None);
    }

    #[test]
    fn test_vars_with_prefix() {
        unsafe {
            std::env::set_var("TIDEHOOK_SCAN_TEST_ALPHA", "prefixed");
            std::env::set_var("SCAN_TEST_ALPHA", "bare");
            std::env::set_var("SCAN_TEST_BETA", "bare_only");
            std::env::set_var("SCAN_TEST_", "empty_suffix");
        }

        let vars = vars_with_prefix("SCAN_TEST_");

        unsafe {
            std::env::remove_var("TIDEHOOK_SCAN_TEST_ALPHA");
            std::env::remove_var("SCAN_TEST_ALPHA");
            std::env::remove_var("SCAN_TEST_BETA");
            std::env::remove_var("SCAN_TEST_");
        }

        assert_eq!(
            vars,
            vec![
                ("ALPHA".to_string(), "prefixed".to_string()),
                ("BETA".to_string(), "bare_only".to_string()),
            ]
        );
    }
}
