//! Environment variable API key provider.
//!
//! The key is read from the variable named by `ChatConfig::api_key_env`
//! (default `MOONSHOT_API_KEY`) and wrapped in a [`SecretString`] right away,
//! so it never reaches `Debug` output or logs. Only the variable name is
//! ever mentioned in messages.

use secrecy::SecretString;

/// Read an API key from `env_name`.
///
/// Returns `None` when the variable is unset, empty, or not valid Unicode.
pub fn resolve_api_key(env_name: &str) -> Option<SecretString> {
    match std::env::var(env_name) {
        Ok(val) if !val.trim().is_empty() => Some(SecretString::from(val.trim().to_string())),
        Ok(_) => {
            tracing::debug!(env = env_name, "API key variable is empty");
            None
        }
        Err(std::env::VarError::NotPresent) => None,
        Err(std::env::VarError::NotUnicode(_)) => {
            // Secrets must be valid strings
            tracing::warn!(env = env_name, "API key variable is not valid Unicode");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_resolve_existing_key() {
        // SAFETY: the variable name is unique to this test.
        unsafe { std::env::set_var("PERSONA_CHAT_TEST_KEY_1", " sk-test-123 ") };

        let key = resolve_api_key("PERSONA_CHAT_TEST_KEY_1").unwrap();
        assert_eq!(key.expose_secret(), "sk-test-123");

        // SAFETY: set above, unique to this test.
        unsafe { std::env::remove_var("PERSONA_CHAT_TEST_KEY_1") };
    }

    #[test]
    fn test_resolve_missing_key() {
        assert!(resolve_api_key("PERSONA_CHAT_NONEXISTENT_VAR_XYZ").is_none());
    }

    #[test]
    fn test_resolve_empty_key() {
        // SAFETY: the variable name is unique to this test.
        unsafe { std::env::set_var("PERSONA_CHAT_TEST_KEY_EMPTY", "  ") };

        assert!(resolve_api_key("PERSONA_CHAT_TEST_KEY_EMPTY").is_none());

        // SAFETY: set above, unique to this test.
        unsafe { std::env::remove_var("PERSONA_CHAT_TEST_KEY_EMPTY") };
    }
}
