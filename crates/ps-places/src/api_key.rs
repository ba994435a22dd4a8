use std::fmt;

use thiserror::Error;

/// Placeholder value shipped in sample `.env` files.
const PLACEHOLDER_KEY: &str = "your-api-key-here";

#[derive(Clone)]
pub struct ApiKey {
    key: String,
}

impl ApiKey {
    /// From a raw API key string. Rejects empty keys and the sample placeholder.
    pub fn from_raw(key: &str) -> Result<Self, ApiKeyError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(ApiKeyError::Missing);
        }
        if key == PLACEHOLDER_KEY {
            return Err(ApiKeyError::Placeholder);
        }
        Ok(Self {
            key: key.to_owned(),
        })
    }

    pub fn get(&self) -> &str {
        &self.key
    }

    /// The key with everything but the first and last four characters hidden.
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.key.chars().collect();
        if chars.len() <= 8 {
            return "****".to_string();
        }
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}****{tail}")
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ApiKey").field(&self.masked()).finish()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApiKeyError {
    #[error("no API key was provided")]
    Missing,
    #[error("the API key is still the sample placeholder")]
    Placeholder,
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAKE_API_KEY: &str = "AIzaFAKEKEY1234567890";

    #[test]
    fn from_raw_success() {
        let api_key = ApiKey::from_raw(FAKE_API_KEY);
        assert!(api_key.is_ok());
        assert_eq!(api_key.unwrap().get(), FAKE_API_KEY);
    }

    #[test]
    fn from_raw_rejects_empty_and_placeholder() {
        assert_eq!(ApiKey::from_raw("  ").unwrap_err(), ApiKeyError::Missing);
        assert_eq!(
            ApiKey::from_raw("your-api-key-here").unwrap_err(),
            ApiKeyError::Placeholder
        );
    }

    #[test]
    fn masked_hides_the_middle() {
        let api_key = ApiKey::from_raw(FAKE_API_KEY).unwrap();
        assert_eq!(api_key.masked(), "AIza****7890");
        assert_eq!(ApiKey::from_raw("short").unwrap().masked(), "****");
        assert!(!format!("{:?}", api_key).contains(FAKE_API_KEY));
    }
}
