//! Explicit base-URL configuration.
//!
//! A [`BaseUrl`] is validated when it is constructed, so a missing or
//! malformed base surfaces where the API is configured instead of as a
//! deferred failure on the first request. There is no process-wide default.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BaseUrlError {
    #[error("the base URL is empty")]
    Empty,
    #[error("the base URL `{0}` has no http or https scheme")]
    MissingScheme(String),
}

/// A validated base URL, stored without a trailing slash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl(String);

impl BaseUrl {
    pub fn parse(raw: &str) -> Result<Self, BaseUrlError> {
        let trimmed = raw.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(BaseUrlError::Empty);
        }
        if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
            return Err(BaseUrlError::MissingScheme(raw.to_owned()));
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Joins a path onto the base, normalizing slashes on both sides.
    pub fn join(&self, path: &str) -> String {
        format!("{}/{}", self.0, path.trim_matches('/'))
    }
}

/// Percent-encodes a string for use inside a URL query component.
pub fn percent_encode_query(raw: &str) -> String {
    let mut encoded = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        if is_query_allowed(byte) {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    encoded
}

// The characters allowed in a query component, per RFC 3986.
fn is_query_allowed(byte: u8) -> bool {
    byte.is_ascii_alphanumeric()
        || matches!(
            byte,
            b'!' | b'$'
                | b'&'
                | b'\''
                | b'('
                | b')'
                | b'*'
                | b'+'
                | b','
                | b'-'
                | b'.'
                | b'/'
                | b':'
                | b';'
                | b'='
                | b'?'
                | b'@'
                | b'_'
                | b'~'
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_an_empty_base() {
        assert_eq!(BaseUrl::parse("  "), Err(BaseUrlError::Empty));
    }

    #[test]
    fn rejects_a_base_without_a_scheme() {
        assert_eq!(
            BaseUrl::parse("api.example.com"),
            Err(BaseUrlError::MissingScheme("api.example.com".to_owned()))
        );
    }

    #[test]
    fn joining_normalizes_slashes() {
        let base = BaseUrl::parse("https://api.example.com/").unwrap();
        assert_eq!(base.join("/songs/"), "https://api.example.com/songs");
        assert_eq!(base.join("songs"), "https://api.example.com/songs");
    }

    #[test]
    fn query_encoding_escapes_reserved_bytes() {
        assert_eq!(percent_encode_query("Earth, Wind & Fire"), "Earth,%20Wind%20&%20Fire");
        assert_eq!(percent_encode_query("plain-text_1.0"), "plain-text_1.0");
    }
}
