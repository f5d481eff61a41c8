//! Target URL access control.
//! Restricts which upstream URLs the relay is willing to contact.

use regex::Regex;

/// Predicate over the full target URL string.
///
/// Without a pattern every URL is allowed. With one, the pattern has to
/// match the whole URL, not just a substring of it.
#[derive(Debug, Clone, Default)]
pub struct UrlPolicy {
    whitelist: Option<Regex>,
}

impl UrlPolicy {
    /// Policy that allows every URL.
    pub fn allow_all() -> Self {
        Self { whitelist: None }
    }

    /// Compile a whitelist pattern. The pattern is anchored at both ends.
    pub fn from_pattern(pattern: &str) -> Result<Self, regex::Error> {
        let anchored = Regex::new(&format!("^(?:{pattern})$"))?;
        Ok(Self {
            whitelist: Some(anchored),
        })
    }

    /// Build from the optional configured pattern.
    pub fn from_config(pattern: Option<&str>) -> Result<Self, regex::Error> {
        match pattern {
            Some(p) => Self::from_pattern(p),
            None => Ok(Self::allow_all()),
        }
    }

    /// Returns true if the relay may contact this URL.
    pub fn allows(&self, url: &str) -> bool {
        match &self.whitelist {
            Some(re) => re.is_match(url),
            None => true,
        }
    }

    pub fn is_restricted(&self) -> bool {
        self.whitelist.is_some()
    }
}
