//! Per-key execution state.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use trawl_core::Record;

/// Boolean state a workflow can branch on with `conditional_skip`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextFlag {
    NoResultsFound,
    VerificationFailed,
}

impl FromStr for ContextFlag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "no_results_found" => Ok(Self::NoResultsFound),
            "verification_failed" => Ok(Self::VerificationFailed),
            other => Err(format!("unknown flag '{other}'")),
        }
    }
}

impl fmt::Display for ContextFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoResultsFound => write!(f, "no_results_found"),
            Self::VerificationFailed => write!(f, "verification_failed"),
        }
    }
}

/// State for one key's run. Dropped when the key finishes.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    /// Lookup key being processed
    pub key: String,
    /// Run parameters available to templates (`sku`, `base_url`, credentials, ...)
    pub params: HashMap<String, String>,
    /// Extracted fields
    pub results: Record,
    pub no_results_found: bool,
    pub verification_failed: bool,
}

impl ExecutionContext {
    pub fn new(key: impl Into<String>, base_url: &str) -> Self {
        let key = key.into();
        let mut params = HashMap::new();
        params.insert("sku".to_string(), key.clone());
        params.insert("key".to_string(), key.clone());
        params.insert("base_url".to_string(), base_url.trim_end_matches('/').to_string());
        Self {
            key,
            params,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn flag(&self, flag: ContextFlag) -> bool {
        match flag {
            ContextFlag::NoResultsFound => self.no_results_found,
            ContextFlag::VerificationFailed => self.verification_failed,
        }
    }

    pub fn set_flag(&mut self, flag: ContextFlag, value: bool) {
        match flag {
            ContextFlag::NoResultsFound => self.no_results_found = value,
            ContextFlag::VerificationFailed => self.verification_failed = value,
        }
    }

    /// Extracted field as text; arrays are not text.
    pub fn text(&self, field: &str) -> Option<String> {
        match self.results.get(field)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.results.insert(field.into(), value.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_seeds_params() {
        let ctx = ExecutionContext::new("035585499741", "https://shop.test/")
            .with_params([("username", "buyer")]);
        assert_eq!(ctx.params["sku"], "035585499741");
        assert_eq!(ctx.params["base_url"], "https://shop.test");
        assert_eq!(ctx.params["username"], "buyer");
        assert!(!ctx.no_results_found);
    }

    #[test]
    fn test_flags() {
        let mut ctx = ExecutionContext::default();
        let flag: ContextFlag = "no_results_found".parse().unwrap();
        ctx.set_flag(flag, true);
        assert!(ctx.flag(ContextFlag::NoResultsFound));
        assert!(!ctx.flag(ContextFlag::VerificationFailed));
        assert!("bogus".parse::<ContextFlag>().is_err());
    }
}
