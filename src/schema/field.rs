//! Field kinds and value coercion
//!
//! Every CSV cell arrives as text. A [`FieldKind`] decides whether that text
//! is acceptable and converts it into the JSON value sent to the API.

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::IpAddr;

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$").unwrap());

static DOMAIN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i)([a-z0-9]([a-z0-9\-]{0,61}[a-z0-9])?\.)+[a-z]{2,63}\.?$").unwrap()
});

static HEX_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9A-Fa-f]+$").unwrap());

/// Declared type of a collection field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Free text, passed through unchanged
    #[default]
    Text,
    /// Signed whole number
    Integer,
    /// Finite floating point number
    Float,
    /// Number between 0 and 100, an optional trailing `%` is accepted
    Percentage,
    /// true/false, yes/no, y/n, 1/0
    Boolean,
    /// Calendar date, `YYYY-MM-DD`
    Date,
    /// RFC 3339 timestamp, normalized to UTC
    DateTime,
    /// Email address
    Email,
    /// Absolute http(s) URL
    Url,
    /// IPv4 or IPv6 address
    IpAddress,
    /// DNS name
    Domain,
    /// MD5, SHA-1 or SHA-256 hex digest
    Hash,
    /// One of a fixed set of values, matched case-insensitively
    Enum(Vec<String>),
}

impl FieldKind {
    /// Human-readable description used in validation messages
    pub fn describe(&self) -> String {
        match self {
            Self::Text => "text".to_string(),
            Self::Integer => "an integer".to_string(),
            Self::Float => "a number".to_string(),
            Self::Percentage => "a percentage between 0 and 100".to_string(),
            Self::Boolean => "a boolean (true/false)".to_string(),
            Self::Date => "a date (YYYY-MM-DD)".to_string(),
            Self::DateTime => "an RFC 3339 timestamp".to_string(),
            Self::Email => "an email address".to_string(),
            Self::Url => "an http(s) URL".to_string(),
            Self::IpAddress => "an IP address".to_string(),
            Self::Domain => "a domain name".to_string(),
            Self::Hash => "an MD5, SHA-1 or SHA-256 hex digest".to_string(),
            Self::Enum(options) => format!("one of [{}]", options.join(", ")),
        }
    }

    /// Coerce a trimmed, non-empty cell into its typed JSON value.
    ///
    /// Returns `None` when the text does not fit this kind.
    pub fn coerce(&self, raw: &str) -> Option<Value> {
        let value = raw.trim();
        match self {
            Self::Text => Some(Value::String(value.to_string())),
            Self::Integer => value.parse::<i64>().ok().map(Value::from),
            Self::Float => parse_finite(value).and_then(number),
            Self::Percentage => {
                let digits = value.strip_suffix('%').unwrap_or(value).trim_end();
                parse_finite(digits)
                    .filter(|pct| (0.0..=100.0).contains(pct))
                    .and_then(number)
            }
            Self::Boolean => match value.to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" | "1" => Some(Value::Bool(true)),
                "false" | "no" | "n" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            Self::Date => NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .map(|date| Value::String(date.format("%Y-%m-%d").to_string())),
            Self::DateTime => DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|ts| Value::String(ts.with_timezone(&Utc).to_rfc3339())),
            Self::Email => EMAIL_PATTERN
                .is_match(value)
                .then(|| Value::String(value.to_string())),
            Self::Url => url::Url::parse(value)
                .ok()
                .filter(|url| matches!(url.scheme(), "http" | "https") && url.host().is_some())
                .map(|url| Value::String(url.to_string())),
            Self::IpAddress => value
                .parse::<IpAddr>()
                .ok()
                .map(|ip| Value::String(ip.to_string())),
            Self::Domain => DOMAIN_PATTERN
                .is_match(value)
                .then(|| Value::String(value.trim_end_matches('.').to_ascii_lowercase())),
            Self::Hash => (matches!(value.len(), 32 | 40 | 64) && HEX_PATTERN.is_match(value))
                .then(|| Value::String(value.to_ascii_lowercase())),
            Self::Enum(options) => options
                .iter()
                .find(|option| option.eq_ignore_ascii_case(value))
                .map(|option| Value::String(option.clone())),
        }
    }
}

fn parse_finite(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn number(value: f64) -> Option<Value> {
    serde_json::Number::from_f64(value).map(Value::Number)
}

/// One column of a collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// CSV header name
    pub name: String,
    /// Declared type
    #[serde(default)]
    pub kind: FieldKind,
    /// Header must exist and every row must carry a value
    #[serde(default)]
    pub required: bool,
    /// JSON key sent to the API, defaults to the header name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_name: Option<String>,
}

impl FieldSpec {
    /// Optional field
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            api_name: None,
        }
    }

    /// Required field
    pub fn required(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            required: true,
            ..Self::new(name, kind)
        }
    }

    /// Rename the field in the API payload
    pub fn with_api_name(mut self, api_name: impl Into<String>) -> Self {
        self.api_name = Some(api_name.into());
        self
    }

    /// Key used in the JSON payload
    pub fn json_key(&self) -> &str {
        self.api_name.as_deref().unwrap_or(&self.name)
    }
}

/// Build an [`FieldKind::Enum`] from string literals
pub fn one_of(options: &[&str]) -> FieldKind {
    FieldKind::Enum(options.iter().map(|s| s.to_string()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(FieldKind::Integer.coerce(" 42 "), Some(json!(42)));
        assert_eq!(FieldKind::Integer.coerce("4.2"), None);
        assert_eq!(FieldKind::Float.coerce("4.5"), Some(json!(4.5)));
        assert_eq!(FieldKind::Float.coerce("NaN"), None);
        assert_eq!(FieldKind::Float.coerce("abc"), None);
    }

    #[test]
    fn test_percentage_bounds() {
        assert_eq!(FieldKind::Percentage.coerce("87.5%"), Some(json!(87.5)));
        assert_eq!(FieldKind::Percentage.coerce("100"), Some(json!(100.0)));
        assert_eq!(FieldKind::Percentage.coerce("100.1"), None);
        assert_eq!(FieldKind::Percentage.coerce("-1"), None);
    }

    #[test]
    fn test_boolean_spellings() {
        assert_eq!(FieldKind::Boolean.coerce("Yes"), Some(json!(true)));
        assert_eq!(FieldKind::Boolean.coerce("0"), Some(json!(false)));
        assert_eq!(FieldKind::Boolean.coerce("maybe"), None);
    }

    #[test]
    fn test_dates() {
        assert_eq!(FieldKind::Date.coerce("2024-02-29"), Some(json!("2024-02-29")));
        assert_eq!(FieldKind::Date.coerce("2023-02-29"), None);
        assert_eq!(
            FieldKind::DateTime.coerce("2024-05-01T10:00:00+02:00"),
            Some(json!("2024-05-01T08:00:00+00:00"))
        );
        assert_eq!(FieldKind::DateTime.coerce("2024-05-01"), None);
    }

    #[test]
    fn test_network_kinds() {
        assert_eq!(FieldKind::IpAddress.coerce("10.0.0.1"), Some(json!("10.0.0.1")));
        assert!(FieldKind::IpAddress.coerce("::1").is_some());
        assert_eq!(FieldKind::IpAddress.coerce("10.0.0.256"), None);
        assert_eq!(FieldKind::Domain.coerce("Evil.Example.COM"), Some(json!("evil.example.com")));
        assert_eq!(FieldKind::Domain.coerce("not a domain"), None);
        assert!(FieldKind::Url.coerce("https://example.com/payload").is_some());
        assert_eq!(FieldKind::Url.coerce("ftp://example.com"), None);
        assert!(FieldKind::Email.coerce("soc@example.org").is_some());
        assert_eq!(FieldKind::Email.coerce("soc@"), None);
    }

    #[test]
    fn test_hash_lengths() {
        let md5 = "D41D8CD98F00B204E9800998ECF8427E";
        assert_eq!(FieldKind::Hash.coerce(md5), Some(json!(md5.to_ascii_lowercase())));
        assert_eq!(FieldKind::Hash.coerce("abc123"), None);
        assert_eq!(FieldKind::Hash.coerce(&"z".repeat(32)), None);
    }

    #[test]
    fn test_enum_is_case_insensitive_and_canonical() {
        let kind = one_of(&["low", "medium", "high"]);
        assert_eq!(kind.coerce("HIGH"), Some(json!("high")));
        assert_eq!(kind.coerce("severe"), None);
        assert_eq!(kind.describe(), "one of [low, medium, high]");
    }

    #[test]
    fn test_field_spec_deserializes_with_defaults() {
        let spec: FieldSpec = serde_json::from_str(r#"{"name": "bu"}"#).unwrap();
        assert_eq!(spec.kind, FieldKind::Text);
        assert!(!spec.required);
        assert_eq!(spec.json_key(), "bu");

        let spec: FieldSpec = serde_json::from_str(
            r#"{"name": "sev", "kind": {"enum": ["low", "high"]}, "required": true, "api_name": "severity"}"#,
        )
        .unwrap();
        assert_eq!(spec.kind, one_of(&["low", "high"]));
        assert_eq!(spec.json_key(), "severity");
    }
}
