//! Connector configuration
//!
//! Loaded from YAML or JSON, or from the flat string map a host passes to a
//! plugin. Durations are strings such as `500ms`, `5s` or `1m30s`.

use crate::error::{Error, Result};
use crate::hubspot::{HubSpotClientConfig, ResourceRegistry, DEFAULT_BASE_URL};
use crate::http::RateLimiterConfig;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Largest accepted buffer size
pub const MAX_BUFFER_SIZE: usize = 100;

// ============================================================================
// Connector Config
// ============================================================================

/// Complete connector configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorConfig {
    /// Private app access token
    #[serde(default)]
    pub access_token: String,

    /// Resource name, e.g. `crm.contacts`
    #[serde(default)]
    pub resource: String,

    /// Retries per request
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Use the higher request quota of the API add-on
    #[serde(default)]
    pub api_add_on: bool,

    /// Source settings
    #[serde(flatten)]
    pub source: SourceConfig,
}

/// Settings only the source reads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceConfig {
    /// How often a sub-iterator polls for more items
    #[serde(default = "default_polling_period", with = "duration_str")]
    pub polling_period: Duration,

    /// Record queue capacity and page size
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Properties to request in addition to the defaults
    #[serde(default, deserialize_with = "property_list")]
    pub extra_properties: Vec<String>,

    /// Take a snapshot before capturing changes
    #[serde(default = "default_true")]
    pub snapshot: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            polling_period: default_polling_period(),
            buffer_size: default_buffer_size(),
            extra_properties: Vec::new(),
            snapshot: default_true(),
        }
    }
}

impl SourceConfig {
    /// Poll period in effect, a zero period falls back to the default
    pub fn poll_period(&self) -> Duration {
        if self.polling_period.is_zero() {
            default_polling_period()
        } else {
            self.polling_period
        }
    }
}

fn default_max_retries() -> u32 {
    4
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_polling_period() -> Duration {
    Duration::from_secs(5)
}

fn default_buffer_size() -> usize {
    100
}

fn default_true() -> bool {
    true
}

impl ConnectorConfig {
    /// Config for a resource with every other setting at its default
    pub fn new(access_token: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            resource: resource.into(),
            max_retries: default_max_retries(),
            base_url: default_base_url(),
            api_add_on: false,
            source: SourceConfig::default(),
        }
    }

    /// Parse YAML, or JSON since it is a subset
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read a YAML or JSON config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Build from a flat map of string values. Unknown keys are ignored.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| map.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        let mut config = Self::new(
            get("accessToken").unwrap_or_default(),
            get("resource").unwrap_or_default(),
        );

        if let Some(value) = get("maxRetries") {
            config.max_retries = value
                .parse()
                .map_err(|e| Error::invalid_value("maxRetries", format!("{e}")))?;
        }
        if let Some(value) = get("baseUrl") {
            config.base_url = value.to_string();
        }
        if let Some(value) = get("apiAddOn") {
            config.api_add_on = parse_bool("apiAddOn", value)?;
        }
        if let Some(value) = get("pollingPeriod") {
            config.source.polling_period = parse_duration(value)
                .map_err(|e| Error::invalid_value("pollingPeriod", e.to_string()))?;
        }
        if let Some(value) = get("bufferSize") {
            config.source.buffer_size = value
                .parse()
                .map_err(|e| Error::invalid_value("bufferSize", format!("{e}")))?;
        }
        if let Some(value) = get("extraProperties") {
            config.source.extra_properties = split_properties(value);
        }
        if let Some(value) = get("snapshot") {
            config.source.snapshot = parse_bool("snapshot", value)?;
        }

        Ok(config)
    }

    /// Check required fields and ranges against the given registry
    pub fn validate(&self, registry: &ResourceRegistry) -> Result<()> {
        if self.access_token.is_empty() {
            return Err(Error::missing_field("accessToken"));
        }
        if self.resource.is_empty() {
            return Err(Error::missing_field("resource"));
        }
        if !registry.contains(&self.resource) {
            return Err(Error::invalid_value(
                "resource",
                format!("unsupported resource \"{}\"", self.resource),
            ));
        }
        if self.max_retries < 1 {
            return Err(Error::invalid_value("maxRetries", "must be at least 1"));
        }
        url::Url::parse(&self.base_url)
            .map_err(|e| Error::invalid_value("baseUrl", e.to_string()))?;
        if !(1..=MAX_BUFFER_SIZE).contains(&self.source.buffer_size) {
            return Err(Error::invalid_value(
                "bufferSize",
                format!("must be between 1 and {MAX_BUFFER_SIZE}"),
            ));
        }

        Ok(())
    }

    /// Settings of the API client
    pub fn client_config(&self) -> HubSpotClientConfig {
        let rate_limit = if self.api_add_on {
            RateLimiterConfig::api_add_on()
        } else {
            RateLimiterConfig::default()
        };

        HubSpotClientConfig::new(self.access_token.clone())
            .base_url(self.base_url.clone())
            .max_retries(self.max_retries)
            .rate_limit(rate_limit)
    }
}

// ============================================================================
// Value Parsing
// ============================================================================

static DURATION_PART: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(\d+)(ms|s|m|h|d)").ok());

/// Parse a duration string made of `<number><unit>` parts, units being
/// `ms`, `s`, `m`, `h` and `d`. A bare `0` is accepted.
pub fn parse_duration(value: &str) -> Result<Duration> {
    let value = value.trim();
    if value == "0" {
        return Ok(Duration::ZERO);
    }

    let invalid = || Error::config(format!("invalid duration \"{value}\""));
    let re = DURATION_PART.as_ref().ok_or_else(invalid)?;

    let mut total = Duration::ZERO;
    let mut consumed = 0;
    for caps in re.captures_iter(value) {
        let (Some(whole), Some(amount), Some(unit)) = (caps.get(0), caps.get(1), caps.get(2))
        else {
            return Err(invalid());
        };
        if whole.start() != consumed {
            return Err(invalid());
        }
        consumed = whole.end();

        let amount: u64 = amount.as_str().parse().map_err(|_| invalid())?;
        total += match unit.as_str() {
            "ms" => Duration::from_millis(amount),
            "s" => Duration::from_secs(amount),
            "m" => Duration::from_secs(amount * 60),
            "h" => Duration::from_secs(amount * 3600),
            _ => Duration::from_secs(amount * 86_400),
        };
    }

    if consumed == 0 || consumed != value.len() {
        return Err(invalid());
    }

    Ok(total)
}

/// Render a duration the way [`parse_duration`] reads it
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis % 1000 == 0 {
        format!("{}s", millis / 1000)
    } else {
        format!("{millis}ms")
    }
}

fn parse_bool(field: &str, value: &str) -> Result<bool> {
    value
        .parse()
        .map_err(|_| Error::invalid_value(field, format!("\"{value}\" is not a boolean")))
}

/// Split a comma or whitespace separated property list
fn split_properties(value: &str) -> Vec<String> {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PropertyList {
    Joined(String),
    List(Vec<String>),
}

fn property_list<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Vec<String>, D::Error> {
    Ok(match PropertyList::deserialize(deserializer)? {
        PropertyList::Joined(value) => split_properties(&value),
        PropertyList::List(values) => values,
    })
}

mod duration_str {
    use super::{format_duration, parse_duration};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_duration(*duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let value = String::deserialize(deserializer)?;
        parse_duration(&value).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test]
    fn test_parse_minimal_config() {
        let yaml = r#"
accessToken: "pat-na1-123"
resource: crm.contacts
"#;

        let config = ConnectorConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config, ConnectorConfig::new("pat-na1-123", "crm.contacts"));
        assert_eq!(config.max_retries, 4);
        assert_eq!(config.base_url, "https://api.hubapi.com");
        assert_eq!(config.source.polling_period, Duration::from_secs(5));
        assert_eq!(config.source.buffer_size, 100);
        assert!(config.source.snapshot);
        assert!(config.source.extra_properties.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
accessToken: "pat-na1-123"
resource: cms.pages.site
maxRetries: 2
baseUrl: "http://localhost:8080"
apiAddOn: true
pollingPeriod: 1m30s
bufferSize: 20
extraProperties: "email, firstname lastname"
snapshot: false
"#;

        let config = ConnectorConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.base_url, "http://localhost:8080");
        assert!(config.api_add_on);
        assert_eq!(config.source.polling_period, Duration::from_secs(90));
        assert_eq!(config.source.buffer_size, 20);
        assert_eq!(
            config.source.extra_properties,
            vec!["email", "firstname", "lastname"]
        );
        assert!(!config.source.snapshot);
    }

    #[test]
    fn test_parse_json_config_with_property_list() {
        let json = r#"{"accessToken":"t","resource":"crm.deals","extraProperties":["amount"],"pollingPeriod":"250ms"}"#;

        let config = ConnectorConfig::from_yaml_str(json).unwrap();
        assert_eq!(config.source.extra_properties, vec!["amount"]);
        assert_eq!(config.source.polling_period, Duration::from_millis(250));
    }

    #[test]
    fn test_from_map() {
        let map: HashMap<String, String> = [
            ("accessToken", "t"),
            ("resource", "crm.tickets"),
            ("pollingPeriod", "2s"),
            ("bufferSize", "10"),
            ("extraProperties", "subject,content"),
            ("snapshot", "false"),
            ("unknown", "ignored"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let config = ConnectorConfig::from_map(&map).unwrap();
        assert_eq!(config.resource, "crm.tickets");
        assert_eq!(config.source.polling_period, Duration::from_secs(2));
        assert_eq!(config.source.buffer_size, 10);
        assert_eq!(config.source.extra_properties, vec!["subject", "content"]);
        assert!(!config.source.snapshot);
        assert_eq!(config.max_retries, 4);
    }

    #[test_case("bufferSize", "ten" ; "buffer size")]
    #[test_case("pollingPeriod", "soon" ; "polling period")]
    #[test_case("snapshot", "yes" ; "snapshot flag")]
    #[test_case("maxRetries", "-1" ; "max retries")]
    fn test_from_map_rejects_bad_value(key: &str, value: &str) {
        let map: HashMap<String, String> = [(key.to_string(), value.to_string())].into();

        let err = ConnectorConfig::from_map(&map).unwrap_err();
        assert!(matches!(err, Error::InvalidConfigValue { field, .. } if field == key));
    }

    #[test]
    fn test_validate() {
        let registry = ResourceRegistry::hubspot();
        assert!(ConnectorConfig::new("t", "crm.contacts")
            .validate(&registry)
            .is_ok());

        let err = ConnectorConfig::new("", "crm.contacts")
            .validate(&registry)
            .unwrap_err();
        assert!(matches!(err, Error::MissingConfigField { field } if field == "accessToken"));

        let err = ConnectorConfig::new("t", "").validate(&registry).unwrap_err();
        assert!(matches!(err, Error::MissingConfigField { field } if field == "resource"));

        let err = ConnectorConfig::new("t", "crm.unknown")
            .validate(&registry)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfigValue { field, .. } if field == "resource"));
    }

    #[test_case(|c: &mut ConnectorConfig| c.max_retries = 0, "maxRetries" ; "zero retries")]
    #[test_case(|c: &mut ConnectorConfig| c.base_url = "not a url".to_string(), "baseUrl" ; "bad base url")]
    #[test_case(|c: &mut ConnectorConfig| c.source.buffer_size = 0, "bufferSize" ; "empty buffer")]
    #[test_case(|c: &mut ConnectorConfig| c.source.buffer_size = 101, "bufferSize" ; "oversized buffer")]
    fn test_validate_ranges(change: fn(&mut ConnectorConfig), field: &str) {
        let mut config = ConnectorConfig::new("t", "crm.contacts");
        change(&mut config);

        let err = config.validate(&ResourceRegistry::hubspot()).unwrap_err();
        assert!(matches!(err, Error::InvalidConfigValue { field: f, .. } if f == field));
    }

    #[test]
    fn test_zero_polling_period_falls_back() {
        let mut source = SourceConfig::default();
        source.polling_period = Duration::ZERO;
        assert_eq!(source.poll_period(), Duration::from_secs(5));

        source.polling_period = Duration::from_millis(100);
        assert_eq!(source.poll_period(), Duration::from_millis(100));
    }

    #[test_case("500ms", Duration::from_millis(500))]
    #[test_case("5s", Duration::from_secs(5))]
    #[test_case("2m", Duration::from_secs(120))]
    #[test_case("1h30m", Duration::from_secs(5400))]
    #[test_case("1d", Duration::from_secs(86_400))]
    #[test_case("0", Duration::ZERO)]
    fn test_parse_duration(input: &str, expected: Duration) {
        assert_eq!(parse_duration(input).unwrap(), expected);
    }

    #[test_case("" ; "empty")]
    #[test_case("5" ; "no unit")]
    #[test_case("5x" ; "unknown unit")]
    #[test_case("s5" ; "unit first")]
    #[test_case("5s later" ; "trailing text")]
    fn test_parse_duration_invalid(input: &str) {
        assert!(parse_duration(input).is_err());
    }

    #[test]
    fn test_duration_serialization() {
        let mut config = ConnectorConfig::new("t", "crm.contacts");
        config.source.polling_period = Duration::from_millis(1500);

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["pollingPeriod"], "1500ms");
        assert_eq!(json["bufferSize"], 100);

        let restored: ConnectorConfig = serde_json::from_value(json).unwrap();
        assert_eq!(restored, config);
    }
}
