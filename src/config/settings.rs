//! The externally owned settings document.
//!
//! Operators edit this JSON file while the gateway runs. It carries the
//! access-control policy, the key registry, the maintenance flag and the
//! attribution label stamped into every JSON envelope. Fields the gateway
//! does not understand are kept so `/api/settings` can echo them back.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Root of the settings document.
///
/// Every field is read leniently: a value of the wrong type degrades that
/// one field instead of failing the whole document.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(
        default,
        deserialize_with = "lenient::section",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_settings: Option<ApiSettings>,

    #[serde(
        default,
        deserialize_with = "lenient::section",
        skip_serializing_if = "Option::is_none"
    )]
    pub maintenance: Option<MaintenanceSettings>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The `apiSettings` section.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApiSettings {
    /// Tri-state: `None` means pass-through. Only a literal `false`
    /// disables keys; other truthy values require them.
    #[serde(
        default,
        deserialize_with = "lenient::requirement",
        skip_serializing_if = "Option::is_none"
    )]
    pub require_apikey: Option<bool>,

    /// Key registry. `None` is a misconfiguration when keys are required.
    #[serde(
        default,
        deserialize_with = "lenient::registry",
        skip_serializing_if = "Option::is_none"
    )]
    pub apikey: Option<HashMap<String, ApiKeyEntry>>,

    #[serde(
        default,
        deserialize_with = "lenient::text",
        skip_serializing_if = "Option::is_none"
    )]
    pub creator: Option<String>,

    #[serde(
        default,
        deserialize_with = "lenient::text",
        skip_serializing_if = "Option::is_none"
    )]
    pub attribution: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One registered API key.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyEntry {
    /// Only a literal `true` enables the key.
    #[serde(default, deserialize_with = "lenient::strict_true")]
    pub enabled: bool,

    /// `"<N>/minute"`, `"<N>/hour"`, `"<N>/day"` or `"unlimited"`.
    /// Non-string values are dropped and the default policy applies.
    #[serde(
        default,
        deserialize_with = "lenient::text",
        skip_serializing_if = "Option::is_none"
    )]
    pub rate_limit: Option<String>,
}

/// The `maintenance` section.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceSettings {
    #[serde(default, deserialize_with = "lenient::truthy")]
    pub enabled: bool,

    /// Extra exempt prefixes on top of the configured ones.
    #[serde(
        default,
        deserialize_with = "lenient::paths",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub exempt_paths: Vec<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Field readers that never reject a value.
mod lenient {
    use std::collections::HashMap;

    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::ApiKeyEntry;

    fn is_truthy(value: &Value) -> bool {
        match value {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }

    /// An object section; anything else reads as absent.
    pub fn section<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        Ok(match Value::deserialize(deserializer)? {
            value @ Value::Object(_) => serde_json::from_value(value).ok(),
            _ => None,
        })
    }

    pub fn requirement<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Bool(b) => Some(b),
            other if is_truthy(&other) => Some(true),
            _ => None,
        })
    }

    pub fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(is_truthy(&Value::deserialize(deserializer)?))
    }

    pub fn strict_true<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(matches!(Value::deserialize(deserializer)?, Value::Bool(true)))
    }

    pub fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => Some(s),
            _ => None,
        })
    }

    pub fn paths<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        })
    }

    /// A non-object registry is `None`; a non-object entry is a disabled key.
    pub fn registry<'de, D>(
        deserializer: D,
    ) -> Result<Option<HashMap<String, ApiKeyEntry>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Value::Object(entries) = Value::deserialize(deserializer)? else {
            return Ok(None);
        };
        let registry = entries
            .into_iter()
            .map(|(key, entry)| {
                let entry = match entry {
                    value @ Value::Object(_) => {
                        serde_json::from_value(value).unwrap_or_default()
                    }
                    _ => ApiKeyEntry::default(),
                };
                (key, entry)
            })
            .collect();
        Ok(Some(registry))
    }
}

impl Settings {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn require_apikey(&self) -> Option<bool> {
        self.api_settings.as_ref().and_then(|s| s.require_apikey)
    }

    /// True only when key enforcement is explicitly switched off.
    pub fn keys_disabled(&self) -> bool {
        self.require_apikey() == Some(false)
    }

    /// `creator`, else `attribution`, ignoring empty strings.
    pub fn attribution(&self) -> Option<&str> {
        let api = self.api_settings.as_ref()?;
        [api.creator.as_deref(), api.attribution.as_deref()]
            .into_iter()
            .flatten()
            .find(|c| !c.is_empty())
    }

    pub fn key_registry(&self) -> Option<&HashMap<String, ApiKeyEntry>> {
        self.api_settings.as_ref().and_then(|s| s.apikey.as_ref())
    }

    pub fn maintenance_enabled(&self) -> bool {
        self.maintenance.as_ref().is_some_and(|m| m.enabled)
    }

    pub fn maintenance_exemptions(&self) -> &[String] {
        self.maintenance
            .as_ref()
            .map(|m| m.exempt_paths.as_slice())
            .unwrap_or_default()
    }
}
