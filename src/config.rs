use anyhow::{Context, Result};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::fs;
use std::path::Path;

/// A single scalar option value as it appears in the TOML config.
#[derive(Debug, Clone, PartialEq)]
pub enum OptValue {
  Bool(bool),
  Str(String),
  Int(i64),
  Float(f64),
}

impl OptValue {
  /// String form used in conversion URLs. The whole rendered value is
  /// lower-cased, so booleans become `true`/`false` and string values lose
  /// their casing.
  pub fn render(&self) -> String {
    match self {
      OptValue::Bool(b) => b.to_string(),
      OptValue::Str(s) => s.to_lowercase(),
      OptValue::Int(n) => n.to_string(),
      OptValue::Float(x) => x.to_string(),
    }
  }
}

impl<'de> Deserialize<'de> for OptValue {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: Deserializer<'de>,
  {
    struct ScalarVisitor;

    impl<'de> Visitor<'de> for ScalarVisitor {
      type Value = OptValue;

      fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a boolean, string, or number")
      }

      fn visit_bool<E: serde::de::Error>(self, v: bool) -> Result<Self::Value, E> {
        Ok(OptValue::Bool(v))
      }

      fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(OptValue::Int(v))
      }

      fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Self::Value, E> {
        i64::try_from(v)
          .map(OptValue::Int)
          .map_err(|_| E::custom(format!("option value {v} out of range")))
      }

      fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<Self::Value, E> {
        Ok(OptValue::Float(v))
      }

      fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(OptValue::Str(v.to_string()))
      }

      fn visit_string<E: serde::de::Error>(self, v: String) -> Result<Self::Value, E> {
        Ok(OptValue::Str(v))
      }
    }

    deserializer.deserialize_any(ScalarVisitor)
  }
}

/// Ordered key/value option set. Iteration follows document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptMap(Vec<(String, OptValue)>);

impl OptMap {
  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &OptValue)> {
    self.0.iter().map(|(k, v)| (k.as_str(), v))
  }

  pub fn get(&self, key: &str) -> Option<&OptValue> {
    self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
  }

  /// Layer `other` on top of self. An existing key is replaced in place
  /// (keeping its original position); a new key is appended.
  pub fn overlay(&mut self, other: &OptMap) {
    for (key, value) in &other.0 {
      match self.0.iter_mut().find(|(k, _)| k == key) {
        Some(slot) => slot.1 = value.clone(),
        None => self.0.push((key.clone(), value.clone())),
      }
    }
  }

  #[cfg(test)]
  pub fn from_pairs(pairs: Vec<(&str, OptValue)>) -> Self {
    OptMap(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
  }
}

impl<'de> Deserialize<'de> for OptMap {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: Deserializer<'de>,
  {
    struct PairsVisitor;

    impl<'de> Visitor<'de> for PairsVisitor {
      type Value = OptMap;

      fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a table of scalar option values")
      }

      fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
      where
        A: MapAccess<'de>,
      {
        let mut entries = Vec::new();
        while let Some((key, value)) = access.next_entry::<String, OptValue>()? {
          entries.push((key, value));
        }
        Ok(OptMap(entries))
      }
    }

    deserializer.deserialize_map(PairsVisitor)
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub settings: Settings,

  #[serde(default)]
  pub converter: ConverterConfig,

  #[serde(default)]
  pub subscriptions: Vec<Subscription>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
  /// Base URL the converted files are served from, used by `list-location`.
  pub location: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConverterConfig {
  #[serde(default)]
  pub base_url: String,

  #[serde(default)]
  pub config_url: String,

  #[serde(default)]
  pub opts: OptMap,
}

fn default_enable() -> bool {
  true
}

#[derive(Debug, Clone, Deserialize)]
pub struct Subscription {
  #[serde(default)]
  pub name: String,

  #[serde(default)]
  pub sub_urls: Vec<String>,

  #[serde(default)]
  pub dst_path: String,

  #[serde(default = "default_enable")]
  pub enable: bool,

  /// Highest-priority per-subscription overrides.
  #[serde(default)]
  pub opts: Option<OptMap>,

  /// Lower-priority per-subscription additions.
  #[serde(default)]
  pub append_opts: Option<OptMap>,
}

impl Subscription {
  pub fn display_name(&self) -> &str {
    if self.name.is_empty() {
      "(unnamed)"
    } else {
      &self.name
    }
  }
}

pub fn load_config(path: &Path) -> Result<Config> {
  let raw = fs::read_to_string(path)
    .with_context(|| format!("failed to read config file {}", path.display()))?;
  let config: Config =
    toml::from_str(&raw).with_context(|| format!("failed to parse config file {}", path.display()))?;
  Ok(config)
}
