//! Register records: risks and the instruments attached to them
//!
//! Records are JSON-compatible and camelCase on the wire. Decoding is lenient:
//! malformed optional fields fall back to defaults instead of failing.

use crate::factors::AggravatingFactors;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Identifier of a risk, control, action plan or interview
///
/// Integer ids are assigned sequentially; string ids come from imported data.
/// Decoding never fails: see [`RiskId::from_value`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum RiskId {
    Int(u64),
    Text(String),
}

impl RiskId {
    /// Read an id from any JSON value
    ///
    /// Non-negative integers (including integral floats such as `2.0`) become
    /// `Int`. Other scalars keep their text so nothing is lost on save.
    /// `null`, blank strings, arrays and objects yield the unassigned id.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Number(n) => match n.as_u64() {
                Some(u) => RiskId::Int(u),
                None => match n.as_f64() {
                    Some(f) if f >= 0.0 && f.fract() == 0.0 && f < u64::MAX as f64 => {
                        RiskId::Int(f as u64)
                    }
                    _ => RiskId::Text(n.to_string()),
                },
            },
            Value::String(s) if !s.trim().is_empty() => RiskId::Text(s.clone()),
            Value::Bool(b) => RiskId::Text(b.to_string()),
            _ => RiskId::default(),
        }
    }

    /// Numeric value, if the id is or parses as an integer
    pub fn as_number(&self) -> Option<u64> {
        match self {
            RiskId::Int(n) => Some(*n),
            RiskId::Text(s) => s.trim().parse().ok(),
        }
    }

    /// The placeholder id carried by records not yet stored
    pub fn is_unassigned(&self) -> bool {
        matches!(self, RiskId::Int(0))
    }

    /// Compare ids the way loosely typed storage does ("3" matches 3)
    pub fn matches(&self, other: &RiskId) -> bool {
        if self == other {
            return true;
        }
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl<'de> Deserialize<'de> for RiskId {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        Ok(RiskId::from_value(&Value::deserialize(d)?))
    }
}

impl Default for RiskId {
    fn default() -> Self {
        RiskId::Int(0)
    }
}

impl From<u64> for RiskId {
    fn from(value: u64) -> Self {
        RiskId::Int(value)
    }
}

impl From<&str> for RiskId {
    fn from(value: &str) -> Self {
        RiskId::Text(value.to_string())
    }
}

impl std::fmt::Display for RiskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskId::Int(n) => write!(f, "{}", n),
            RiskId::Text(s) => f.write_str(s),
        }
    }
}

/// Next sequential id: max numeric id + 1, minimum 1
///
/// When the max is `u64::MAX` the lowest free positive id is used instead.
pub fn next_id<'a>(ids: impl Iterator<Item = &'a RiskId>) -> RiskId {
    let used: BTreeSet<u64> = ids.filter_map(RiskId::as_number).collect();
    let max = used.iter().next_back().copied().unwrap_or(0);
    match max.checked_add(1) {
        Some(next) => RiskId::Int(next.max(1)),
        None => (1..=u64::MAX)
            .find(|n| !used.contains(n))
            .map(RiskId::Int)
            .unwrap_or_default(),
    }
}

/// Records carrying a register id
pub trait Record {
    fn id(&self) -> &RiskId;
    fn id_mut(&mut self) -> &mut RiskId;
}

macro_rules! impl_record {
    ($($ty:ty),*) => {
        $(impl Record for $ty {
            fn id(&self) -> &RiskId {
                &self.id
            }
            fn id_mut(&mut self) -> &mut RiskId {
                &mut self.id
            }
        })*
    };
}

impl_record!(Risk, Control, ActionPlan, Interview);

/// Give every record without a usable id the next sequential one
pub fn assign_missing_ids<T: Record>(items: &mut [T], kind: &str) {
    for index in 0..items.len() {
        if items[index].id().is_unassigned() {
            let id = next_id(items.iter().map(Record::id));
            tracing::warn!("{} at index {} has no usable id, assigned {}", kind, index, id);
            *items[index].id_mut() = id;
        }
    }
}

/// A corruption-risk entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Risk {
    #[serde(default)]
    pub id: RiskId,
    #[serde(default, deserialize_with = "lenient::string")]
    pub process: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub sub_process: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub corruption_type: String,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub tiers: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub countries: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub description: String,
    #[serde(
        default,
        deserialize_with = "lenient::optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub referent: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub status: String,

    /// Gross probability (nominally 1-4)
    #[serde(default, deserialize_with = "lenient::number")]
    pub prob_brut: f64,
    /// Gross impact (nominally 1-4)
    #[serde(default, deserialize_with = "lenient::number")]
    pub impact_brut: f64,
    #[serde(default)]
    pub aggravating_factors: AggravatingFactors,

    // Derived by the normalizer; cached, never authoritative.
    #[serde(
        default,
        deserialize_with = "lenient::optional_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub aggravating_coefficient: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient::optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub mitigation_effectiveness: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::optional_axis",
        skip_serializing_if = "Option::is_none"
    )]
    pub prob_net: Option<u8>,
    #[serde(
        default,
        deserialize_with = "lenient::optional_axis",
        skip_serializing_if = "Option::is_none"
    )]
    pub impact_net: Option<u8>,

    #[serde(default, deserialize_with = "lenient::id_list")]
    pub controls: Vec<RiskId>,
    #[serde(default, deserialize_with = "lenient::id_list")]
    pub action_plans: Vec<RiskId>,

    /// Fields this crate does not interpret, kept for round-tripping
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Risk {
    fn default() -> Self {
        Risk {
            id: RiskId::default(),
            process: String::new(),
            sub_process: String::new(),
            corruption_type: String::new(),
            tiers: Vec::new(),
            countries: Vec::new(),
            description: String::new(),
            referent: None,
            status: String::new(),
            prob_brut: 0.0,
            impact_brut: 0.0,
            aggravating_factors: AggravatingFactors::default(),
            aggravating_coefficient: None,
            mitigation_effectiveness: None,
            prob_net: None,
            impact_net: None,
            controls: Vec::new(),
            action_plans: Vec::new(),
            extra: Map::new(),
        }
    }
}

impl Risk {
    /// Convenience constructor used by hosts and tests
    pub fn new(id: impl Into<RiskId>, prob_brut: f64, impact_brut: f64) -> Self {
        Risk {
            id: id.into(),
            prob_brut,
            impact_brut,
            ..Risk::default()
        }
    }

    /// Decode one record from arbitrary JSON
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }
}

/// A mitigating control
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Control {
    #[serde(default)]
    pub id: RiskId,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(rename = "type", default, deserialize_with = "lenient::string")]
    pub control_type: String,
    #[serde(default, deserialize_with = "lenient::optional_string", skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_string", skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A remediation action plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionPlan {
    #[serde(default)]
    pub id: RiskId,
    #[serde(default, deserialize_with = "lenient::string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub status: String,
    #[serde(default, deserialize_with = "lenient::optional_string", skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_string", skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, deserialize_with = "lenient::id_list")]
    pub risks: Vec<RiskId>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A qualitative interview feeding the risk mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interview {
    #[serde(default)]
    pub id: RiskId,
    #[serde(default, deserialize_with = "lenient::optional_string", skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub interviewee: String,
    #[serde(default, deserialize_with = "lenient::optional_string", skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_string", skip_serializing_if = "Option::is_none")]
    pub process: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub notes: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Deserializers that coalesce malformed values instead of failing
pub(crate) mod lenient {
    use super::RiskId;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Numeric coercion: numbers, numeric strings and booleans; everything else is 0
    pub fn coerce_number(value: &Value) -> Option<f64> {
        let n = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) if s.trim().is_empty() => Some(0.0),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        };
        n.filter(|v| v.is_finite())
    }

    pub fn number<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(coerce_number(&value).unwrap_or(0.0))
    }

    pub fn optional_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(match value {
            Value::Null => None,
            other => coerce_number(&other),
        })
    }

    pub fn optional_axis<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u8>, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(coerce_number(&value)
            .filter(|v| (1.0..=4.0).contains(v))
            .map(|v| v.round() as u8))
    }

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(optional_string(d)?.unwrap_or_default())
    }

    pub fn optional_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(match value {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    pub fn string_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        let value = Value::deserialize(d)?;
        let mut out: Vec<String> = Vec::new();
        let items = match value {
            Value::Array(items) => items,
            Value::String(s) => vec![Value::String(s)],
            _ => Vec::new(),
        };
        for item in items {
            if let Value::String(s) = item {
                let s = s.trim();
                if !s.is_empty() && !out.iter().any(|o| o == s) {
                    out.push(s.to_string());
                }
            }
        }
        Ok(out)
    }

    pub fn id_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<RiskId>, D::Error> {
        let value = Value::deserialize(d)?;
        let items = match value {
            Value::Array(items) => items,
            _ => Vec::new(),
        };
        Ok(items
            .iter()
            .map(RiskId::from_value)
            .filter(|id| !id.is_unassigned())
            .collect())
    }
}

/// Decode a list of records one by one
///
/// Entries that cannot be read are handed back untouched so the caller can
/// write them out again.
pub fn decode_lenient_list<T, F>(values: Vec<Value>, kind: &str, decode: F) -> (Vec<T>, Vec<Value>)
where
    F: Fn(Value) -> serde_json::Result<T>,
{
    let mut out = Vec::with_capacity(values.len());
    let mut unreadable = Vec::new();
    for (index, value) in values.into_iter().enumerate() {
        match decode(value.clone()) {
            Ok(item) => out.push(item),
            Err(e) => {
                tracing::warn!("keeping unreadable {} at index {} as-is: {}", kind, index, e);
                unreadable.push(value);
            }
        }
    }
    (out, unreadable)
}
