//! Alert records as pushed by the backend and as submitted by the create form.

use crate::error::ElementError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

/// Backend alert identifier.
///
/// The wire carries either a string or an integer. Both are keyed by their
/// text form, so `1` and `"1"` name the same alert.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertId(String);

impl AlertId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self(s.clone())),
            Value::Number(n) => Some(Self(n.to_string())),
            _ => None,
        }
    }

    fn numeric(&self) -> Option<i128> {
        self.0.parse::<i128>().ok()
    }
}

// Numeric ids sort by value and come first, everything else sorts by text.
impl Ord for AlertId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.numeric(), other.numeric()) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for AlertId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AlertId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }

    pub fn toggle(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Indicator {
    Macd,
    Rsi,
    Other(String),
}

impl Indicator {
    pub fn as_str(&self) -> &str {
        match self {
            Indicator::Macd => "MACD",
            Indicator::Rsi => "RSI",
            Indicator::Other(name) => name,
        }
    }

    /// Cycles the indicators offered by the create form.
    pub fn next(&self) -> Self {
        match self {
            Indicator::Macd => Indicator::Rsi,
            _ => Indicator::Macd,
        }
    }
}

impl From<String> for Indicator {
    fn from(name: String) -> Self {
        match name.as_str() {
            "MACD" => Indicator::Macd,
            "RSI" => Indicator::Rsi,
            _ => Indicator::Other(name),
        }
    }
}

impl From<Indicator> for String {
    fn from(indicator: Indicator) -> Self {
        indicator.as_str().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Pending,
    Completed,
    #[serde(other)]
    Unknown,
}

impl AlertStatus {
    pub fn label(&self) -> &'static str {
        match self {
            AlertStatus::Pending => "Pending",
            AlertStatus::Completed => "Completed",
            AlertStatus::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertRecord {
    pub id: AlertId,
    pub value: Option<f64>,
    pub direction: Option<Direction>,
    pub indicator: Option<Indicator>,
    pub status: AlertStatus,
}

impl AlertRecord {
    /// Reads one element of a snapshot frame.
    ///
    /// Only a missing or unusable `id` rejects the element. Every other field
    /// falls back (`status` to `Unknown`, the rest to `None`) and unknown keys
    /// are ignored.
    pub fn from_element(index: usize, element: &Value) -> Result<Self, ElementError> {
        let obj = element
            .as_object()
            .ok_or(ElementError::NotAnObject { index })?;

        let id = match obj.get("id") {
            None | Some(Value::Null) => return Err(ElementError::MissingId { index }),
            Some(raw) => AlertId::from_json(raw).ok_or(ElementError::InvalidId { index })?,
        };

        Ok(Self {
            id,
            value: obj.get("value").and_then(Value::as_f64),
            direction: field(obj.get("direction")),
            indicator: obj
                .get("indicator")
                .and_then(Value::as_str)
                .map(|s| Indicator::from(s.to_string())),
            status: field(obj.get("status")).unwrap_or(AlertStatus::Unknown),
        })
    }
}

fn field<T: serde::de::DeserializeOwned>(value: Option<&Value>) -> Option<T> {
    value.and_then(|v| T::deserialize(v).ok())
}

/// Body of `POST {SERVER_URL}/alert`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewAlert {
    pub value: f64,
    pub direction: Direction,
    pub indicator: Indicator,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_full_element() {
        let element = json!({
            "id": "7",
            "value": 42.5,
            "direction": "down",
            "indicator": "RSI",
            "status": "pending",
            "extra": true
        });

        let record = AlertRecord::from_element(0, &element).unwrap();
        assert_eq!(record.id, AlertId::new("7"));
        assert_eq!(record.value, Some(42.5));
        assert_eq!(record.direction, Some(Direction::Down));
        assert_eq!(record.indicator, Some(Indicator::Rsi));
        assert_eq!(record.status, AlertStatus::Pending);
    }

    #[test]
    fn integer_and_string_ids_share_a_key() {
        let a = AlertRecord::from_element(0, &json!({"id": 12})).unwrap();
        let b = AlertRecord::from_element(1, &json!({"id": "12"})).unwrap();
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn unrecognized_or_missing_status_is_unknown() {
        let odd = AlertRecord::from_element(0, &json!({"id": 1, "status": "archived"})).unwrap();
        let wrong_type = AlertRecord::from_element(0, &json!({"id": 1, "status": 3})).unwrap();
        let missing = AlertRecord::from_element(0, &json!({"id": 1})).unwrap();
        assert_eq!(odd.status, AlertStatus::Unknown);
        assert_eq!(wrong_type.status, AlertStatus::Unknown);
        assert_eq!(missing.status, AlertStatus::Unknown);
    }

    #[test]
    fn rejects_elements_without_usable_id() {
        assert_eq!(
            AlertRecord::from_element(3, &json!({"status": "pending"})),
            Err(ElementError::MissingId { index: 3 })
        );
        assert_eq!(
            AlertRecord::from_element(0, &json!({"id": null})),
            Err(ElementError::MissingId { index: 0 })
        );
        assert_eq!(
            AlertRecord::from_element(1, &json!({"id": [1]})),
            Err(ElementError::InvalidId { index: 1 })
        );
        assert_eq!(
            AlertRecord::from_element(2, &json!("nope")),
            Err(ElementError::NotAnObject { index: 2 })
        );
    }

    #[test]
    fn unknown_indicator_is_kept_by_name() {
        let record =
            AlertRecord::from_element(0, &json!({"id": "a", "indicator": "BB"})).unwrap();
        assert_eq!(record.indicator, Some(Indicator::Other("BB".into())));
        assert_eq!(record.indicator.unwrap().as_str(), "BB");
    }

    #[test]
    fn ids_sort_numerically_before_text() {
        let mut ids: Vec<AlertId> = ["b", "10", "9", "a", "100"]
            .into_iter()
            .map(AlertId::from)
            .collect();
        ids.sort();
        let sorted: Vec<&str> = ids.iter().map(AlertId::as_str).collect();
        assert_eq!(sorted, vec!["9", "10", "100", "a", "b"]);
    }

    #[test]
    fn new_alert_serializes_wire_names() {
        let body = NewAlert {
            value: 1.5,
            direction: Direction::Up,
            indicator: Indicator::Macd,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"value": 1.5, "direction": "up", "indicator": "MACD"})
        );
    }
}
