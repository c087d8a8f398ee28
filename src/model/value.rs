use compact_str::CompactString;
use im::OrdMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

/// Ordered field name → value mapping. Persistent so repair can copy a
/// base payload without deep-cloning it.
pub type FieldMap = OrdMap<CompactString, Value>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Text(CompactString),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Uuid(Uuid),
    Location(Location),
    List(Vec<Value>),
    Map(FieldMap),
}

impl Value {
    fn kind_rank(&self) -> u8 {
        match self {
            Value::Boolean(_) => 0,
            Value::Integer(_) => 1,
            Value::Float(_) => 2,
            Value::Text(_) => 3,
            Value::Uuid(_) => 4,
            Value::Location(_) => 5,
            Value::List(_) => 6,
            Value::Map(_) => 7,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Text(_) => "text",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Boolean(_) => "boolean",
            Value::Uuid(_) => "uuid",
            Value::Location(_) => "location",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Structural check applied before a value is persisted or replayed.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Value::Float(f) if !f.is_finite() => Err(format!("non-finite float {f}")),
            Value::Location(loc) if !loc.is_valid() => Err(format!(
                "location ({}, {}) out of range",
                loc.latitude, loc.longitude
            )),
            Value::List(items) => items.iter().try_for_each(Value::validate),
            Value::Map(fields) => validate_fields(fields),
            _ => Ok(()),
        }
    }
}

pub fn validate_fields(fields: &FieldMap) -> Result<(), String> {
    for (name, value) in fields {
        if name.is_empty() {
            return Err("field names must not be empty".into());
        }
        value
            .validate()
            .map_err(|e| format!("field '{name}': {e}"))?;
    }
    Ok(())
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        let rank_cmp = self.kind_rank().cmp(&other.kind_rank());
        if rank_cmp != Ordering::Equal {
            return rank_cmp;
        }

        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Uuid(a), Value::Uuid(b)) => a.cmp(b),
            (Value::Location(a), Value::Location(b)) => a
                .latitude
                .total_cmp(&b.latitude)
                .then_with(|| a.longitude.total_cmp(&b.longitude)),
            (Value::List(a), Value::List(b)) => a.cmp(b),
            (Value::Map(a), Value::Map(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value.into())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self {
        Value::Uuid(value)
    }
}

impl From<Location> for Value {
    fn from(value: Location) -> Self {
        Value::Location(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{FieldMap, Location, Value, validate_fields};
    use proptest::prelude::*;

    fn arb_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            any::<bool>().prop_map(Value::Boolean),
            any::<i64>().prop_map(Value::Integer),
            any::<f64>()
                .prop_filter("finite float only", |v| v.is_finite())
                .prop_map(Value::Float),
            "\\PC{0,32}".prop_map(|s| Value::Text(s.into())),
            (-90.0f64..=90.0, -180.0f64..=180.0)
                .prop_map(|(lat, lon)| Value::Location(Location::new(lat, lon))),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::List),
                prop::collection::btree_map("[a-z]{1,6}", inner, 0..4).prop_map(|m| {
                    Value::Map(m.into_iter().map(|(k, v)| (compact_str::CompactString::from(k), v)).collect())
                }),
            ]
        })
    }

    fn encode<T: serde::Serialize>(value: &T) -> Vec<u8> {
        rmp_serde::to_vec(value).expect("encode should succeed")
    }

    fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> T {
        rmp_serde::from_slice(bytes).expect("decode should succeed")
    }

    proptest! {
        #[test]
        fn ordering_survives_encoding(a in arb_value(), b in arb_value()) {
            let orig = a.cmp(&b);
            let a2: Value = decode(&encode(&a));
            let b2: Value = decode(&encode(&b));
            prop_assert_eq!(orig, a2.cmp(&b2));
        }
    }

    #[test]
    fn nested_invalid_values_are_reported_with_field_path() {
        let mut inner = FieldMap::new();
        inner.insert("where".into(), Value::Location(Location::new(120.0, 0.0)));
        let mut fields = FieldMap::new();
        fields.insert("home".into(), Value::Map(inner));
        let err = validate_fields(&fields).expect_err("out of range");
        assert!(err.contains("field 'home'"), "{err}");
        assert!(err.contains("field 'where'"), "{err}");
    }

    #[test]
    fn nan_is_rejected() {
        assert!(Value::Float(f64::NAN).validate().is_err());
        assert!(Value::List(vec![Value::Float(1.5)]).validate().is_ok());
    }
}
