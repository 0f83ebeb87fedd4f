use anyhow::{anyhow, Result};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

/// A single cell as produced by the decoders.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn text(s: impl Into<String>) -> Self {
        CellValue::Text(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Convert a JSON scalar into a cell. Nested arrays/objects keep their JSON text.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => CellValue::Null,
            Value::Bool(b) => CellValue::Bool(*b),
            Value::Number(n) => n
                .as_f64()
                .map(CellValue::Number)
                .unwrap_or_else(|| CellValue::Text(n.to_string())),
            Value::String(s) => CellValue::Text(s.clone()),
            other => CellValue::Text(other.to_string()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            CellValue::Null => serializer.serialize_unit(),
            CellValue::Bool(b) => serializer.serialize_bool(*b),
            // whole numbers keep their integer form
            CellValue::Number(n) if n.fract() == 0.0 && *n >= i64::MIN as f64 && *n < i64::MAX as f64 => {
                serializer.serialize_i64(*n as i64)
            }
            CellValue::Number(n) => serializer.serialize_f64(*n),
            CellValue::Text(s) => serializer.serialize_str(s),
        }
    }
}

/// An open-ended record: column name -> cell, in insertion order.
///
/// Lookups are linear; rows are narrow and only the two axis columns are
/// read on the hot path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    fields: Vec<(String, CellValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Builder form of [`Row::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<CellValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set a field, replacing an existing value in place (order is kept).
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<CellValue>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    /// `None` when the row has no such key at all.
    pub fn get(&self, key: &str) -> Option<&CellValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<CellValue>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (k, v) in iter {
            row.insert(k, v);
        }
        row
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// A decoded table: ordered rows plus the declared header list.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Row>) -> Self {
        Self { headers, rows }
    }

    /// Create a Table from a JSON array of objects, or a single object.
    pub fn from_json(value: &Value) -> Result<Self> {
        let items: Vec<&Value> = match value {
            Value::Array(array) => array.iter().collect(),
            Value::Object(_) => vec![value],
            _ => return Err(anyhow!("Input data must be a JSON object or an array of objects")),
        };

        let Some(first) = items.first() else {
            return Ok(Self::default());
        };

        // Extract headers from the first object
        let first_obj = first
            .as_object()
            .ok_or_else(|| anyhow!("Items in array must be objects"))?;
        let headers: Vec<String> = first_obj.keys().cloned().collect();

        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            let obj = item
                .as_object()
                .ok_or_else(|| anyhow!("Items in array must be objects"))?;
            rows.push(obj.iter().map(|(k, v)| (k.clone(), CellValue::from_json(v))).collect());
        }

        Ok(Self { headers, rows })
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() || self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_row_insert_keeps_order() {
        let mut row = Row::new().with("b", 1.0).with("a", "x");
        row.insert("b", 2.0);
        assert_eq!(row.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(row.get("b"), Some(&CellValue::Number(2.0)));
        assert_eq!(row.get("missing"), None);
    }

    #[test]
    fn test_from_json_array() {
        let value = json!([
            {"city": "A", "sales": 10, "flag": true},
            {"city": "B", "sales": null, "extra": [1, 2]}
        ]);
        let table = Table::from_json(&value).unwrap();
        assert_eq!(table.headers, vec!["city", "sales", "flag"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].get("sales"), Some(&CellValue::Number(10.0)));
        assert_eq!(table.rows[1].get("sales"), Some(&CellValue::Null));
        assert_eq!(table.rows[1].get("extra"), Some(&CellValue::text("[1,2]")));
    }

    #[test]
    fn test_from_json_single_object() {
        let table = Table::from_json(&json!({"x": "a", "y": 1})).unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.headers, vec!["x", "y"]);
    }

    #[test]
    fn test_from_json_rejects_scalars() {
        assert!(Table::from_json(&json!(42)).is_err());
        assert!(Table::from_json(&json!([1, 2])).is_err());
    }

    #[test]
    fn test_row_serializes_in_order() {
        let row = Row::new().with("z", 1.0).with("a", CellValue::Null);
        assert_eq!(serde_json::to_string(&row).unwrap(), r#"{"z":1,"a":null}"#);
    }

    #[test]
    fn test_numbers_serialize_verbatim() {
        let table = Table::from_json(&json!([{"id": 7, "qty": -3, "price": 2.5}])).unwrap();
        let text = serde_json::to_string(&table.rows[0]).unwrap();
        assert_eq!(text, r#"{"id":7,"qty":-3,"price":2.5}"#);
        assert_eq!(serde_json::to_string(&CellValue::Number(1e300)).unwrap(), "1e300");
        assert_eq!(serde_json::to_string(&CellValue::Number(f64::NAN)).unwrap(), "null");
    }
}
