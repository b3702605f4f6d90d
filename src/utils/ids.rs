use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// The backend serializes primary keys as numbers in some views and strings in
/// others. Both land in a `String`.
pub fn id_to_string(value: Value) -> Option<String> {
    let raw = match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Null => return None,
        other => other.to_string(),
    };
    let cleaned: String = raw.chars().filter(|c| !c.is_control()).collect();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

pub fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    id_to_string(value).ok_or_else(|| serde::de::Error::custom("empty id"))
}

pub fn deserialize_optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(id_to_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numbers_and_strings() {
        assert_eq!(id_to_string(json!(7)), Some("7".to_string()));
        assert_eq!(id_to_string(json!("t-1")), Some("t-1".to_string()));
        assert_eq!(id_to_string(json!(null)), None);
        assert_eq!(id_to_string(json!("")), None);
    }
}
