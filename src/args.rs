//! Invocation-argument coercion.
//!
//! Commands receive loosely typed JSON arguments from the host. Every
//! validator here fails fast with a message naming the argument and the raw
//! value, before any network call is made.

use crate::dates;
use crate::error::{ConnectorError, ConnectorResult};
use crate::normalize::to_upstream_key;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Sort fields accepted from the user, in output casing.
const SORT_FIELDS: [&str; 2] = ["CreatedAt", "UpdatedAt"];

/// Command arguments as handed over by the host.
#[derive(Debug, Clone, Default)]
pub struct Args(Map<String, Value>);

impl Args {
    pub fn new(args: Map<String, Value>) -> Self {
        Self(args)
    }

    fn raw(&self, name: &str) -> Option<&Value> {
        self.0.get(name).filter(|v| !v.is_null())
    }

    pub fn string(&self, name: &str) -> Option<String> {
        self.raw(name).and_then(Value::as_str).map(str::to_string)
    }

    pub fn required_string(&self, name: &str) -> ConnectorResult<String> {
        self.string(name)
            .ok_or_else(|| ConnectorError::Config(format!("Missing required argument: \"{name}\"")))
    }

    /// Accepts JSON booleans and the usual string spellings. Anything else
    /// is an error rather than a silent false.
    pub fn boolean(&self, name: &str) -> ConnectorResult<Option<bool>> {
        let Some(raw) = self.raw(name) else {
            return Ok(None);
        };
        let parsed = match raw {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" | "yes" => Some(true),
                "false" | "no" => Some(false),
                _ => None,
            },
            _ => None,
        };
        match parsed {
            Some(b) => Ok(Some(b)),
            None => Err(ConnectorError::Config(format!(
                "Invalid boolean: \"{name}\"={raw}"
            ))),
        }
    }

    pub fn integer(&self, name: &str) -> ConnectorResult<Option<i64>> {
        let Some(raw) = self.raw(name) else {
            return Ok(None);
        };
        let parsed = match raw {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        match parsed {
            Some(n) => Ok(Some(n)),
            None => Err(ConnectorError::Config(format!(
                "Invalid number: \"{name}\"={raw}"
            ))),
        }
    }

    pub fn datetime(&self, name: &str, now: DateTime<Utc>) -> ConnectorResult<Option<DateTime<Utc>>> {
        let Some(raw) = self.raw(name) else {
            return Ok(None);
        };
        let Some(expr) = raw.as_str() else {
            return Err(ConnectorError::Config(format!(
                "Invalid date: \"{name}\"={raw}"
            )));
        };
        dates::parse_time_arg(name, expr, now).map(Some)
    }

    /// Maps a user-facing sort field (`CreatedAt`, `-UpdatedAt`) onto the
    /// upstream sort expression (`createdAt_ASC`, `updatedAt_DESC`).
    pub fn sort(&self, name: &str) -> ConnectorResult<Option<String>> {
        let Some(raw) = self.raw(name) else {
            return Ok(None);
        };
        let invalid =
            || ConnectorError::Config(format!("Invalid sorting parameter: \"{name}\"={raw}"));

        let value = raw.as_str().ok_or_else(invalid)?;
        let (field, direction) = match value.strip_prefix('-') {
            Some(rest) => (rest, "DESC"),
            None => (value, "ASC"),
        };
        if !SORT_FIELDS.contains(&field) {
            return Err(invalid());
        }
        let upstream = to_upstream_key(field).map_err(|_| invalid())?;
        Ok(Some(format!("{upstream}_{direction}")))
    }
}

impl From<Value> for Args {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn args(value: Value) -> Args {
        Args::from(value)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn boolean_accepts_common_spellings() {
        for (raw, expected) in [
            (serde_json::json!(true), true),
            (serde_json::json!("true"), true),
            (serde_json::json!("Yes"), true),
            (serde_json::json!(false), false),
            (serde_json::json!("False"), false),
            (serde_json::json!("no"), false),
        ] {
            let parsed = args(serde_json::json!({"b": raw})).boolean("b").unwrap();
            assert_eq!(parsed, Some(expected), "raw {raw}");
        }
    }

    #[test]
    fn boolean_rejects_numeric_spellings() {
        for raw in [serde_json::json!(1), serde_json::json!("1"), serde_json::json!("0")] {
            let err = args(serde_json::json!({"b": raw})).boolean("b").unwrap_err();
            assert!(err.to_string().contains("\"b\""), "raw {raw}");
        }
    }

    #[test]
    fn absent_optional_arguments_are_none() {
        let empty = args(serde_json::json!({}));
        assert_eq!(empty.boolean("b").unwrap(), None);
        assert_eq!(empty.integer("n").unwrap(), None);
        assert_eq!(empty.datetime("d", now()).unwrap(), None);
        assert_eq!(empty.sort("s").unwrap(), None);
        assert_eq!(empty.string("x"), None);
    }

    #[test]
    fn null_counts_as_absent() {
        let nulls = args(serde_json::json!({"b": null}));
        assert_eq!(nulls.boolean("b").unwrap(), None);
    }

    #[test]
    fn integer_accepts_numbers_and_numeric_strings() {
        assert_eq!(
            args(serde_json::json!({"n": 1234})).integer("n").unwrap(),
            Some(1234)
        );
        assert_eq!(
            args(serde_json::json!({"n": "1234"})).integer("n").unwrap(),
            Some(1234)
        );
        assert!(args(serde_json::json!({"n": "invalid"})).integer("n").is_err());
    }

    #[test]
    fn datetime_delegates_to_permissive_parser() {
        let parsed = args(serde_json::json!({"d": "2 weeks"}))
            .datetime("d", now())
            .unwrap()
            .unwrap();
        assert_eq!(parsed, now() - chrono::Duration::weeks(2));

        let err = args(serde_json::json!({"d": "invalid"}))
            .datetime("d", now())
            .unwrap_err();
        assert!(err.to_string().contains("\"d\""));
    }

    #[test]
    fn sort_maps_fields_and_direction() {
        assert_eq!(
            args(serde_json::json!({"s": "CreatedAt"})).sort("s").unwrap(),
            Some("createdAt_ASC".to_string())
        );
        assert_eq!(
            args(serde_json::json!({"s": "-UpdatedAt"})).sort("s").unwrap(),
            Some("updatedAt_DESC".to_string())
        );
    }

    #[test]
    fn sort_rejects_unknown_fields() {
        for raw in ["InvalidField", "CreatedAt-", "-", ""] {
            assert!(
                args(serde_json::json!({"s": raw})).sort("s").is_err(),
                "raw {raw:?}"
            );
        }
    }

    #[test]
    fn required_string_errors_when_absent() {
        let err = args(serde_json::json!({})).required_string("incident_id").unwrap_err();
        assert!(err.to_string().contains("incident_id"));
    }
}
