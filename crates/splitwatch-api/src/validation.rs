//! ---
//! sw_section: "05-networking-external-interfaces"
//! sw_subsection: "module"
//! sw_type: "source"
//! sw_scope: "code"
//! sw_description: "Networking API surface for external integrations."
//! sw_version: "v0.0.0-prealpha"
//! sw_owner: "tbd"
//! ---
//! Field-by-field decoding of request bodies and parameters so a bad request
//! reports every offending field at once.

use serde_json::{Map, Value};
use splitwatch_store::{NewTimingRecord, ValidationErrors};

/// Decode a create body. Collects one or more messages per field.
pub fn parse_new_record(body: &Value) -> Result<NewTimingRecord, ValidationErrors> {
    let Some(fields) = body.as_object() else {
        return Err(ValidationErrors::single(
            "body",
            format!("Expected object, received {}", json_type(body)),
        ));
    };

    let mut errors = ValidationErrors::default();
    let duration = match fields.get("duration") {
        None | Some(Value::Null) => {
            errors.push("duration", "Required");
            None
        }
        Some(value) => integer_field(value, "duration", &mut errors),
    };
    let user_id = optional_integer(fields, "userId", &mut errors);
    let title = optional_string(fields, "title", &mut errors);

    match duration {
        Some(duration) if errors.is_empty() => {
            let mut input = NewTimingRecord::new(duration);
            input.user_id = user_id;
            input.title = title;
            let range = input.validation_errors();
            if range.is_empty() {
                Ok(input)
            } else {
                Err(range)
            }
        }
        _ => Err(errors),
    }
}

/// Parse a path id; `None` for anything but a base-10 integer.
pub(crate) fn parse_id(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}

/// Parse the `userId` list filter. Absent or empty means no filter; zero is
/// a valid filter.
pub(crate) fn parse_user_filter(raw: Option<&str>) -> Result<Option<i64>, ()> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(|_| ()),
    }
}

fn integer_field(value: &Value, field: &str, errors: &mut ValidationErrors) -> Option<i64> {
    match value {
        Value::Number(number) => match number.as_i64() {
            Some(int) => Some(int),
            None if number.is_u64() => {
                // Larger than i64::MAX: clamp so the range check reports it.
                Some(i64::MAX)
            }
            None => {
                errors.push(field, "Expected integer, received float");
                None
            }
        },
        other => {
            errors.push(
                field,
                format!("Expected number, received {}", json_type(other)),
            );
            None
        }
    }
}

fn optional_integer(
    fields: &Map<String, Value>,
    field: &str,
    errors: &mut ValidationErrors,
) -> Option<i64> {
    match fields.get(field) {
        None | Some(Value::Null) => None,
        Some(value) => integer_field(value, field, errors),
    }
}

fn optional_string(
    fields: &Map<String, Value>,
    field: &str,
    errors: &mut ValidationErrors,
) -> Option<String> {
    match fields.get(field) {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text.clone()),
        Some(other) => {
            errors.push(
                field,
                format!("Expected string, received {}", json_type(other)),
            );
            None
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
