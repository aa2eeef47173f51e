use serde_json::Value;

use crate::error::SchemaError;

/// Payload validation capability.
///
/// Used on both sides: before sending, and after a request is verified.
pub trait PayloadSchema: Send + Sync {
    fn validate(&self, payload: &Value) -> Result<(), SchemaError>;
}

impl<F> PayloadSchema for F
where
    F: Fn(&Value) -> Result<(), SchemaError> + Send + Sync,
{
    fn validate(&self, payload: &Value) -> Result<(), SchemaError> {
        self(payload)
    }
}

/// JSON Schema validator, compiled once.
pub struct JsonSchema {
    validator: jsonschema::Validator,
}

impl JsonSchema {
    /// Compile a schema document.
    pub fn compile(schema: &Value) -> Result<Self, SchemaError> {
        let validator = jsonschema::validator_for(schema)
            .map_err(|err| SchemaError::single(format!("invalid schema: {err}")))?;
        Ok(Self { validator })
    }
}

impl std::fmt::Debug for JsonSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonSchema").finish_non_exhaustive()
    }
}

impl PayloadSchema for JsonSchema {
    fn validate(&self, payload: &Value) -> Result<(), SchemaError> {
        let errors: Vec<String> = self
            .validator
            .iter_errors(payload)
            .map(|err| err.to_string())
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::new(errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn email_schema() -> JsonSchema {
        JsonSchema::compile(&json!({
            "type": "object",
            "properties": { "name": { "type": "string" } },
            "required": ["name"]
        }))
        .unwrap()
    }

    #[test]
    fn accepts_matching_payload() {
        assert!(email_schema().validate(&json!({"name": "sarim"})).is_ok());
    }

    #[test]
    fn reports_every_violation() {
        let err = email_schema().validate(&json!({"name": 7})).unwrap_err();
        assert_eq!(err.errors.len(), 1);

        let err = email_schema().validate(&Value::Null).unwrap_err();
        assert!(!err.errors.is_empty());
    }

    #[test]
    fn closures_are_schemas() {
        let non_empty = |value: &Value| {
            if value.as_object().is_some_and(|o| !o.is_empty()) {
                Ok(())
            } else {
                Err(SchemaError::single("payload must be a non-empty object"))
            }
        };
        assert!(non_empty.validate(&json!({"a": 1})).is_ok());
        assert!(non_empty.validate(&json!({})).is_err());
    }
}
