//! Schema validation for TOML configuration tables.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
	#[error("Missing required field: {0}")]
	MissingField(String),
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: String,
		actual: String,
	},
}

#[derive(Debug)]
pub enum FieldType {
	String,
	Integer { min: Option<i64>, max: Option<i64> },
	Boolean,
}

pub type FieldValidator = Box<dyn Fn(&toml::Value) -> Result<(), String> + Send + Sync>;

pub struct Field {
	pub name: String,
	pub field_type: FieldType,
	pub validator: Option<FieldValidator>,
}

impl std::fmt::Debug for Field {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Field")
			.field("name", &self.name)
			.field("field_type", &self.field_type)
			.field("validator", &self.validator.is_some())
			.finish()
	}
}

impl Field {
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
			validator: None,
		}
	}

	pub fn with_validator<F>(mut self, validator: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self.validator = Some(Box::new(validator));
		self
	}

	fn check(&self, value: &toml::Value) -> Result<(), ValidationError> {
		check_type(&self.name, value, &self.field_type)?;
		if let Some(validator) = &self.validator {
			validator(value).map_err(|message| ValidationError::InvalidValue {
				field: self.name.clone(),
				message,
			})?;
		}
		Ok(())
	}
}

/// Required and optional fields of a configuration table.
#[derive(Debug)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
}

impl Schema {
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	pub fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let table = config
			.as_table()
			.ok_or_else(|| mismatch("root", "table", config))?;

		for field in &self.required {
			let value = table
				.get(&field.name)
				.ok_or_else(|| ValidationError::MissingField(field.name.clone()))?;
			field.check(value)?;
		}

		for field in &self.optional {
			if let Some(value) = table.get(&field.name) {
				field.check(value)?;
			}
		}

		Ok(())
	}
}

fn mismatch(field: &str, expected: &str, actual: &toml::Value) -> ValidationError {
	ValidationError::TypeMismatch {
		field: field.to_string(),
		expected: expected.to_string(),
		actual: actual.type_str().to_string(),
	}
}

fn check_type(
	name: &str,
	value: &toml::Value,
	expected: &FieldType,
) -> Result<(), ValidationError> {
	match expected {
		FieldType::String if !value.is_str() => Err(mismatch(name, "string", value)),
		FieldType::Boolean if !value.is_bool() => Err(mismatch(name, "boolean", value)),
		FieldType::Integer { min, max } => {
			let n = value
				.as_integer()
				.ok_or_else(|| mismatch(name, "integer", value))?;
			if let Some(min) = min.filter(|min| n < *min) {
				return Err(ValidationError::InvalidValue {
					field: name.to_string(),
					message: format!("Value {} is less than minimum {}", n, min),
				});
			}
			if let Some(max) = max.filter(|max| n > *max) {
				return Err(ValidationError::InvalidValue {
					field: name.to_string(),
					message: format!("Value {} is greater than maximum {}", n, max),
				});
			}
			Ok(())
		}
		_ => Ok(()),
	}
}

/// Implemented by every pluggable backend to validate its own config table.
pub trait ConfigSchema: Send + Sync {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	fn parse(s: &str) -> toml::Value {
		toml::Value::Table(toml::from_str(s).unwrap())
	}

	fn schema() -> Schema {
		Schema::new(
			vec![Field::new("path", FieldType::String)],
			vec![Field::new(
				"ttl_secs",
				FieldType::Integer {
					min: Some(1),
					max: None,
				},
			)
			.with_validator(|v| match v.as_integer() {
				Some(7) => Err("seven is reserved".to_string()),
				_ => Ok(()),
			})],
		)
	}

	#[test]
	fn test_missing_required_field() {
		let config = parse("ttl_secs = 5");
		assert!(matches!(
			schema().validate(&config),
			Err(ValidationError::MissingField(f)) if f == "path"
		));
	}

	#[test]
	fn test_integer_bounds_and_validator() {
		let low = parse("path = \"x\"\nttl_secs = 0");
		assert!(matches!(
			schema().validate(&low),
			Err(ValidationError::InvalidValue { .. })
		));

		let reserved = parse("path = \"x\"\nttl_secs = 7");
		assert!(schema().validate(&reserved).is_err());

		let ok = parse("path = \"x\"\nttl_secs = 60");
		assert!(schema().validate(&ok).is_ok());
	}

	#[test]
	fn test_type_mismatch() {
		let config = parse("path = 3");
		assert!(matches!(
			schema().validate(&config),
			Err(ValidationError::TypeMismatch { .. })
		));
	}
}
