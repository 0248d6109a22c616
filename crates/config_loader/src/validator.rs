//! Configuration validation
//!
//! Rules:
//! - field ranges declared on the contracts (`pool_width >= 1`, `queue_capacity >= 1`, ...)
//! - drain_timeout_ms > 0

use contracts::{ContractError, ServiceConfig};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// Validate a ServiceConfig
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &ServiceConfig) -> Result<(), ContractError> {
    validate_field_ranges(config)?;
    validate_drain_timeout(config)?;
    Ok(())
}

/// Check the ranges declared with `#[validate(...)]`
fn validate_field_ranges(config: &ServiceConfig) -> Result<(), ContractError> {
    config
        .validate()
        .map_err(|errors| first_validation_error("", &errors))
}

/// Flatten nested validator errors into a single dotted field path
fn first_validation_error(prefix: &str, errors: &ValidationErrors) -> ContractError {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                let message = field_errors
                    .first()
                    .and_then(|e| e.message.as_ref())
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "invalid value".to_string());
                return ContractError::config_validation(path, message);
            }
            ValidationErrorsKind::Struct(nested) => return first_validation_error(&path, nested),
            ValidationErrorsKind::List(items) => {
                if let Some((idx, nested)) = items.iter().next() {
                    return first_validation_error(&format!("{path}[{idx}]"), nested);
                }
            }
        }
    }
    ContractError::config_validation(prefix, errors.to_string())
}

/// A zero drain timeout would cancel workers before they can drain anything
fn validate_drain_timeout(config: &ServiceConfig) -> Result<(), ContractError> {
    if config.dispatcher.drain_timeout_ms == 0 {
        return Err(ContractError::config_validation(
            "dispatcher.drain_timeout_ms",
            "drain_timeout_ms must be > 0",
        ));
    }
    Ok(())
}
