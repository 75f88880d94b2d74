use thiserror::Error;
use tokio_modbus::Address;

/// Failure of a single register read or write.
///
/// Connection failures, IO errors, request timeouts and Modbus exception
/// responses all end up here; callers only learn that the register could not
/// be accessed this time.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("register {address}: {message}")]
pub struct TransportError {
    pub address: Address,
    pub message: String,
}

impl TransportError {
    pub fn new(address: Address, message: impl Into<String>) -> Self {
        Self {
            address,
            message: message.into(),
        }
    }
}

/// Invalid catalog or configuration. Fatal at start-up.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("duplicate catalog entry name: {0}")]
    DuplicateName(String),

    #[error("entry {entry} references unknown entry {reference}")]
    UnknownReference { entry: String, reference: String },

    #[error("entry {entry}: calculation {calculation} requires parameter {operand}")]
    MissingOperand {
        entry: String,
        calculation: String,
        operand: &'static str,
    },

    #[error("entry {entry}: unknown calculation type {calculation}")]
    UnknownCalculation { entry: String, calculation: String },

    #[error("entry {0}: enumeration table must be present exactly for status or select entries")]
    Enumeration(String),

    #[error("entry {entry}: invalid parameter {parameter}")]
    InvalidParameter {
        entry: String,
        parameter: &'static str,
    },

    #[error("unknown {what}: {value}")]
    UnknownVariant { what: &'static str, value: String },

    #[error("invalid power map: {0}")]
    PowerMap(&'static str),

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("invalid heating circuit {0}, expected 2..=5")]
    InvalidCircuit(u8),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors surfaced to the host by value writes.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("unknown entry: {0}")]
    UnknownEntry(String),

    #[error("value {value} for {name} outside [{min}, {max}]")]
    OutOfRange {
        name: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("unknown option {option} for {name}")]
    UnknownOption { name: String, option: String },

    #[error("value type does not match entry {0}")]
    TypeMismatch(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_display() {
        let err = TransportError::new(30001, "connection refused");
        assert_eq!(err.to_string(), "register 30001: connection refused");
    }

    #[test]
    fn out_of_range_display() {
        let err = Error::OutOfRange {
            name: "hot_water_normal".to_string(),
            value: 70.0,
            min: 30.0,
            max: 60.0,
        };
        assert_eq!(
            err.to_string(),
            "value 70 for hot_water_normal outside [30, 60]"
        );
    }

    #[test]
    fn transport_error_converts_into_error() {
        let err: Error = TransportError::new(40001, "timeout").into();
        assert!(matches!(err, Error::Transport(_)));
    }
}
