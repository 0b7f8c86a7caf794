/// mjs error types
///
/// Script-observable errors carry only a kind and a message; the kind maps
/// 1:1 onto the error classes the language exposes (TypeError,
/// ReferenceError, SyntaxError, RangeError, Error). `Thrown` carries a
/// script-thrown value by its raw bits so `try`/`catch` can rebind the
/// original value instead of a reconstruction.
use crate::value::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum JsError {
    #[error("TypeError: {0}")]
    Type(String),
    #[error("ReferenceError: {0}")]
    Reference(String),
    #[error("SyntaxError: {0}")]
    Syntax(String),
    #[error("RangeError: {0}")]
    Range(String),
    #[error("Error: {0}")]
    Generic(String),
    #[error("Error: out of memory")]
    OutOfMemory,
    /// A value thrown by script. Callers unwinding across an allocation
    /// point must re-root the payload before allocating.
    #[error("uncaught exception")]
    Thrown(Value),
}

impl JsError {
    /// The intrinsic error-class name this error materializes as when it
    /// crosses back into script via `catch`.
    pub fn class_name(&self) -> &'static str {
        match self {
            JsError::Type(_) => "TypeError",
            JsError::Reference(_) => "ReferenceError",
            JsError::Syntax(_) => "SyntaxError",
            JsError::Range(_) => "RangeError",
            JsError::Generic(_) | JsError::OutOfMemory => "Error",
            JsError::Thrown(_) => "Error",
        }
    }

    pub fn message(&self) -> String {
        match self {
            JsError::Type(m)
            | JsError::Reference(m)
            | JsError::Syntax(m)
            | JsError::Range(m)
            | JsError::Generic(m) => m.clone(),
            JsError::OutOfMemory => "out of memory".into(),
            JsError::Thrown(_) => "uncaught exception".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_class_prefix() {
        let e = JsError::Type("ouch".into());
        assert_eq!(e.to_string(), "TypeError: ouch");
        assert_eq!(JsError::OutOfMemory.to_string(), "Error: out of memory");
    }

    #[test]
    fn class_names_match_intrinsics() {
        assert_eq!(JsError::Range("r".into()).class_name(), "RangeError");
        assert_eq!(JsError::Syntax("s".into()).class_name(), "SyntaxError");
    }
}
