//! Codec error types

/// Maximum amount of offending input echoed back in an error message
const SNIPPET_LEN: usize = 48;

/// Errors raised while turning a value into JSON text
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EncodeError {
    #[error("map keys must be strings, found {0}")]
    NonStringKey(&'static str),

    #[error("cannot encode non-finite number {0}")]
    NonFinite(f64),
}

/// Errors raised while reading JSON text back into a value
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("unterminated input, expected `{expected}`")]
    Unterminated { expected: char },

    #[error("malformed {what}: `{text}`")]
    Malformed { what: &'static str, text: String },

    #[error("unsupported escape sequence `\\{0}`")]
    UnsupportedEscape(char),

    #[error("expected {expected}, found `{text}`")]
    ShapeMismatch { expected: &'static str, text: String },

    #[error("expected {expected} value, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("value {value} does not fit in {target}")]
    OutOfRange { value: i64, target: &'static str },

    #[error("invalid argument count `{0}`")]
    ArgumentCount(String),

    #[error("nesting deeper than {limit} levels")]
    TooDeep { limit: usize },

    #[error("declared {declared} arguments but {expected} were expected")]
    ArgumentMismatch { declared: usize, expected: usize },
}

impl DecodeError {
    pub(crate) fn malformed(what: &'static str, text: &str) -> Self {
        DecodeError::Malformed {
            what,
            text: snippet(text),
        }
    }

    pub(crate) fn mismatch(expected: &'static str, text: &str) -> Self {
        DecodeError::ShapeMismatch {
            expected,
            text: snippet(text),
        }
    }
}

fn snippet(text: &str) -> String {
    match text.char_indices().nth(SNIPPET_LEN) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
