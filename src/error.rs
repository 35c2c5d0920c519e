use thiserror::Error;

/// Generator-side failure. Distinct from the *generated* code's own
/// marshal/demarshal failure paths (OOM, type mismatch), which are emitted as
/// text, never executed here.
#[derive(Debug, Error)]
pub enum GenError {
    #[error("error parsing introspection XML: {0}")]
    Xml(#[from] xml::reader::Error),

    #[error("{message} (line {line}, column {column})")]
    Annotation {
        message: String,
        line: u64,
        column: u64,
    },

    #[error("invalid symbol name: {0:?}")]
    InvalidSymbol(String),

    #[error("invalid object path: {0:?}")]
    InvalidObjectPath(String),

    #[error("unknown character in D-Bus signature: {0:?}")]
    UnknownSignatureChar(char),

    #[error("unexpected end of D-Bus signature")]
    UnterminatedSignature,

    #[error("unbalanced container in D-Bus signature")]
    UnbalancedSignature,

    #[error("{0}")]
    Structure(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[cfg(feature = "dbus")]
    #[error(transparent)]
    Dbus(#[from] dbus::Error),
}

pub type Result<T> = std::result::Result<T, GenError>;
