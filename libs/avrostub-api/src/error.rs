use std::fmt;

// ═══════════════════════════════════════════════════════════════
//  CodecError: boundary encoder errors
// ═══════════════════════════════════════════════════════════════

/// Stage of the codec that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecErrorKind {
    /// Schema definition could not be parsed.
    Parse,
    /// Value does not fit the schema or the datum writer failed.
    Encode,
    /// Payload is not a framed datum of this schema.
    Decode,
}

impl fmt::Display for CodecErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecErrorKind::Parse => f.write_str("parse"),
            CodecErrorKind::Encode => f.write_str("encode"),
            CodecErrorKind::Decode => f.write_str("decode"),
        }
    }
}

/// Error returned by `SchemaParser` / `SchemaCodec` implementations.
///
/// Carried unmodified inside `StubError::Schema` and `StubError::Encoding`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecError {
    pub kind: CodecErrorKind,
    pub message: String,
}

impl CodecError {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self { kind: CodecErrorKind::Parse, message: msg.into() }
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self { kind: CodecErrorKind::Encode, message: msg.into() }
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self { kind: CodecErrorKind::Decode, message: msg.into() }
    }

    /// Add context to the error, preserving the kind.
    ///
    /// Produces: `"context: original message"`.
    pub fn with_context(self, ctx: impl fmt::Display) -> Self {
        Self {
            kind: self.kind,
            message: format!("{ctx}: {}", self.message),
        }
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for CodecError {}

// ═══════════════════════════════════════════════════════════════
//  StubError: everything the broker double surfaces to callers
// ═══════════════════════════════════════════════════════════════

/// Coarse category of a `StubError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Lifecycle misuse or a bad fixture config.
    Config,
    /// A registry fixture carried an unparsable schema.
    Schema,
    /// A value could not be encoded with its topic's schema.
    Format,
    /// Produce against a topic nobody registered a schema for.
    Logic,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum StubError {
    #[error("schema for subject '{subject}' failed to parse: {source}")]
    Schema {
        subject: String,
        #[source]
        source: CodecError,
    },

    #[error("no schema registered for topic '{0}'")]
    MissingSchema(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("encoding message for topic '{topic}' failed: {source}")]
    Encoding {
        topic: String,
        #[source]
        source: CodecError,
    },
}

impl StubError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StubError::Schema { .. } => ErrorKind::Schema,
            StubError::MissingSchema(_) => ErrorKind::Logic,
            StubError::Configuration(_) => ErrorKind::Config,
            StubError::Encoding { .. } => ErrorKind::Format,
        }
    }
}
