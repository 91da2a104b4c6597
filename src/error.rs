//! Error taxonomy for lexing, parsing, clause classification and backend compilation

use thiserror::Error;

/// Errors raised while splitting a fragment into tokens
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("Unterminated quote starting at {position}")]
    UnterminatedQuote { position: usize },

    #[error("Dangling escape character at {position}")]
    DanglingEscape { position: usize },

    #[error("Unbalanced ')' at {position}")]
    StrayClosingParen { position: usize },
}

/// Structural errors in an otherwise lexable fragment or in rewrite input
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GrammarError {
    #[error("Unexpected token '{found}' at {position}, expected {expected}")]
    UnexpectedToken {
        expected: String,
        found: String,
        position: usize,
    },

    #[error("Function '{token}' is missing its closing ')'")]
    UnclosedCall { token: String },

    #[error("Empty argument in call to '{token}'")]
    EmptyArgument { token: String },

    #[error("Quoted literal '{token}' cannot be called as a function")]
    QuotedFunction { token: String },

    #[error("Too many '=' operators in '{fragment}'")]
    TooManyOperators { fragment: String },

    #[error("Missing key before '=' in '{fragment}'")]
    EmptyKey { fragment: String },

    #[error("Unknown query term '{token}'")]
    UnknownToken { token: String },

    #[error("Function '{token}' expects {expected}")]
    Arity { token: String, expected: String },

    #[error("Key '{key}' has {found} components but index '{index}' has {expected} columns")]
    KeyArity {
        index: String,
        key: String,
        expected: usize,
        found: usize,
    },

    #[error("Key '{key}' for index '{index}' has an empty component")]
    EmptyKeyComponent { index: String, key: String },

    #[error("Index '{index}' is not unique and cannot address rows by key")]
    NonUniqueIndex { index: String },

    #[error("Invalid escape sequence in key '{key}'")]
    InvalidKeyEscape { key: String },

    #[error("Value '{value}' is not a valid {expected} for column '{column}'")]
    InvalidValue {
        column: String,
        value: String,
        expected: String,
    },

    #[error("Invalid paging value '{value}' for '{token}'")]
    InvalidPaging { token: String, value: String },

    #[error("Expected a column name as the first argument of '{token}'")]
    ExpectedColumn { token: String },

    #[error("Relationship depth exceeded in '{path}' (max: {max})")]
    RelationshipDepthExceeded { max: u8, path: String },
}

/// Lookups against collection metadata that failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    #[error("Unknown column '{column}' on collection '{collection}'")]
    UnknownColumn { collection: String, column: String },

    #[error("Unknown relationship '{relationship}' on collection '{collection}'")]
    UnknownRelationship {
        collection: String,
        relationship: String,
    },

    #[error("Unknown index '{index}' on collection '{collection}'")]
    UnknownIndex { collection: String, index: String },

    #[error("Collection '{collection}' is misconfigured: {reason}")]
    Misconfigured { collection: String, reason: String },
}

impl MetadataError {
    /// Whether the lookup failed because of something the caller typed, as
    ///  opposed to a broken catalog.
    pub fn is_user_error(&self) -> bool {
        !matches!(
            self,
            MetadataError::UnknownCollection(_) | MetadataError::Misconfigured { .. }
        )
    }
}

/// How an error should be surfaced to a client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    BadRequest,
    Internal,
}

impl Status {
    pub fn code(&self) -> u16 {
        match self {
            Status::BadRequest => 400,
            Status::Internal => 500,
        }
    }
}

/// Any failure between a raw query string and a compiled statement
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RqlError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Grammar(#[from] GrammarError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error("The {backend} backend does not support '{function}' (supported alternatives: {alternatives})")]
    UnsupportedFeature {
        backend: String,
        function: String,
        alternatives: String,
    },
}

impl RqlError {
    pub fn unsupported(
        backend: impl Into<String>,
        function: impl Into<String>,
        alternatives: impl Into<String>,
    ) -> Self {
        RqlError::UnsupportedFeature {
            backend: backend.into(),
            function: function.into(),
            alternatives: alternatives.into(),
        }
    }

    pub fn status(&self) -> Status {
        match self {
            RqlError::Metadata(e) if !e.is_user_error() => Status::Internal,
            _ => Status::BadRequest,
        }
    }
}

/// Result type used across the crate
pub type RqlResult<T> = Result<T, RqlError>;
