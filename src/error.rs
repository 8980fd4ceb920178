use serde::Serialize;
use thiserror::Error;

/// Advisory parse problems captured on [`ParseResult`](crate::ParseResult).
///
/// A bozo error never aborts a parse. The first problem encountered is kept
/// in `bozo_exception` alongside `bozo = true`; parsing continues (possibly
/// after one lenient retry) and the document model is still populated with
/// whatever could be recovered.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum BozoError {
    /// No candidate encoding in the conversion ladder could decode the bytes
    #[error("document encoding could not be determined")]
    CharacterEncodingUnknown,

    /// The bytes decoded, but with an encoding other than the one asserted by
    /// the HTTP header / XML declaration / byte signature
    #[error("document declared as {declared}, but parsed as {used}")]
    CharacterEncodingOverride { declared: String, used: String },

    /// Served with an HTTP content type that is not an XML type
    #[error("served with non-XML content type: {0}")]
    NonXmlContentType(String),

    /// A tag used a namespace prefix that was never declared (strict pass only)
    #[error("undeclared namespace prefix: {0}")]
    UndeclaredNamespace(String),

    /// Structural XML error from the strict pass (mismatched tags, bad
    /// entity, truncated document, ...)
    #[error("document not well-formed: {0}")]
    NotWellFormed(String),
}

impl BozoError {
    /// Advisory problems leave the strict pass running; fatal ones trigger
    /// the lenient retry.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BozoError::UndeclaredNamespace(_) | BozoError::NotWellFormed(_)
        )
    }
}
