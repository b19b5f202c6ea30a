use std::io;

/// Errors raised while turning Bayeux fields into wire bytes and back.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The codec could not render the fields as JSON
    #[error("JSON generate error: {0}")]
    Generate(#[source] serde_json::Error),
    /// The input is not valid JSON
    #[error("JSON parse error: {0}")]
    Parse(#[source] serde_json::Error),
    /// The input is valid JSON but not a JSON object
    #[error("JSON message is not an object")]
    NotAnObject,
    /// Compressed bytes did not decode to UTF-8 text
    #[error("utf8 error")]
    Utf8Error,
    #[error("io error, {:?}", _0)]
    Io(io::Error),
}

impl From<io::Error> for CodecError {
    fn from(e: io::Error) -> CodecError {
        CodecError::Io(e)
    }
}
