use cometd_codec::CodecError;

pub type Result<T, E = MessageError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// A field was written after `freeze()`
    #[error("message is already frozen")]
    Frozen,
    /// JSON was requested before `freeze()`
    #[error("message is not frozen yet")]
    NotFrozen,
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}
