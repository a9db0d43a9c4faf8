//! Dictionary store: the code-point trie with unigram, bigram and shortcut
//! entries, plus header attributes and free-slot bookkeeping.
//!
//! `DictStore` is a plain value. Readers share it behind an `Arc`, and the
//! owner mutates it copy-on-write, so a search never observes a half-applied
//! update.

mod entry;
mod store;
#[cfg(test)]
mod tests;
mod walk;

pub use entry::{BigramEntry, HistoricalInfo, ShortcutEntry, UnigramEntry, UnigramProperty};
pub use store::{DictStore, Header, NodeId, PtNode, ROOT};
pub(crate) use store::BigramEdge;
pub use walk::PrefixIter;

use std::io;

/// Format version of read-only dictionaries shipped with the host.
pub const FORMAT_VERSION_STATIC: u8 = 2;
/// Format version of updatable (user-learned) dictionaries.
pub const FORMAT_VERSION_DYNAMIC: u8 = 4;

/// Header attribute enabling historical aging and forgetting.
pub const ATTR_USES_FORGETTING_CURVE: &str = "USES_FORGETTING_CURVE";
pub const ATTR_MAX_UNIGRAM_COUNT: &str = "MAX_UNIGRAM_COUNT";
pub const ATTR_MAX_BIGRAM_COUNT: &str = "MAX_BIGRAM_COUNT";

pub fn is_supported_version(version: u8) -> bool {
    version == FORMAT_VERSION_STATIC || version == FORMAT_VERSION_DYNAMIC
}

/// Unified error type for opening, querying, mutating and writing dictionaries.
#[derive(Debug, thiserror::Error)]
pub enum DictError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid header (too short)")]
    InvalidHeader,

    #[error("invalid magic bytes (expected TPWD)")]
    InvalidMagic,

    #[error("unsupported version: {0}")]
    UnsupportedVersion(u8),

    #[error("corrupt dictionary: {0}")]
    Corrupt(String),

    #[error("serialization error: {0}")]
    Serialize(bincode::Error),

    #[error("deserialization error: {0}")]
    Deserialize(bincode::Error),

    #[error("dictionary is read-only")]
    ReadOnly,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("dictionary is closed")]
    Closed,
}

impl DictError {
    /// Whether the error means the bytes are not a dictionary this engine understands.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            DictError::InvalidHeader
                | DictError::InvalidMagic
                | DictError::UnsupportedVersion(_)
                | DictError::Corrupt(_)
                | DictError::Deserialize(_)
        )
    }
}
