//! Host-facing engine for tapword dictionaries.
//!
//! [`BinaryDictionary`] owns one open dictionary file and serves suggestion
//! queries from any number of threads, each identified by a session id, while
//! learning writes and compaction are serialized behind it.

mod api;
mod trace_init;

pub use api::{BinaryDictionary, PROPERTY_KEYS};
pub use trace_init::init_tracing;

pub use tapword_core::dict::{DictError, UnigramProperty};
pub use tapword_core::mutation::LanguageModelUpdate;
pub use tapword_core::search::{
    GestureSample, KeyGridProximity, NoProximity, ProximityModel, SearchInput, SearchOptions,
    Suggestion, SuggestionKind, TouchPoint, TypedKey,
};
pub use tapword_core::settings::{init_custom as settings_init_custom, DEFAULT_SETTINGS_TOML};
pub use tapword_core::{
    CONFIDENCE_TO_AUTO_COMMIT, MAX_PROBABILITY, MAX_RESULTS, MAX_WORD_LENGTH, NOT_A_PROBABILITY,
    NOT_A_TIMESTAMP,
};
