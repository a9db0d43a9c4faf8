//! Probability model: unigram/bigram composition, historical aging, and
//! the edit-distance utilities used to normalize suggestion scores.

mod edit_distance;
mod history;
mod probability;

pub use edit_distance::{edit_distance, normalized_edit_distance_score};
pub use history::{decay, decayed_probability, effective_level, record_use, should_forget};
pub use probability::{bigram_score, calculate_probability, unigram_score};
