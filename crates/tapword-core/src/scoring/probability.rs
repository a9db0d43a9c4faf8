use crate::dict::{BigramEntry, DictStore, UnigramEntry};
use crate::{MAX_PROBABILITY, NOT_A_PROBABILITY};

use super::history::decayed_probability;

/// Compose a unigram probability with a bigram probability.
///
/// The range `[unigram, MAX_PROBABILITY]` is split into 256.5 steps; the
/// bigram picks how many of them to climb, so a bigram always lifts the
/// word and never past the ceiling. Without a bigram the unigram stands.
pub fn calculate_probability(unigram: i32, bigram: i32) -> i32 {
    if bigram == NOT_A_PROBABILITY {
        return if unigram == NOT_A_PROBABILITY {
            NOT_A_PROBABILITY
        } else {
            unigram.clamp(0, MAX_PROBABILITY)
        };
    }
    let u = if unigram == NOT_A_PROBABILITY {
        0
    } else {
        unigram.clamp(0, MAX_PROBABILITY)
    };
    let b = bigram.clamp(0, MAX_PROBABILITY);
    let step = (MAX_PROBABILITY - u) as f32 / (1.5 + MAX_PROBABILITY as f32);
    (u + ((b + 1) as f32 * step) as i32).min(MAX_PROBABILITY)
}

/// Effective probability of a unigram, aged when the store decays entries.
pub fn unigram_score(store: &DictStore, entry: &UnigramEntry) -> i32 {
    if store.uses_forgetting_curve() {
        decayed_probability(entry.probability, &entry.historical, store.clock())
    } else {
        entry.probability as i32
    }
}

/// Probability of `word1` following `word0`.
///
/// Falls back to the unigram when there is no bigram, or when the context
/// word itself is blacklisted.
pub fn bigram_score(
    store: &DictStore,
    word0: Option<&UnigramEntry>,
    word1: &UnigramEntry,
    bigram: Option<&BigramEntry>,
) -> i32 {
    let unigram = unigram_score(store, word1);
    let context_ok = word0.is_some_and(|w| !w.is_blacklisted);
    let bigram = match bigram {
        Some(b) if context_ok => {
            if store.uses_forgetting_curve() {
                decayed_probability(b.probability, &b.historical, store.clock())
            } else {
                b.probability as i32
            }
        }
        _ => NOT_A_PROBABILITY,
    };
    calculate_probability(unigram, bigram)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_bigram_backs_off_to_unigram() {
        assert_eq!(calculate_probability(120, NOT_A_PROBABILITY), 120);
        assert_eq!(
            calculate_probability(NOT_A_PROBABILITY, NOT_A_PROBABILITY),
            NOT_A_PROBABILITY
        );
    }

    #[test]
    fn bigram_lifts_unigram() {
        let base = calculate_probability(100, NOT_A_PROBABILITY);
        let low = calculate_probability(100, 0);
        let high = calculate_probability(100, 200);
        assert!(low >= base);
        assert!(high > low);
        assert!(high <= MAX_PROBABILITY);
    }

    #[test]
    fn monotonic_in_unigram() {
        for b in [0, 50, 255] {
            let mut prev = calculate_probability(0, b);
            for u in 1..=MAX_PROBABILITY {
                let p = calculate_probability(u, b);
                assert!(p >= prev, "u={u} b={b}: {p} < {prev}");
                prev = p;
            }
        }
    }

    #[test]
    fn ceiling_holds() {
        assert_eq!(calculate_probability(255, 255), MAX_PROBABILITY);
        assert!(calculate_probability(0, 255) <= MAX_PROBABILITY);
    }
}
