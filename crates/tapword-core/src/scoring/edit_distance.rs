use crate::MAX_PROBABILITY;

const TYPED_LETTER_MULTIPLIER: f32 = 2.0;
const FULL_WORD_MULTIPLIER: f32 = 2.0;

/// Levenshtein distance over code points (unit insert/delete/substitute).
pub fn edit_distance(before: &[u32], after: &[u32]) -> usize {
    if before.is_empty() {
        return after.len();
    }
    if after.is_empty() {
        return before.len();
    }
    // Two rows are enough: row i only reads row i-1.
    let mut prev: Vec<usize> = (0..=after.len()).collect();
    let mut cur = vec![0usize; after.len() + 1];
    for (i, &b) in before.iter().enumerate() {
        cur[0] = i + 1;
        for (j, &a) in after.iter().enumerate() {
            let substitute = prev[j] + usize::from(a != b);
            cur[j + 1] = substitute.min(prev[j + 1] + 1).min(cur[j] + 1);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[after.len()]
}

/// Scale a raw suggestion score into `[0, 1]` relative to what a perfect
/// full-length match of `after` could score, weighted down by edit distance.
pub fn normalized_edit_distance_score(before: &[u32], after: &[u32], score: i32) -> f32 {
    if before.is_empty() || after.is_empty() || score <= 0 {
        return 0.0;
    }
    let spaces = after.iter().filter(|&&cp| cp == ' ' as u32).count();
    if spaces == after.len() {
        return 0.0;
    }
    let distance = edit_distance(before, after);
    let weight = (1.0 - distance as f32 / after.len() as f32).max(0.0);
    let letters = before.len().min(after.len() - spaces) as i32;
    let max_score =
        MAX_PROBABILITY as f32 * TYPED_LETTER_MULTIPLIER.powi(letters) * FULL_WORD_MULTIPLIER;
    (score as f32 / max_score).min(1.0) * weight
}
