//! Historical-info aging for dictionaries with the forgetting curve enabled.
//!
//! Effective probability is `stored × (½ + ½·recency) + min(count × boost, max) × recency`,
//! where `recency = 1 / (1 + hours_since_use / half_life)`. Both terms grow with
//! recency and the boost grows with use count, so the result is monotonic in both.

use crate::dict::HistoricalInfo;
use crate::settings::settings;
use crate::{MAX_PROBABILITY, NOT_A_TIMESTAMP};

fn hours_between(then: i32, now: i32) -> f64 {
    (now as i64 - then as i64).max(0) as f64 / 3600.0
}

/// Recency factor in (0, 1]; 1 when `last_used` is `now` or later.
pub fn decay(last_used: i32, now: i32) -> f64 {
    1.0 / (1.0 + hours_between(last_used, now) / settings().history.half_life_hours)
}

pub fn decayed_probability(probability: u8, info: &HistoricalInfo, now: i32) -> i32 {
    if info.timestamp == NOT_A_TIMESTAMP {
        return probability as i32;
    }
    let s = &settings().history;
    let recency = decay(info.timestamp, now);
    let base = probability as f64 * (0.5 + 0.5 * recency);
    let boost = (info.count as i32 * s.boost_per_use).min(s.max_boost) as f64 * recency;
    ((base + boost).round() as i32).clamp(0, MAX_PROBABILITY)
}

/// Level after the level-down periods elapsed since last use.
pub fn effective_level(info: &HistoricalInfo, now: i32) -> u8 {
    if info.timestamp == NOT_A_TIMESTAMP {
        return info.level;
    }
    let periods = hours_between(info.timestamp, now) / settings().history.level_down_hours;
    info.level.saturating_sub(periods.floor().min(u8::MAX as f64) as u8)
}

/// Fold one more use at `timestamp` into `info`.
pub fn record_use(info: &HistoricalInfo, timestamp: i32) -> HistoricalInfo {
    let s = &settings().history;
    let count = info.count.saturating_add(1);
    let level = ((count / s.level_up_count).min(s.max_level as u16) as u8).max(info.level);
    HistoricalInfo {
        timestamp: info.timestamp.max(timestamp),
        level,
        count,
    }
}

/// Unused for longer than the forget period and decayed to level 0.
pub fn should_forget(info: &HistoricalInfo, now: i32) -> bool {
    info.timestamp != NOT_A_TIMESTAMP
        && hours_between(info.timestamp, now) > settings().history.forget_after_hours
        && effective_level(info, now) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: i32 = 3600;

    fn info(timestamp: i32, level: u8, count: u16) -> HistoricalInfo {
        HistoricalInfo {
            timestamp,
            level,
            count,
        }
    }

    #[test]
    fn decay_recent() {
        let d = decay(1000, 1000);
        assert!((d - 1.0).abs() < 1e-9, "recent decay should be 1.0, got {d}");
    }

    #[test]
    fn decay_half_life() {
        let half_life = settings().history.half_life_hours as i32;
        let d = decay(0, half_life * HOUR);
        assert!((d - 0.5).abs() < 0.01, "one half-life should give ~0.5, got {d}");
    }

    #[test]
    fn untimed_entry_keeps_stored_probability() {
        assert_eq!(decayed_probability(120, &HistoricalInfo::EMPTY, 999_999), 120);
    }

    #[test]
    fn probability_monotonic_in_recency() {
        let now = 1000 * HOUR;
        let fresh = decayed_probability(100, &info(now - HOUR, 0, 3), now);
        let stale = decayed_probability(100, &info(now - 500 * HOUR, 0, 3), now);
        assert!(fresh > stale, "fresh {fresh} should beat stale {stale}");
    }

    #[test]
    fn probability_monotonic_in_count() {
        let now = 10 * HOUR;
        let once = decayed_probability(100, &info(now, 0, 1), now);
        let often = decayed_probability(100, &info(now, 0, 5), now);
        assert!(often > once);
    }

    #[test]
    fn probability_is_clamped() {
        assert_eq!(decayed_probability(255, &info(0, 3, 1000), 0), MAX_PROBABILITY);
    }

    #[test]
    fn record_use_levels_up() {
        let step = settings().history.level_up_count;
        let mut h = HistoricalInfo::EMPTY;
        for t in 0..step as i32 {
            h = record_use(&h, t);
        }
        assert_eq!(h.count, step);
        assert_eq!(h.level, 1);
        assert_eq!(h.timestamp, step as i32 - 1);
    }

    #[test]
    fn record_use_keeps_latest_timestamp() {
        let h = record_use(&info(500, 0, 1), 100);
        assert_eq!(h.timestamp, 500);
    }

    #[test]
    fn level_decays_and_entry_is_forgotten() {
        let s = &settings().history;
        let long_ago = (s.forget_after_hours as i32 + 1) * HOUR;
        let h = info(0, 1, 2);
        assert_eq!(effective_level(&h, 0), 1);
        assert_eq!(effective_level(&h, long_ago), 0);
        assert!(should_forget(&h, long_ago));
        assert!(!should_forget(&h, HOUR));
    }
}
