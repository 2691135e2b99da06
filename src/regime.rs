// =============================================================================
// Regime Tracker — Per-market volatility regime state machine
// =============================================================================
//
// The only component in the engine holding durable cross-call state. Each
// tracked market carries exactly one current regime and at most one previous
// transition record; every new transition overwrites the previous one (no
// deep history).
//
// The transition step is a total function of (prior state, new regime): the
// first observation initialises, a differing regime closes the prior one into
// the transition slot, and an unchanged regime mutates nothing.
// Read-modify-write is serialized under one coarse mutex.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::math::round_to;
use crate::types::VolatilityRegime;

/// A closed-out regime period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeTransition {
    pub regime: VolatilityRegime,
    /// RFC 3339 instant at which the regime ended.
    pub ended_at: String,
    pub duration_hours: f64,
}

/// Current regime state for one market.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeState {
    pub current: VolatilityRegime,
    pub since: DateTime<Utc>,
    pub previous: Option<RegimeTransition>,
}

impl RegimeState {
    /// Hours the current regime has been active as of `now`.
    pub fn duration_hours(&self, now: DateTime<Utc>) -> f64 {
        (now - self.since).num_milliseconds() as f64 / 3_600_000.0
    }
}

/// Thread-safe per-market regime tracker.
///
/// Designed to be wrapped in an `Arc` and injected into the volatility
/// analyzer; state lives for the process lifetime and is never persisted.
pub struct RegimeTracker {
    states: Mutex<HashMap<String, RegimeState>>,
}

impl RegimeTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            states: Mutex::new(HashMap::new()),
        })
    }

    /// Record an observation of `regime` for `market_id` at the current
    /// wall-clock instant and return the resulting state.
    pub fn observe(&self, market_id: &str, regime: VolatilityRegime) -> RegimeState {
        self.observe_at(market_id, regime, Utc::now())
    }

    /// Record an observation at an explicit instant.
    ///
    /// The explicit `now` keeps transition durations deterministic under
    /// test; production paths go through [`observe`].
    pub fn observe_at(
        &self,
        market_id: &str,
        regime: VolatilityRegime,
        now: DateTime<Utc>,
    ) -> RegimeState {
        let mut states = self.states.lock();

        if let Some(state) = states.get_mut(market_id) {
            if state.current == regime {
                return state.clone();
            }
            let duration = round_to(state.duration_hours(now), 2);
            debug!(
                market = %market_id,
                from = %state.current,
                to = %regime,
                duration_hours = duration,
                "regime transition"
            );
            state.previous = Some(RegimeTransition {
                regime: state.current,
                ended_at: now.to_rfc3339(),
                duration_hours: duration,
            });
            state.current = regime;
            state.since = now;
            return state.clone();
        }

        let state = RegimeState {
            current: regime,
            since: now,
            previous: None,
        };
        debug!(market = %market_id, regime = %regime, "regime initialised");
        states.insert(market_id.to_string(), state.clone());
        state
    }

    /// Current state for a market, if it has ever been observed.
    pub fn state(&self, market_id: &str) -> Option<RegimeState> {
        self.states.lock().get(market_id).cloned()
    }

    /// Number of markets with tracked state.
    pub fn tracked_markets(&self) -> usize {
        self.states.lock().len()
    }
}

impl Default for RegimeTracker {
    fn default() -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn first_observation_initialises() {
        let tracker = RegimeTracker::new();
        let state = tracker.observe_at("m1", VolatilityRegime::Low, at(0));
        assert_eq!(state.current, VolatilityRegime::Low);
        assert!(state.previous.is_none());
        assert_eq!(state.since, at(0));
    }

    #[test]
    fn unchanged_regime_does_not_mutate() {
        let tracker = RegimeTracker::new();
        tracker.observe_at("m1", VolatilityRegime::Low, at(0));
        let state = tracker.observe_at("m1", VolatilityRegime::Low, at(3));
        // `since` still points at the first observation.
        assert_eq!(state.since, at(0));
        assert!(state.previous.is_none());
    }

    #[test]
    fn transition_closes_prior_regime() {
        let tracker = RegimeTracker::new();
        tracker.observe_at("m1", VolatilityRegime::Low, at(0));
        let state = tracker.observe_at("m1", VolatilityRegime::High, at(2));
        assert_eq!(state.current, VolatilityRegime::High);
        assert_eq!(state.since, at(2));
        let prev = state.previous.expect("transition recorded");
        assert_eq!(prev.regime, VolatilityRegime::Low);
        assert!((prev.duration_hours - 2.0).abs() < 1e-9);
    }

    #[test]
    fn only_most_recent_transition_is_retained() {
        // Volatility sequence 10,10,30,30,90 => low, low, medium, medium,
        // extreme. Only the medium→extreme transition survives.
        let tracker = RegimeTracker::new();
        let vols = [10.0, 10.0, 30.0, 30.0, 90.0];
        for (i, vol) in vols.iter().enumerate() {
            let regime = crate::scoring::volatility_regime(*vol);
            tracker.observe_at("m1", regime, at(i as u32));
        }

        let state = tracker.state("m1").unwrap();
        assert_eq!(state.current, VolatilityRegime::Extreme);
        let prev = state.previous.expect("transition recorded");
        assert_eq!(prev.regime, VolatilityRegime::Medium);
        assert!(prev.duration_hours > 0.0);
    }

    #[test]
    fn markets_are_tracked_independently() {
        let tracker = RegimeTracker::new();
        tracker.observe_at("m1", VolatilityRegime::Low, at(0));
        tracker.observe_at("m2", VolatilityRegime::Extreme, at(0));
        assert_eq!(tracker.state("m1").unwrap().current, VolatilityRegime::Low);
        assert_eq!(
            tracker.state("m2").unwrap().current,
            VolatilityRegime::Extreme
        );
        assert_eq!(tracker.tracked_markets(), 2);
    }

    #[test]
    fn unobserved_market_has_no_state() {
        let tracker = RegimeTracker::new();
        assert!(tracker.state("ghost").is_none());
    }

    #[test]
    fn duration_hours_fractional() {
        let tracker = RegimeTracker::new();
        let start = at(0);
        tracker.observe_at("m1", VolatilityRegime::Low, start);
        let state = tracker.state("m1").unwrap();
        let half_hour_later = start + chrono::Duration::minutes(30);
        assert!((state.duration_hours(half_hour_later) - 0.5).abs() < 1e-9);
    }
}
