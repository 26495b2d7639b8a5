use serde::{Deserialize, Serialize};

use crate::error::{Result, TrafficError};

// ── Shared constants ──────────────────────────────────────────────────────────

/// Default weight of `1 - bounce_rate` in the quality score.
pub const DEFAULT_BOUNCE_WEIGHT: f64 = 0.3;

/// Default weight of `conversion_rate / 100` in the quality score.
pub const DEFAULT_CONVERSION_WEIGHT: f64 = 0.4;

/// Default weight of the normalised session duration in the quality score.
pub const DEFAULT_DURATION_WEIGHT: f64 = 0.3;

/// Percentile used for the traffic and conversion thresholds (the median).
pub const DEFAULT_THRESHOLD_PERCENTILE: f64 = 50.0;

/// Allowed deviation of the weight sum from 1.0.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

// ── ScoringWeights ────────────────────────────────────────────────────────────

/// Weights of the three quality-score components. Must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub bounce_rate: f64,
    pub conversion_rate: f64,
    pub session_duration: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            bounce_rate: DEFAULT_BOUNCE_WEIGHT,
            conversion_rate: DEFAULT_CONVERSION_WEIGHT,
            session_duration: DEFAULT_DURATION_WEIGHT,
        }
    }
}

impl ScoringWeights {
    /// Construct and validate in one step.
    pub fn new(bounce_rate: f64, conversion_rate: f64, session_duration: f64) -> Result<Self> {
        let weights = Self {
            bounce_rate,
            conversion_rate,
            session_duration,
        };
        weights.validate()?;
        Ok(weights)
    }

    /// Sum of the three weights.
    pub fn total(&self) -> f64 {
        self.bounce_rate + self.conversion_rate + self.session_duration
    }

    /// Reject negative or non-finite weights and sums other than 1.0.
    pub fn validate(&self) -> Result<()> {
        let all = [self.bounce_rate, self.conversion_rate, self.session_duration];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(TrafficError::InvalidWeights(format!(
                "weights must be finite and non-negative, got {:?}",
                all
            )));
        }
        let total = self.total();
        if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(TrafficError::InvalidWeights(format!(
                "weights must sum to 1.0, got {total}"
            )));
        }
        Ok(())
    }
}

// ── ScoringConfig ─────────────────────────────────────────────────────────────

/// Configuration for the page quality scorer and categorizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub weights: ScoringWeights,
    /// Percentile of page sessions separating high from low traffic.
    pub sessions_percentile: f64,
    /// Percentile of page conversion rates separating high from low conversion.
    pub conversion_percentile: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            sessions_percentile: DEFAULT_THRESHOLD_PERCENTILE,
            conversion_percentile: DEFAULT_THRESHOLD_PERCENTILE,
        }
    }
}

impl ScoringConfig {
    /// Validate weights and percentile bounds.
    pub fn validate(&self) -> Result<()> {
        self.weights.validate()?;
        for p in [self.sessions_percentile, self.conversion_percentile] {
            if !(0.0..=100.0).contains(&p) {
                return Err(TrafficError::Config(format!(
                    "threshold percentile must be within 0-100, got {p}"
                )));
            }
        }
        Ok(())
    }
}

// ── AlertThresholds ───────────────────────────────────────────────────────────

/// Per-page values that trigger an insight alert.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertThresholds {
    /// Alert when a page's mean bounce rate exceeds this fraction.
    pub high_bounce_rate: f64,
    /// Alert when a page's conversion rate (percent) is below this.
    pub low_conversion_rate: f64,
    /// Alert when a page's mean session lasts fewer seconds than this.
    pub low_session_duration: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            high_bounce_rate: 0.70,
            low_conversion_rate: 1.0,
            low_session_duration: 30.0,
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
