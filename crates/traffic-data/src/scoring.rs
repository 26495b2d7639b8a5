//! Composite page quality score and performance quadrants.

use traffic_core::error::{Result, TrafficError};
use traffic_core::models::{AggregateRow, Category, Dimension, GroupKey, PageScore};
use traffic_core::stats::percentile_of;
use traffic_core::thresholds::ScoringConfig;

/// Scores page aggregates against the cohort they arrive in.
#[derive(Debug, Clone, Default)]
pub struct PageScorer {
    config: ScoringConfig,
}

impl PageScorer {
    /// Create a scorer, rejecting invalid weights or percentiles.
    pub fn new(config: ScoringConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score and categorise every page row, keeping input order.
    ///
    /// ```text
    /// quality = 100 * ( w_b * (1 - bounce_rate)
    ///                 + w_c * conversion_rate / 100
    ///                 + w_d * avg_session_duration / max_duration )
    /// ```
    ///
    /// `max_duration` is taken over `pages`; when it is zero the duration term
    /// is zero. Pages at or above a threshold fall in the high bucket.
    pub fn score(&self, pages: &[AggregateRow]) -> Result<Vec<PageScore>> {
        if pages.is_empty() {
            return Err(TrafficError::EmptySubset);
        }
        let mut names = Vec::with_capacity(pages.len());
        for row in pages {
            match &row.key {
                GroupKey::Page(name) => names.push(name.as_str()),
                other => {
                    return Err(TrafficError::WrongDimension {
                        expected: Dimension::Page.name(),
                        found: other.dimension_name(),
                    })
                }
            }
        }

        let max_duration = pages
            .iter()
            .map(|r| r.avg_session_duration)
            .fold(0.0_f64, f64::max);
        let sessions_threshold = percentile_of(
            pages.iter().map(|r| r.sessions as f64),
            self.config.sessions_percentile,
        );
        let conversion_threshold = percentile_of(
            pages.iter().map(|r| r.conversion_rate),
            self.config.conversion_percentile,
        );

        let w = &self.config.weights;
        Ok(pages
            .iter()
            .zip(names)
            .map(|(row, name)| {
                let duration_term = if max_duration > 0.0 {
                    row.avg_session_duration / max_duration
                } else {
                    0.0
                };
                let quality_score = 100.0
                    * (w.bounce_rate * (1.0 - row.bounce_rate)
                        + w.conversion_rate * (row.conversion_rate / 100.0)
                        + w.session_duration * duration_term);
                let category = Category::from_thresholds(
                    row.sessions as f64 >= sessions_threshold,
                    row.conversion_rate >= conversion_threshold,
                );
                PageScore {
                    page: name.to_string(),
                    sessions: row.sessions,
                    conversions: row.conversions,
                    conversion_rate: row.conversion_rate,
                    bounce_rate: row.bounce_rate,
                    avg_session_duration: row.avg_session_duration,
                    quality_score,
                    category,
                }
            })
            .collect())
    }
}

/// Scores sorted by quality, best first. Ties keep their original order.
pub fn ranked_by_quality(scores: &[PageScore]) -> Vec<PageScore> {
    let mut ranked = scores.to_vec();
    ranked.sort_by(|a, b| b.quality_score.total_cmp(&a.quality_score));
    ranked
}

/// Pages in `category`, in input order.
pub fn in_category(scores: &[PageScore], category: Category) -> impl Iterator<Item = &PageScore> {
    scores.iter().filter(move |s| s.category == category)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use traffic_core::thresholds::ScoringWeights;

    fn page(name: &str, sessions: i64, conv_rate: f64, bounce: f64, duration: f64) -> AggregateRow {
        AggregateRow {
            key: GroupKey::Page(name.to_string()),
            records: 1,
            sessions,
            users: sessions,
            conversions: (sessions as f64 * conv_rate / 100.0).round() as i64,
            bounce_rate: bounce,
            avg_session_duration: duration,
            conversion_rate: conv_rate,
        }
    }

    fn scorer() -> PageScorer {
        PageScorer::default()
    }

    // ── categorisation ───────────────────────────────────────────────────────

    #[test]
    fn test_median_ties_go_to_high_bucket() {
        let pages = vec![
            page("A", 1000, 5.0, 0.4, 100.0),
            page("B", 200, 8.0, 0.4, 100.0),
            page("C", 50, 1.0, 0.4, 100.0),
        ];
        let scores = scorer().score(&pages).unwrap();
        assert_eq!(scores[0].category, Category::StarPerformer);
        assert_eq!(scores[1].category, Category::StarPerformer);
        assert_eq!(scores[2].category, Category::NeedsAttention);
    }

    #[test]
    fn test_all_four_quadrants() {
        let pages = vec![
            page("star", 900, 9.0, 0.3, 60.0),
            page("leaky", 800, 1.0, 0.3, 60.0),
            page("gem", 10, 12.0, 0.3, 60.0),
            page("weak", 20, 0.5, 0.3, 60.0),
        ];
        let scores = scorer().score(&pages).unwrap();
        let cats: Vec<Category> = scores.iter().map(|s| s.category).collect();
        assert_eq!(
            cats,
            vec![
                Category::StarPerformer,
                Category::HighTrafficLowConversion,
                Category::HiddenGem,
                Category::NeedsAttention,
            ]
        );
        for c in Category::ALL {
            assert_eq!(in_category(&scores, c).count(), 1);
        }
    }

    #[test]
    fn test_single_page_is_star() {
        let scores = scorer().score(&[page("only", 5, 0.0, 1.0, 0.0)]).unwrap();
        assert_eq!(scores[0].category, Category::StarPerformer);
    }

    // ── quality score ────────────────────────────────────────────────────────

    #[test]
    fn test_quality_score_formula() {
        let pages = vec![page("A", 100, 10.0, 0.2, 50.0), page("B", 100, 0.0, 1.0, 100.0)];
        let scores = scorer().score(&pages).unwrap();
        // 100 * (0.3*0.8 + 0.4*0.1 + 0.3*0.5) = 43
        assert!((scores[0].quality_score - 43.0).abs() < 1e-9);
        // 100 * (0 + 0 + 0.3*1.0) = 30
        assert!((scores[1].quality_score - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_max_duration_drops_duration_term() {
        let pages = vec![page("A", 100, 50.0, 0.0, 0.0)];
        let scores = scorer().score(&pages).unwrap();
        assert!((scores[0].quality_score - 50.0).abs() < 1e-9);
        assert!(scores[0].quality_score.is_finite());
    }

    #[test]
    fn test_custom_weights() {
        let config = ScoringConfig {
            weights: ScoringWeights::new(0.0, 1.0, 0.0).unwrap(),
            ..Default::default()
        };
        let scores = PageScorer::new(config)
            .unwrap()
            .score(&[page("A", 100, 12.5, 0.9, 40.0)])
            .unwrap();
        assert!((scores[0].quality_score - 12.5).abs() < 1e-9);
    }

    #[test]
    fn test_ranked_by_quality_descending() {
        let pages = vec![
            page("low", 10, 0.0, 0.9, 10.0),
            page("high", 10, 20.0, 0.1, 100.0),
            page("mid", 10, 5.0, 0.5, 50.0),
        ];
        let ranked = ranked_by_quality(&scorer().score(&pages).unwrap());
        let names: Vec<&str> = ranked.iter().map(|s| s.page.as_str()).collect();
        assert_eq!(names, vec!["high", "mid", "low"]);
    }

    // ── errors ───────────────────────────────────────────────────────────────

    #[test]
    fn test_empty_input() {
        assert!(matches!(scorer().score(&[]), Err(TrafficError::EmptySubset)));
    }

    #[test]
    fn test_rejects_non_page_rows() {
        let mut row = page("A", 1, 0.0, 0.0, 0.0);
        row.key = GroupKey::Device("Mobile".into());
        let err = scorer().score(&[row]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Expected page aggregates, found a device row"
        );
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = ScoringConfig {
            weights: ScoringWeights {
                bounce_rate: 0.5,
                conversion_rate: 0.5,
                session_duration: 0.5,
            },
            ..Default::default()
        };
        assert!(matches!(
            PageScorer::new(config),
            Err(TrafficError::InvalidWeights(_))
        ));
    }
}
