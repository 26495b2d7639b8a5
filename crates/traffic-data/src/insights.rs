//! Structured findings derived from scored pages and grouped aggregates.
//!
//! Nothing here formats prose; the binary decides how findings are worded.

use serde::Serialize;
use traffic_core::error::{Result, TrafficError};
use traffic_core::models::{AggregateRow, Category, GroupKey, PageScore};
use traffic_core::thresholds::AlertThresholds;

use crate::scoring::in_category;

/// Maximum number of pages listed per recommendation.
pub const MAX_LISTED_PAGES: usize = 3;

/// A grouped value paired with the metric it was selected on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Highlight {
    pub name: String,
    pub value: f64,
}

/// Metric that crossed an alert threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    HighBounceRate,
    LowConversionRate,
    LowSessionDuration,
}

/// One page breaching one threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub page: String,
    pub kind: AlertKind,
    pub value: f64,
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insights {
    /// Highest quality score; the first page wins ties.
    pub top_page: PageScore,
    pub needs_attention: Vec<String>,
    pub high_traffic_low_conversion: Vec<String>,
    pub hidden_gems: Vec<String>,
    /// Page with the highest mean bounce rate.
    pub highest_bounce: Highlight,
    pub best_device: Option<Highlight>,
    pub worst_device: Option<Highlight>,
    /// Hour of day with the highest conversion rate.
    pub peak_conversion_hour: Option<u32>,
    pub alerts: Vec<Alert>,
}

/// Derive insights for one subset.
///
/// `devices` and `hours` are the device and hour-of-day aggregates of the same
/// subset the pages were scored on.
pub fn derive_insights(
    pages: &[PageScore],
    devices: &[AggregateRow],
    hours: &[AggregateRow],
    thresholds: &AlertThresholds,
) -> Result<Insights> {
    let top_page = first_max_by(pages.iter(), |p| p.quality_score)
        .cloned()
        .ok_or(TrafficError::EmptySubset)?;
    let highest_bounce = first_max_by(pages.iter(), |p| p.bounce_rate)
        .map(|p| Highlight {
            name: p.page.clone(),
            value: p.bounce_rate,
        })
        .ok_or(TrafficError::EmptySubset)?;

    let names = |category: Category, limit: usize| -> Vec<String> {
        in_category(pages, category)
            .take(limit)
            .map(|p| p.page.clone())
            .collect()
    };

    let device_highlight = |row: &AggregateRow| Highlight {
        name: row.key.to_string(),
        value: row.conversion_rate,
    };

    let peak_conversion_hour =
        first_max_by(hours.iter(), |h| h.conversion_rate).and_then(|h| match h.key {
            GroupKey::Hour(hour) => Some(hour),
            _ => None,
        });

    Ok(Insights {
        top_page,
        needs_attention: names(Category::NeedsAttention, usize::MAX),
        high_traffic_low_conversion: names(Category::HighTrafficLowConversion, MAX_LISTED_PAGES),
        hidden_gems: names(Category::HiddenGem, MAX_LISTED_PAGES),
        highest_bounce,
        best_device: first_max_by(devices.iter(), |d| d.conversion_rate).map(device_highlight),
        worst_device: first_max_by(devices.iter(), |d| -d.conversion_rate).map(device_highlight),
        peak_conversion_hour,
        alerts: alerts_for(pages, thresholds),
    })
}

/// Threshold breaches per page, in page order.
pub fn alerts_for(pages: &[PageScore], thresholds: &AlertThresholds) -> Vec<Alert> {
    let mut alerts = Vec::new();
    for p in pages {
        let mut push = |kind, value: f64, threshold: f64| {
            alerts.push(Alert {
                page: p.page.clone(),
                kind,
                value,
                threshold,
            })
        };
        if p.bounce_rate > thresholds.high_bounce_rate {
            push(
                AlertKind::HighBounceRate,
                p.bounce_rate,
                thresholds.high_bounce_rate,
            );
        }
        if p.conversion_rate < thresholds.low_conversion_rate {
            push(
                AlertKind::LowConversionRate,
                p.conversion_rate,
                thresholds.low_conversion_rate,
            );
        }
        if p.avg_session_duration < thresholds.low_session_duration {
            push(
                AlertKind::LowSessionDuration,
                p.avg_session_duration,
                thresholds.low_session_duration,
            );
        }
    }
    alerts
}

/// First item with the greatest key; NaN keys never win.
fn first_max_by<'a, T>(
    items: impl Iterator<Item = &'a T>,
    key: impl Fn(&T) -> f64,
) -> Option<&'a T> {
    let mut best: Option<(&'a T, f64)> = None;
    for item in items {
        let k = key(item);
        if k.is_nan() {
            continue;
        }
        if best.map_or(true, |(_, b)| k > b) {
            best = Some((item, k));
        }
    }
    best.map(|(item, _)| item)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn score(page: &str, q: f64, bounce: f64, conv: f64, dur: f64, cat: Category) -> PageScore {
        PageScore {
            page: page.to_string(),
            sessions: 100,
            conversions: conv as i64,
            conversion_rate: conv,
            bounce_rate: bounce,
            avg_session_duration: dur,
            quality_score: q,
            category: cat,
        }
    }

    fn agg(key: GroupKey, conv: f64) -> AggregateRow {
        AggregateRow {
            key,
            records: 1,
            sessions: 100,
            users: 100,
            conversions: conv as i64,
            bounce_rate: 0.5,
            avg_session_duration: 60.0,
            conversion_rate: conv,
        }
    }

    fn pages() -> Vec<PageScore> {
        vec![
            score("Home", 55.0, 0.4, 4.0, 90.0, Category::StarPerformer),
            score("Blog", 20.0, 0.85, 0.5, 20.0, Category::NeedsAttention),
            score("Pricing", 61.0, 0.3, 9.0, 120.0, Category::HiddenGem),
            score("Landing", 30.0, 0.6, 1.5, 45.0, Category::HighTrafficLowConversion),
        ]
    }

    #[test]
    fn test_derive_insights_picks_extremes() {
        let devices = vec![
            agg(GroupKey::Device("Desktop".into()), 5.0),
            agg(GroupKey::Device("Mobile".into()), 2.0),
            agg(GroupKey::Device("Tablet".into()), 3.0),
        ];
        let hours = vec![
            agg(GroupKey::Hour(9), 2.0),
            agg(GroupKey::Hour(14), 6.0),
            agg(GroupKey::Hour(20), 6.0),
        ];
        let insights =
            derive_insights(&pages(), &devices, &hours, &AlertThresholds::default()).unwrap();

        assert_eq!(insights.top_page.page, "Pricing");
        assert_eq!(insights.highest_bounce.name, "Blog");
        assert_eq!(insights.needs_attention, vec!["Blog"]);
        assert_eq!(insights.hidden_gems, vec!["Pricing"]);
        assert_eq!(insights.high_traffic_low_conversion, vec!["Landing"]);
        assert_eq!(insights.best_device.unwrap().name, "Desktop");
        assert_eq!(insights.worst_device.unwrap().name, "Mobile");
        // Ties keep the earliest hour.
        assert_eq!(insights.peak_conversion_hour, Some(14));
    }

    #[test]
    fn test_derive_insights_without_devices_or_hours() {
        let insights = derive_insights(&pages(), &[], &[], &AlertThresholds::default()).unwrap();
        assert!(insights.best_device.is_none());
        assert!(insights.peak_conversion_hour.is_none());
    }

    #[test]
    fn test_derive_insights_empty_pages() {
        assert!(matches!(
            derive_insights(&[], &[], &[], &AlertThresholds::default()),
            Err(TrafficError::EmptySubset)
        ));
    }

    #[test]
    fn test_hidden_gems_capped_at_three() {
        let many: Vec<PageScore> = (0..5)
            .map(|i| score(&format!("P{i}"), 10.0, 0.1, 5.0, 60.0, Category::HiddenGem))
            .collect();
        let insights = derive_insights(&many, &[], &[], &AlertThresholds::default()).unwrap();
        assert_eq!(insights.hidden_gems, vec!["P0", "P1", "P2"]);
    }

    #[test]
    fn test_alerts_for_thresholds() {
        let alerts = alerts_for(&pages(), &AlertThresholds::default());
        let blog: Vec<AlertKind> = alerts
            .iter()
            .filter(|a| a.page == "Blog")
            .map(|a| a.kind)
            .collect();
        assert_eq!(
            blog,
            vec![
                AlertKind::HighBounceRate,
                AlertKind::LowConversionRate,
                AlertKind::LowSessionDuration,
            ]
        );
        assert!(alerts.iter().all(|a| a.page != "Pricing" && a.page != "Home"));
        assert_eq!(alerts.len(), 3);
    }
}
