use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::models::{Alert, AlertPriority, EnrichedTrend};

pub const ALERT_FEED_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct CategorySummary {
    pub category: String,
    pub count: usize,
    pub avg_strength: f64,
}

pub fn summarize_by_category(trends: &[EnrichedTrend]) -> Vec<CategorySummary> {
    let mut summaries: Vec<CategorySummary> = Vec::new();
    let mut totals: Vec<u32> = Vec::new();

    for analysis in trends.iter().filter_map(|trend| trend.analysis.as_ref()) {
        match summaries
            .iter()
            .position(|summary| summary.category == analysis.category)
        {
            Some(index) => {
                summaries[index].count += 1;
                totals[index] += analysis.strength_score;
            }
            None => {
                summaries.push(CategorySummary {
                    category: analysis.category.clone(),
                    count: 1,
                    avg_strength: 0.0,
                });
                totals.push(analysis.strength_score);
            }
        }
    }

    for (summary, total) in summaries.iter_mut().zip(totals) {
        summary.avg_strength = f64::from(total) / summary.count as f64;
    }

    summaries.sort_by(|a, b| b.count.cmp(&a.count));
    summaries
}

/// Medium and high priority alerts across all trends, most urgent first, capped at `limit`.
pub fn collect_alerts(trends: &[EnrichedTrend], limit: usize) -> Vec<Alert> {
    let mut alerts: Vec<Alert> = trends
        .iter()
        .filter_map(|trend| trend.analysis.as_ref())
        .flat_map(|analysis| analysis.alerts.iter().cloned())
        .filter(|alert| alert.priority >= AlertPriority::Medium)
        .collect();

    alerts.sort_by(|a, b| b.priority.cmp(&a.priority));
    alerts.truncate(limit);
    alerts
}

pub fn build_report(
    scope: Option<&str>,
    generated_at: DateTime<Utc>,
    trends: &[EnrichedTrend],
) -> String {
    let summaries = summarize_by_category(trends);
    let alerts = collect_alerts(trends, ALERT_FEED_LIMIT);

    let mut output = String::new();
    let scope_label = scope.unwrap_or("latest trends");

    let _ = writeln!(output, "# Trend Insight Report");
    let _ = writeln!(
        output,
        "Generated for {} at {}",
        scope_label,
        generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Domain Mix");

    if summaries.is_empty() {
        let _ = writeln!(output, "No trends available for this report.");
    } else {
        for summary in summaries.iter() {
            let _ = writeln!(
                output,
                "- {}: {} trends (avg strength {:.1})",
                summary.category, summary.count, summary.avg_strength
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Trends");

    let mut ranked: Vec<&EnrichedTrend> = trends
        .iter()
        .filter(|trend| trend.analysis.is_some())
        .collect();
    ranked.sort_by(|a, b| {
        b.signal
            .composite_score
            .partial_cmp(&a.signal.composite_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    if ranked.is_empty() {
        let _ = writeln!(output, "No trends available for this report.");
    } else {
        for trend in ranked {
            let Some(analysis) = trend.analysis.as_ref() else {
                continue;
            };
            let pattern = analysis
                .patterns
                .first()
                .map(|tag| tag.label.as_str())
                .unwrap_or("Unknown");
            let _ = writeln!(
                output,
                "- {} ({}, {} risk) strength {} | {} | growth {}% / decline {}% by {} ({} confidence)",
                trend.signal.topic,
                analysis.category,
                analysis.risk_level,
                analysis.strength_score,
                pattern,
                analysis.predictions.growth_probability,
                analysis.predictions.decline_probability,
                analysis.predictions.peak_window_label(),
                analysis.predictions.confidence
            );
            for reason in analysis.risk_reasons.iter() {
                let _ = writeln!(output, "  - {}", reason);
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Alerts");

    if alerts.is_empty() {
        let _ = writeln!(output, "No alerts raised.");
    } else {
        for alert in alerts.iter() {
            let _ = writeln!(output, "- [{:?}] {}", alert.priority, alert.message);
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::enrich::analyze;
    use crate::models::{Direction, SourceScores, TrendSignal};

    fn enriched(topic: &str, domain: &str, score: f64, direction: Direction) -> EnrichedTrend {
        let signal = TrendSignal {
            id: None,
            topic: topic.to_string(),
            domain: domain.to_string(),
            domain_confidence: 0.4,
            composite_score: score,
            direction,
            source_scores: SourceScores {
                google: 10,
                wiki: 0,
                news: 0,
            },
            source_count: 1,
            sources: vec!["google_trends".to_string()],
            computed_at: Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap(),
        };
        let analysis = analyze(&signal, &[], Utc.with_ymd_and_hms(2026, 6, 2, 0, 0, 0).unwrap());
        EnrichedTrend {
            signal,
            analysis: Some(analysis),
        }
    }

    #[test]
    fn summaries_group_by_category() {
        let trends = vec![
            enriched("NBA", "Sports", 0.6, Direction::Stable),
            enriched("Cloud", "Technology", 0.2, Direction::Stable),
            enriched("NFL", "Sports", 0.4, Direction::Stable),
        ];
        let summaries = summarize_by_category(&trends);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].category, "Sports");
        assert_eq!(summaries[0].count, 2);
        assert!((summaries[0].avg_strength - 50.0).abs() < 1e-9);
    }

    #[test]
    fn alerts_are_prioritised_and_capped() {
        let mut trends = vec![enriched("Dip", "Other", 0.1, Direction::Falling)];
        for i in 0..12 {
            trends.push(enriched(&format!("Spike {i}"), "Other", 0.9, Direction::Rising));
        }

        let alerts = collect_alerts(&trends, ALERT_FEED_LIMIT);
        assert_eq!(alerts.len(), ALERT_FEED_LIMIT);
        assert!(alerts.iter().all(|alert| alert.priority == AlertPriority::High));

        let alerts = collect_alerts(&trends[..2], ALERT_FEED_LIMIT);
        assert_eq!(alerts[0].priority, AlertPriority::High);
        assert_eq!(alerts[1].priority, AlertPriority::Medium);
    }

    #[test]
    fn report_lists_sections() {
        let trends = vec![
            enriched("Stock Market Crash", "Business & Finance", 0.2, Direction::Falling),
            EnrichedTrend {
                analysis: None,
                ..enriched("", "Other", 0.5, Direction::Stable)
            },
        ];
        let generated_at = Utc.with_ymd_and_hms(2026, 6, 2, 8, 30, 0).unwrap();
        let report = build_report(Some("markets"), generated_at, &trends);

        assert!(report.contains("Generated for markets at 2026-06-02 08:30 UTC"));
        assert!(report.contains("- Business & Finance: 1 trends"));
        assert!(report.contains("Stock Market Crash (Business & Finance, high risk)"));
        assert!(report.contains("Declining interest in Stock Market Crash"));
        assert!(report.contains("Single source confirmation"));
    }

    #[test]
    fn empty_report_says_so() {
        let report = build_report(None, Utc::now(), &[]);
        assert!(report.contains("latest trends"));
        assert!(report.contains("No trends available for this report."));
        assert!(report.contains("No alerts raised."));
    }
}
