//! Fuses a raw trend signal, its score history and its domain classification
//! into a single analysed record. Enrichment never fails: every inner failure
//! degrades to a neutral default.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;

use crate::classifier;
use crate::forecast::{self, ForecastError};
use crate::models::{
    Alert, AlertKind, AlertPriority, BatchForecast, ClassificationResult, Direction,
    EnrichedTrend, HistoryPoint, PatternKind, PatternTag, PredictionSummary, RiskLevel,
    SourceAttribution, SourceScores, TrendAnalysis, TrendSignal,
};

pub const DEFAULT_HISTORY_DAYS: i64 = 30;
pub const UNCLASSIFIED_DOMAIN: &str = "unclassified";
pub const TIME_CONSISTENCY_PLACEHOLDER: u32 = 70;
pub const NO_RISK_REASON: &str = "No significant risks detected";

/// Storage-side supplier of a topic's score history.
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Points for `topic` recorded within the last `max_days`, in any order.
    async fn history(&self, topic: &str, max_days: i64) -> anyhow::Result<Vec<HistoryPoint>>;
}

/// How the forecast step went for a single signal.
#[derive(Debug, Clone, PartialEq)]
pub enum ForecastOutcome {
    Forecast(BatchForecast),
    InsufficientHistory(usize),
    Failed(ForecastError),
}

struct SourceMeta {
    id: &'static str,
    name: &'static str,
    color: &'static str,
    icon: &'static str,
    score: fn(&SourceScores) -> u32,
}

const KNOWN_SOURCES: &[SourceMeta] = &[
    SourceMeta {
        id: "google_trends",
        name: "Google Trends",
        color: "#4285F4",
        icon: "🔍",
        score: |scores| scores.google,
    },
    SourceMeta {
        id: "news",
        name: "News API",
        color: "#FF6B6B",
        icon: "📰",
        score: |scores| scores.news,
    },
    SourceMeta {
        id: "wiki_trending",
        name: "Wikipedia",
        color: "#4ECDC4",
        icon: "📚",
        score: |scores| scores.wiki,
    },
];

pub struct Enricher<S> {
    source: S,
    history_days: i64,
}

impl<S: HistorySource> Enricher<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            history_days: DEFAULT_HISTORY_DAYS,
        }
    }

    pub fn with_history_days(mut self, days: i64) -> Self {
        self.history_days = days.max(1);
        self
    }

    pub async fn enrich(&self, signal: TrendSignal) -> EnrichedTrend {
        if signal.topic.trim().is_empty() {
            tracing::debug!("skipping enrichment for signal without a topic");
            return EnrichedTrend {
                signal,
                analysis: None,
            };
        }

        let history = match self.source.history(&signal.topic, self.history_days).await {
            Ok(points) => points,
            Err(err) => {
                tracing::warn!(topic = %signal.topic, error = %err, "history lookup failed");
                Vec::new()
            }
        };

        let analysis = analyze(&signal, &history, Utc::now());
        EnrichedTrend {
            signal,
            analysis: Some(analysis),
        }
    }

    /// Enriches every signal concurrently. Output order matches input order.
    pub async fn enrich_all(&self, signals: Vec<TrendSignal>) -> Vec<EnrichedTrend> {
        join_all(signals.into_iter().map(|signal| self.enrich(signal))).await
    }
}

pub fn analyze(signal: &TrendSignal, history: &[HistoryPoint], now: DateTime<Utc>) -> TrendAnalysis {
    let outcome = forecast_outcome(history);
    match &outcome {
        ForecastOutcome::Forecast(batch) => tracing::debug!(
            topic = %signal.topic,
            r_squared = batch.r_squared,
            direction = %batch.direction,
            "trained trend forecast"
        ),
        ForecastOutcome::InsufficientHistory(points) => tracing::debug!(
            topic = %signal.topic,
            points,
            "not enough history to forecast"
        ),
        ForecastOutcome::Failed(err) => tracing::warn!(
            topic = %signal.topic,
            error = %err,
            "forecast failed, using neutral prediction"
        ),
    }

    let predictions = prediction_summary(&outcome, signal.composite_score);
    let classification = resolve_classification(signal);
    let forecast = match outcome {
        ForecastOutcome::Forecast(batch) => Some(batch),
        _ => None,
    };

    TrendAnalysis {
        category: classification.domain.clone(),
        classification,
        strength_score: (signal.composite_score * 100.0).round().max(0.0) as u32,
        growth_rate: signal.composite_score * 10.0,
        mention_velocity: signal.source_count.saturating_mul(10),
        time_consistency: TIME_CONSISTENCY_PLACEHOLDER,
        patterns: vec![pattern_for(signal.direction, signal.composite_score)],
        sources: source_attribution(signal),
        risk_level: risk_level(signal.composite_score, signal.source_count),
        risk_reasons: risk_reasons(signal.composite_score, signal.source_count),
        predictions,
        forecast,
        top_keywords: vec![signal.topic.clone()],
        alerts: alerts_for(signal, now),
        description: format!("Trending topic: {}", signal.topic),
        data_sources: signal.sources.clone(),
    }
}

/// Fits a fresh model per call; nothing is shared between topics.
pub fn forecast_outcome(history: &[HistoryPoint]) -> ForecastOutcome {
    if history.len() < 2 {
        return ForecastOutcome::InsufficientHistory(history.len());
    }

    match forecast::predict_batch(history) {
        Ok(batch) => ForecastOutcome::Forecast(batch),
        Err(ForecastError::InsufficientData { actual, .. }) => {
            ForecastOutcome::InsufficientHistory(actual)
        }
        Err(err) => ForecastOutcome::Failed(err),
    }
}

pub fn prediction_summary(outcome: &ForecastOutcome, composite_score: f64) -> PredictionSummary {
    let batch = match outcome {
        ForecastOutcome::Forecast(batch) => batch,
        ForecastOutcome::InsufficientHistory(_) | ForecastOutcome::Failed(_) => {
            return PredictionSummary::neutral();
        }
    };

    let Some(target) = batch.seven_day.last() else {
        return PredictionSummary::neutral();
    };

    let (growth_probability, decline_probability) =
        growth_decline(target.predicted_score, composite_score * 100.0);

    PredictionSummary {
        growth_probability,
        decline_probability,
        peak_window: Some(target.target_date.date_naive()),
        confidence: batch.confidence,
    }
}

/// Growth and decline percentages from predicted vs current score, both on the 0..100 scale.
pub fn growth_decline(predicted: f64, current: f64) -> (u32, u32) {
    if current.abs() < f64::EPSILON {
        return (50, 50);
    }

    if predicted > current {
        let growth = probability(50.0 + ((predicted - current) / current * 100.0).round());
        (growth, 100 - growth)
    } else {
        let decline = probability(50.0 + ((current - predicted) / current * 100.0).round());
        (100 - decline, decline)
    }
}

fn probability(value: f64) -> u32 {
    value.clamp(5.0, 95.0) as u32
}

/// The stored domain is trusted; the classifier only fills in for unlabelled signals.
pub fn resolve_classification(signal: &TrendSignal) -> ClassificationResult {
    let stored = signal.domain.trim();
    if stored.is_empty() || stored.eq_ignore_ascii_case(UNCLASSIFIED_DOMAIN) {
        return classifier::classify(&signal.topic);
    }

    ClassificationResult {
        domain: stored.to_string(),
        confidence: signal.domain_confidence,
    }
}

pub fn pattern_for(direction: Direction, score: f64) -> PatternTag {
    let (kind, label, color, description) = match direction {
        Direction::Rising if score > 0.7 => (
            PatternKind::Sustained,
            "Sustained Growth",
            "#10B981",
            "Consistent upward trend",
        ),
        Direction::Rising => (
            PatternKind::Flash,
            "Emerging",
            "#3B82F6",
            "Recent spike in interest",
        ),
        Direction::Falling => (
            PatternKind::ReEmerging,
            "Declining",
            "#EF4444",
            "Trend is losing momentum",
        ),
        Direction::Stable => (
            PatternKind::Seasonal,
            "Stable",
            "#6B7280",
            "Consistent interest level",
        ),
    };

    PatternTag {
        kind,
        label: label.to_string(),
        color: color.to_string(),
        description: description.to_string(),
    }
}

pub fn source_attribution(signal: &TrendSignal) -> Vec<SourceAttribution> {
    let total = signal.source_scores.total();
    let mut attributions: Vec<SourceAttribution> = Vec::new();

    if total > 0 {
        let mut seen: Vec<&str> = Vec::new();
        for id in &signal.sources {
            let id = id.trim();
            if seen.contains(&id) {
                continue;
            }
            seen.push(id);

            let Some(meta) = KNOWN_SOURCES.iter().find(|meta| meta.id == id) else {
                continue;
            };
            let share = f64::from((meta.score)(&signal.source_scores)) / total as f64 * 100.0;
            attributions.push(SourceAttribution {
                name: meta.name.to_string(),
                contribution: (share * 10.0).round() / 10.0,
                color: meta.color.to_string(),
                icon: meta.icon.to_string(),
            });
        }
    }

    if attributions.is_empty() {
        attributions.push(SourceAttribution {
            name: "Multiple Sources".to_string(),
            contribution: 100.0,
            color: "#6B7280".to_string(),
            icon: "📊".to_string(),
        });
    }

    attributions
}

pub fn risk_level(score: f64, source_count: u32) -> RiskLevel {
    if score > 0.8 && source_count >= 2 {
        RiskLevel::Low
    } else if score > 0.5 {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    }
}

pub fn risk_reasons(score: f64, source_count: u32) -> Vec<String> {
    let mut reasons = Vec::new();
    if score < 0.3 {
        reasons.push("Low trend score indicates weak signal".to_string());
    }
    if source_count == 1 {
        reasons.push("Single source confirmation - limited validation".to_string());
    }
    if score > 0.85 {
        reasons.push("High saturation - trend may be peaking".to_string());
    }

    if reasons.is_empty() {
        reasons.push(NO_RISK_REASON.to_string());
    }
    reasons
}

pub fn alerts_for(signal: &TrendSignal, now: DateTime<Utc>) -> Vec<Alert> {
    let score = signal.composite_score;
    match signal.direction {
        Direction::Rising if score > 0.7 => vec![Alert {
            kind: AlertKind::Spike,
            message: format!("Rapid growth detected for {}", signal.topic),
            generated_at: now,
            priority: AlertPriority::High,
        }],
        Direction::Falling if score < 0.3 => vec![Alert {
            kind: AlertKind::Decline,
            message: format!("Declining interest in {}", signal.topic),
            generated_at: now,
            priority: AlertPriority::Medium,
        }],
        _ => Vec::new(),
    }
}
