use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Rising,
    Falling,
    #[default]
    Stable,
}

impl Direction {
    /// Unknown values are treated as stable.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "rising" => Direction::Rising,
            "falling" => Direction::Falling,
            _ => Direction::Stable,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Rising => "rising",
            Direction::Falling => "falling",
            Direction::Stable => "stable",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw per-source popularity figures collected for a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceScores {
    pub google: u32,
    pub wiki: u32,
    pub news: u32,
}

impl SourceScores {
    pub fn total(&self) -> u64 {
        u64::from(self.google) + u64::from(self.wiki) + u64::from(self.news)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSignal {
    pub id: Option<Uuid>,
    pub topic: String,
    pub domain: String,
    pub domain_confidence: f64,
    pub composite_score: f64,
    pub direction: Direction,
    pub source_scores: SourceScores,
    pub source_count: u32,
    pub sources: Vec<String>,
    pub computed_at: DateTime<Utc>,
}

impl TrendSignal {
    /// Splits the comma separated source column used by storage and CSV imports.
    pub fn parse_sources(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub topic: String,
    pub timestamp: DateTime<Utc>,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub domain: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    #[default]
    Low,
    Medium,
    High,
}

impl ConfidenceTier {
    pub fn from_r_squared(r_squared: f64) -> Self {
        if r_squared >= 0.8 {
            ConfidenceTier::High
        } else if r_squared >= 0.5 {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        }
    }
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConfidenceTier::Low => "low",
            ConfidenceTier::Medium => "medium",
            ConfidenceTier::High => "high",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastHorizonPoint {
    pub target_date: DateTime<Utc>,
    pub predicted_score: f64,
    pub upper_bound: f64,
    pub lower_bound: f64,
    pub confidence: ConfidenceTier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub horizon_days: u32,
    pub points: Vec<ForecastHorizonPoint>,
    pub r_squared: f64,
    pub direction: Direction,
}

/// The three standard horizons produced from a single fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchForecast {
    pub one_day: Vec<ForecastHorizonPoint>,
    pub seven_day: Vec<ForecastHorizonPoint>,
    pub thirty_day: Vec<ForecastHorizonPoint>,
    pub r_squared: f64,
    pub confidence: ConfidenceTier,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionSummary {
    pub growth_probability: u32,
    pub decline_probability: u32,
    pub peak_window: Option<NaiveDate>,
    pub confidence: ConfidenceTier,
}

impl PredictionSummary {
    pub fn neutral() -> Self {
        Self {
            growth_probability: 50,
            decline_probability: 50,
            peak_window: None,
            confidence: ConfidenceTier::Low,
        }
    }

    pub fn peak_window_label(&self) -> String {
        self.peak_window
            .map(|date| date.to_string())
            .unwrap_or_else(|| "N/A".to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatternKind {
    Sustained,
    Flash,
    ReEmerging,
    Seasonal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternTag {
    pub kind: PatternKind,
    pub label: String,
    pub color: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceAttribution {
    pub name: String,
    pub contribution: f64,
    pub color: String,
    pub icon: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Spike,
    Decline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertPriority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub message: String,
    pub generated_at: DateTime<Utc>,
    pub priority: AlertPriority,
}

/// Everything derived for a signal with a usable topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub category: String,
    pub classification: ClassificationResult,
    pub strength_score: u32,
    pub growth_rate: f64,
    pub mention_velocity: u32,
    pub time_consistency: u32,
    pub patterns: Vec<PatternTag>,
    pub sources: Vec<SourceAttribution>,
    pub risk_level: RiskLevel,
    pub risk_reasons: Vec<String>,
    pub predictions: PredictionSummary,
    pub forecast: Option<BatchForecast>,
    pub top_keywords: Vec<String>,
    pub alerts: Vec<Alert>,
    pub description: String,
    pub data_sources: Vec<String>,
}

/// A signal plus its analysis. `analysis` is `None` for pass-through records
/// whose topic was empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedTrend {
    #[serde(flatten)]
    pub signal: TrendSignal,
    pub analysis: Option<TrendAnalysis>,
}
