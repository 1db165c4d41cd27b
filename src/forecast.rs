//! Linear trend forecasting over a topic's score history.
//!
//! A fit is an explicit [`TrendFit`] value: the retained feature scaling plus
//! the OLS line and its R². [`TrendForecaster`] wraps the train/predict
//! lifecycle for callers that hold a model between calls.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{
    BatchForecast, ConfidenceTier, Direction, ForecastHorizonPoint, ForecastResult, HistoryPoint,
};

pub const MIN_TRAINING_POINTS: usize = 2;
pub const MAX_MARGIN: f64 = 5.0;
pub const SCORE_CEILING: f64 = 100.0;

const SECONDS_PER_DAY: f64 = 24.0 * 3600.0;
const VARIANCE_EPSILON: f64 = 1e-12;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ForecastError {
    #[error("insufficient data points: need at least {required}, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("forecaster must be trained before predicting")]
    NotTrained,

    #[error("numerical failure while fitting trend: {0}")]
    NumericalFailure(String),
}

pub type FitResult<T> = Result<T, ForecastError>;

/// Mean and population standard deviation of the elapsed-days feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureScaling {
    pub mean: f64,
    pub std_dev: f64,
}

impl FeatureScaling {
    fn fit(values: &[f64]) -> FitResult<Self> {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let std_dev = variance.sqrt();

        if !std_dev.is_finite() || std_dev < VARIANCE_EPSILON {
            return Err(ForecastError::NumericalFailure(
                "time axis has zero variance".to_string(),
            ));
        }

        Ok(Self { mean, std_dev })
    }

    pub fn transform(&self, value: f64) -> f64 {
        (value - self.mean) / self.std_dev
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendFit {
    pub scaling: FeatureScaling,
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub data_points: usize,
    pub last_elapsed_days: f64,
    pub last_timestamp: DateTime<Utc>,
}

/// What training reports back about a fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitSummary {
    pub data_points: usize,
    pub r_squared: f64,
    pub slope: f64,
    pub intercept: f64,
    pub direction: Direction,
    pub confidence: ConfidenceTier,
}

impl TrendFit {
    pub fn train(history: &[HistoryPoint]) -> FitResult<Self> {
        if history.len() < MIN_TRAINING_POINTS {
            return Err(ForecastError::InsufficientData {
                required: MIN_TRAINING_POINTS,
                actual: history.len(),
            });
        }

        let mut sorted: Vec<&HistoryPoint> = history.iter().collect();
        sorted.sort_by_key(|point| point.timestamp);

        let first = sorted[0].timestamp;
        let last = sorted[sorted.len() - 1].timestamp;
        let days: Vec<f64> = sorted
            .iter()
            .map(|point| elapsed_days(first, point.timestamp))
            .collect();
        let scores: Vec<f64> = sorted.iter().map(|point| point.score).collect();

        if scores.iter().any(|score| !score.is_finite()) {
            return Err(ForecastError::NumericalFailure(
                "history contains non-finite scores".to_string(),
            ));
        }

        let scaling = FeatureScaling::fit(&days)?;
        let scaled: Vec<f64> = days.iter().map(|d| scaling.transform(*d)).collect();

        let n = scaled.len() as f64;
        let mean_x = scaled.iter().sum::<f64>() / n;
        let mean_y = scores.iter().sum::<f64>() / n;
        let sxx: f64 = scaled.iter().map(|x| (x - mean_x).powi(2)).sum();
        let sxy: f64 = scaled
            .iter()
            .zip(&scores)
            .map(|(x, y)| (x - mean_x) * (y - mean_y))
            .sum();

        if sxx.abs() < VARIANCE_EPSILON {
            return Err(ForecastError::NumericalFailure(
                "singular design matrix".to_string(),
            ));
        }

        let slope = sxy / sxx;
        let intercept = mean_y - slope * mean_x;

        let ss_tot: f64 = scores.iter().map(|y| (y - mean_y).powi(2)).sum();
        let ss_res: f64 = scaled
            .iter()
            .zip(&scores)
            .map(|(x, y)| (y - (slope * x + intercept)).powi(2))
            .sum();

        let r_squared = if ss_tot > VARIANCE_EPSILON {
            1.0 - ss_res / ss_tot
        } else if ss_res > VARIANCE_EPSILON {
            0.0
        } else {
            1.0
        };

        if !slope.is_finite() || !intercept.is_finite() || !r_squared.is_finite() {
            return Err(ForecastError::NumericalFailure(
                "fit produced non-finite coefficients".to_string(),
            ));
        }

        Ok(Self {
            scaling,
            slope,
            intercept,
            r_squared,
            data_points: sorted.len(),
            last_elapsed_days: days[days.len() - 1],
            last_timestamp: last,
        })
    }

    pub fn direction(&self) -> Direction {
        if self.slope > 0.0 {
            Direction::Rising
        } else if self.slope < 0.0 {
            Direction::Falling
        } else {
            Direction::Stable
        }
    }

    pub fn confidence(&self) -> ConfidenceTier {
        ConfidenceTier::from_r_squared(self.r_squared)
    }

    /// Uncertainty band half-width. R² is clamped here only, so the band stays within 0..=5.
    pub fn margin(&self) -> f64 {
        MAX_MARGIN * (1.0 - self.r_squared.clamp(0.0, 1.0))
    }

    pub fn summary(&self) -> FitSummary {
        FitSummary {
            data_points: self.data_points,
            r_squared: self.r_squared,
            slope: self.slope,
            intercept: self.intercept,
            direction: self.direction(),
            confidence: self.confidence(),
        }
    }

    pub fn score_at(&self, elapsed_days: f64) -> f64 {
        self.slope * self.scaling.transform(elapsed_days) + self.intercept
    }

    pub fn predict(&self, horizon_days: u32) -> ForecastResult {
        let confidence = self.confidence();
        let margin = self.margin();

        let points = (1..=horizon_days)
            .map(|offset| {
                let raw = self.score_at(self.last_elapsed_days + f64::from(offset));
                let predicted_score = clamp_score(raw);
                ForecastHorizonPoint {
                    target_date: self.last_timestamp + Duration::days(i64::from(offset)),
                    predicted_score,
                    upper_bound: clamp_score(predicted_score + margin),
                    lower_bound: clamp_score(predicted_score - margin),
                    confidence,
                }
            })
            .collect();

        ForecastResult {
            horizon_days,
            points,
            r_squared: self.r_squared,
            direction: self.direction(),
        }
    }

    pub fn predict_batch(&self) -> BatchForecast {
        BatchForecast {
            one_day: self.predict(1).points,
            seven_day: self.predict(7).points,
            thirty_day: self.predict(30).points,
            r_squared: self.r_squared,
            confidence: self.confidence(),
            direction: self.direction(),
        }
    }
}

/// Train once and produce the 1, 7 and 30 day horizons from that fit.
pub fn predict_batch(history: &[HistoryPoint]) -> FitResult<BatchForecast> {
    Ok(TrendFit::train(history)?.predict_batch())
}

#[derive(Debug, Clone, Default)]
pub struct TrendForecaster {
    fit: Option<TrendFit>,
}

impl TrendForecaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any previous fit. A failed train leaves the forecaster untrained.
    pub fn train(&mut self, history: &[HistoryPoint]) -> FitResult<FitSummary> {
        self.fit = None;
        let fit = TrendFit::train(history)?;
        let summary = fit.summary();
        self.fit = Some(fit);
        Ok(summary)
    }

    pub fn predict(&self, horizon_days: u32) -> FitResult<ForecastResult> {
        self.fit
            .as_ref()
            .map(|fit| fit.predict(horizon_days))
            .ok_or(ForecastError::NotTrained)
    }

    pub fn predict_batch(&self) -> FitResult<BatchForecast> {
        self.fit
            .as_ref()
            .map(TrendFit::predict_batch)
            .ok_or(ForecastError::NotTrained)
    }
}

fn elapsed_days(start: DateTime<Utc>, at: DateTime<Utc>) -> f64 {
    let delta = at - start;
    match delta.num_microseconds() {
        Some(micros) => micros as f64 / 1_000_000.0 / SECONDS_PER_DAY,
        None => delta.num_seconds() as f64 / SECONDS_PER_DAY,
    }
}

fn clamp_score(value: f64) -> f64 {
    value.clamp(0.0, SCORE_CEILING)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(offset: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap() + Duration::days(offset)
    }

    fn series(points: &[(i64, f64)]) -> Vec<HistoryPoint> {
        points
            .iter()
            .map(|(offset, score)| HistoryPoint {
                topic: "sample".to_string(),
                timestamp: day(*offset),
                score: *score,
            })
            .collect()
    }

    #[test]
    fn single_point_is_insufficient() {
        let err = TrendFit::train(&series(&[(0, 40.0)])).unwrap_err();
        assert_eq!(
            err,
            ForecastError::InsufficientData {
                required: 2,
                actual: 1
            }
        );

        let mut forecaster = TrendForecaster::new();
        assert!(forecaster.train(&[]).is_err());
        assert_eq!(forecaster.predict(1).unwrap_err(), ForecastError::NotTrained);
    }

    #[test]
    fn predict_before_train_fails() {
        let forecaster = TrendForecaster::new();
        assert_eq!(forecaster.predict(7).unwrap_err(), ForecastError::NotTrained);
        assert_eq!(
            forecaster.predict_batch().unwrap_err(),
            ForecastError::NotTrained
        );
    }

    #[test]
    fn identical_timestamps_are_a_numerical_failure() {
        let history = vec![
            HistoryPoint {
                topic: "t".to_string(),
                timestamp: day(0),
                score: 10.0,
            },
            HistoryPoint {
                topic: "t".to_string(),
                timestamp: day(0),
                score: 20.0,
            },
        ];
        assert!(matches!(
            TrendFit::train(&history),
            Err(ForecastError::NumericalFailure(_))
        ));
    }

    #[test]
    fn two_point_rising_scenario() {
        let fit = TrendFit::train(&series(&[(0, 40.0), (10, 60.0)])).unwrap();
        assert_eq!(fit.direction(), Direction::Rising);
        assert!((fit.r_squared - 1.0).abs() < 1e-9);

        let result = fit.predict(1);
        assert_eq!(result.points.len(), 1);
        let point = &result.points[0];
        assert!(point.predicted_score > 40.0 && point.predicted_score <= 100.0);
        assert!((point.predicted_score - 62.0).abs() < 1e-6);
        assert_eq!(point.target_date, day(11));
    }

    #[test]
    fn unsorted_input_is_sorted_before_fitting() {
        let ordered = TrendFit::train(&series(&[(0, 10.0), (1, 20.0), (2, 30.0)])).unwrap();
        let shuffled = TrendFit::train(&series(&[(2, 30.0), (0, 10.0), (1, 20.0)])).unwrap();
        assert!((ordered.slope - shuffled.slope).abs() < 1e-9);
        assert_eq!(shuffled.last_timestamp, day(2));
    }

    #[test]
    fn perfect_fit_has_zero_margin_and_high_confidence() {
        let fit = TrendFit::train(&series(&[(0, 10.0), (1, 12.0), (2, 14.0), (3, 16.0)])).unwrap();
        assert_eq!(fit.confidence(), ConfidenceTier::High);
        assert!(fit.margin().abs() < 1e-9);
        for point in fit.predict(3).points {
            assert!((point.upper_bound - point.predicted_score).abs() < 1e-9);
            assert!((point.lower_bound - point.predicted_score).abs() < 1e-9);
        }
    }

    #[test]
    fn noisy_fit_is_low_confidence() {
        let fit = TrendFit::train(&series(&[(0, 50.0), (1, 10.0), (2, 50.0), (3, 10.0)])).unwrap();
        assert!(fit.r_squared < 0.5);
        assert_eq!(fit.confidence(), ConfidenceTier::Low);
        assert!(fit.margin() > 0.0 && fit.margin() <= MAX_MARGIN);
        assert!(fit
            .predict(5)
            .points
            .iter()
            .all(|p| p.confidence == ConfidenceTier::Low));
    }

    #[test]
    fn falling_series_reports_falling() {
        let fit = TrendFit::train(&series(&[(0, 80.0), (1, 70.0), (2, 60.0)])).unwrap();
        assert_eq!(fit.direction(), Direction::Falling);
        assert_eq!(fit.summary().direction, Direction::Falling);
    }

    #[test]
    fn flat_series_is_stable() {
        let fit = TrendFit::train(&series(&[(0, 30.0), (1, 30.0), (2, 30.0)])).unwrap();
        assert_eq!(fit.direction(), Direction::Stable);
        assert_eq!(fit.r_squared, 1.0);
    }

    #[test]
    fn extrapolation_is_clamped() {
        let steep_up = TrendFit::train(&series(&[(0, 60.0), (1, 95.0)])).unwrap();
        let steep_down = TrendFit::train(&series(&[(0, 40.0), (1, 5.0)])).unwrap();

        for point in steep_up.predict(30).points.iter().chain(steep_down.predict(30).points.iter()) {
            for value in [point.predicted_score, point.upper_bound, point.lower_bound] {
                assert!((0.0..=100.0).contains(&value));
            }
        }
        assert_eq!(steep_up.predict(30).points[29].predicted_score, 100.0);
        assert_eq!(steep_down.predict(30).points[29].predicted_score, 0.0);
    }

    #[test]
    fn batch_produces_three_horizons() {
        let batch = predict_batch(&series(&[(0, 20.0), (3, 25.0), (6, 33.0), (9, 36.0)])).unwrap();
        assert_eq!(batch.one_day.len(), 1);
        assert_eq!(batch.seven_day.len(), 7);
        assert_eq!(batch.thirty_day.len(), 30);

        for horizon in [&batch.one_day, &batch.seven_day, &batch.thirty_day] {
            assert!(horizon
                .windows(2)
                .all(|pair| pair[0].target_date < pair[1].target_date));
        }
        assert_eq!(batch.seven_day[0], batch.one_day[0]);
    }

    #[test]
    fn forecaster_retains_fit_between_calls() {
        let mut forecaster = TrendForecaster::new();
        let summary = forecaster
            .train(&series(&[(0, 10.0), (1, 20.0), (2, 30.0)]))
            .unwrap();
        assert_eq!(summary.data_points, 3);
        assert_eq!(summary.confidence, ConfidenceTier::High);

        let seven = forecaster.predict(7).unwrap();
        assert_eq!(seven.points.len(), 7);
        assert!((seven.points[0].predicted_score - 40.0).abs() < 1e-6);

        // A failed retrain drops the previous fit.
        assert!(forecaster.train(&series(&[(0, 10.0)])).is_err());
        assert_eq!(forecaster.predict(1).unwrap_err(), ForecastError::NotTrained);
    }

    #[test]
    fn fractional_days_are_supported() {
        let history = vec![
            HistoryPoint {
                topic: "t".to_string(),
                timestamp: day(0),
                score: 10.0,
            },
            HistoryPoint {
                topic: "t".to_string(),
                timestamp: day(0) + Duration::hours(12),
                score: 11.0,
            },
            HistoryPoint {
                topic: "t".to_string(),
                timestamp: day(1),
                score: 12.0,
            },
        ];
        let fit = TrendFit::train(&history).unwrap();
        assert!((fit.last_elapsed_days - 1.0).abs() < 1e-9);
        assert!((fit.predict(1).points[0].predicted_score - 14.0).abs() < 1e-6);
    }
}
