use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::classifier;
use crate::enrich::{HistorySource, UNCLASSIFIED_DOMAIN};
use crate::models::{Direction, HistoryPoint, SourceScores, TrendSignal};

const SNAPSHOT_COLUMNS: &str = "id, topic, domain, domain_confidence, trend_score, trend_direction, \
     google_score, wiki_score, news_score, num_sources, sources, computed_at";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

struct NewSnapshot<'a> {
    source_key: &'a str,
    topic: &'a str,
    domain: Option<&'a str>,
    domain_confidence: Option<f64>,
    trend_score: f64,
    direction: Direction,
    scores: SourceScores,
    num_sources: i32,
    sources: &'a str,
    computed_at: DateTime<Utc>,
}

async fn insert_snapshot(pool: &PgPool, snapshot: NewSnapshot<'_>) -> anyhow::Result<bool> {
    // Unlabelled rows are classified on the way in so the stored domain is usable later.
    let (domain, confidence) = match snapshot.domain.map(str::trim) {
        Some(domain) if !domain.is_empty() && !domain.eq_ignore_ascii_case(UNCLASSIFIED_DOMAIN) => {
            (domain.to_string(), snapshot.domain_confidence.unwrap_or(0.0))
        }
        _ => {
            let result = classifier::classify(snapshot.topic);
            (result.domain, result.confidence)
        }
    };

    let result = sqlx::query(
        r#"
        INSERT INTO trend_insight.trend_snapshots
        (id, topic, domain, domain_confidence, trend_score, trend_direction,
         google_score, wiki_score, news_score, num_sources, sources, computed_at, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(snapshot.topic)
    .bind(domain)
    .bind(confidence)
    .bind(snapshot.trend_score)
    .bind(snapshot.direction.as_str())
    .bind(to_db_score(snapshot.scores.google))
    .bind(to_db_score(snapshot.scores.wiki))
    .bind(to_db_score(snapshot.scores.news))
    .bind(snapshot.num_sources.max(1))
    .bind(snapshot.sources)
    .bind(snapshot.computed_at)
    .bind(snapshot.source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

async fn insert_history(
    pool: &PgPool,
    topic: &str,
    score: f64,
    recorded_at: DateTime<Utc>,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO trend_insight.trend_history (id, topic, trend_score, recorded_at)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (topic, recorded_at) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(topic)
    .bind(score)
    .bind(recorded_at)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let today = Utc::now()
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .context("invalid seed time")?
        .and_utc();

    let snapshots = vec![
        (
            "seed-001",
            "ChatGPT Update",
            0.82,
            Direction::Rising,
            SourceScores { google: 820, wiki: 310, news: 140 },
            3,
            "google_trends,wiki_trending,news",
            (48.0, 3.5),
        ),
        (
            "seed-002",
            "World Cup 2026",
            0.64,
            Direction::Stable,
            SourceScores { google: 540, wiki: 220, news: 0 },
            2,
            "google_trends,wiki_trending",
            (62.0, 0.2),
        ),
        (
            "seed-003",
            "Stock Market Crash",
            0.21,
            Direction::Falling,
            SourceScores { google: 0, wiki: 0, news: 75 },
            1,
            "news",
            (41.0, -2.1),
        ),
        (
            "seed-004",
            "Elon Musk acquires Twitter",
            0.91,
            Direction::Rising,
            SourceScores { google: 990, wiki: 480, news: 365 },
            3,
            "google_trends,wiki_trending,news",
            (70.0, 1.8),
        ),
    ];

    for (source_key, topic, score, direction, scores, num_sources, sources, (base, step)) in
        snapshots
    {
        insert_snapshot(
            pool,
            NewSnapshot {
                source_key,
                topic,
                domain: None,
                domain_confidence: None,
                trend_score: score,
                direction,
                scores,
                num_sources,
                sources,
                computed_at: today,
            },
        )
        .await?;

        for day in 0..10i64 {
            let recorded_at = today - Duration::days(10 - day);
            // Small alternating wobble so seeded fits are not perfectly linear.
            let wobble = if day % 2 == 0 { 1.5 } else { -1.5 };
            let value = (base + step * day as f64 + wobble).clamp(0.0, 100.0);
            insert_history(pool, topic, value, recorded_at).await?;
        }
    }

    tracing::info!("seeded demo snapshots and history");
    Ok(())
}

fn to_db_score(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn from_db_score(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

fn signal_from_row(row: &PgRow) -> TrendSignal {
    let direction: String = row.get("trend_direction");
    let sources: String = row.get("sources");
    let num_sources: i32 = row.get("num_sources");

    TrendSignal {
        id: Some(row.get("id")),
        topic: row.get("topic"),
        domain: row.get("domain"),
        domain_confidence: row.get("domain_confidence"),
        composite_score: row.get("trend_score"),
        direction: Direction::parse(&direction),
        source_scores: SourceScores {
            google: from_db_score(row.get("google_score")),
            wiki: from_db_score(row.get("wiki_score")),
            news: from_db_score(row.get("news_score")),
        },
        source_count: from_db_score(num_sources).max(1),
        sources: TrendSignal::parse_sources(&sources),
        computed_at: row.get("computed_at"),
    }
}

pub async fn fetch_snapshots(pool: &PgPool, limit: i64) -> anyhow::Result<Vec<TrendSignal>> {
    let query = format!(
        "SELECT {SNAPSHOT_COLUMNS} FROM trend_insight.trend_snapshots \
         ORDER BY computed_at DESC LIMIT $1"
    );
    let rows = sqlx::query(&query).bind(limit.max(0)).fetch_all(pool).await?;
    Ok(rows.iter().map(signal_from_row).collect())
}

pub async fn fetch_snapshot_by_topic(
    pool: &PgPool,
    topic: &str,
) -> anyhow::Result<Option<TrendSignal>> {
    let query = format!(
        "SELECT {SNAPSHOT_COLUMNS} FROM trend_insight.trend_snapshots \
         WHERE topic = $1 ORDER BY computed_at DESC LIMIT 1"
    );
    let row = sqlx::query(&query).bind(topic).fetch_optional(pool).await?;
    Ok(row.as_ref().map(signal_from_row))
}

pub async fn fetch_snapshots_for_topics(
    pool: &PgPool,
    topics: &[String],
    limit: i64,
) -> anyhow::Result<Vec<TrendSignal>> {
    if topics.is_empty() {
        return Ok(Vec::new());
    }

    let query = format!(
        "SELECT {SNAPSHOT_COLUMNS} FROM trend_insight.trend_snapshots \
         WHERE topic = ANY($1) ORDER BY computed_at DESC LIMIT $2"
    );
    let rows = sqlx::query(&query)
        .bind(topics)
        .bind(limit.max(0))
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(signal_from_row).collect())
}

pub async fn fetch_history(
    pool: &PgPool,
    topic: &str,
    max_days: i64,
) -> anyhow::Result<Vec<HistoryPoint>> {
    let since = Utc::now() - Duration::days(max_days.max(1));
    let rows = sqlx::query(
        r#"
        SELECT topic, trend_score, recorded_at
        FROM trend_insight.trend_history
        WHERE topic = $1 AND recorded_at >= $2
        ORDER BY recorded_at ASC
        "#,
    )
    .bind(topic)
    .bind(since)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| HistoryPoint {
            topic: row.get("topic"),
            timestamp: row.get("recorded_at"),
            score: row.get("trend_score"),
        })
        .collect())
}

/// Postgres-backed history supplier for the enricher.
#[derive(Clone)]
pub struct PgHistory {
    pool: PgPool,
}

impl PgHistory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistorySource for PgHistory {
    async fn history(&self, topic: &str, max_days: i64) -> anyhow::Result<Vec<HistoryPoint>> {
        fetch_history(&self.pool, topic, max_days)
            .await
            .with_context(|| format!("failed to load history for {topic}"))
    }
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        topic: String,
        domain: Option<String>,
        domain_confidence: Option<f64>,
        trend_score: f64,
        trend_direction: String,
        google_score: u32,
        wiki_score: u32,
        news_score: u32,
        num_sources: i32,
        sources: String,
        computed_at: Option<DateTime<Utc>>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        if row.topic.trim().is_empty() {
            tracing::warn!("skipping snapshot row without a topic");
            continue;
        }

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let created = insert_snapshot(
            pool,
            NewSnapshot {
                source_key: &source_key,
                topic: row.topic.trim(),
                domain: row.domain.as_deref(),
                domain_confidence: row.domain_confidence,
                trend_score: row.trend_score,
                direction: Direction::parse(&row.trend_direction),
                scores: SourceScores {
                    google: row.google_score,
                    wiki: row.wiki_score,
                    news: row.news_score,
                },
                num_sources: row.num_sources,
                sources: &row.sources,
                computed_at: row.computed_at.unwrap_or_else(Utc::now),
            },
        )
        .await?;

        if created {
            inserted += 1;
        }
    }

    Ok(inserted)
}

pub async fn import_history_csv(
    pool: &PgPool,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        topic: String,
        trend_score: f64,
        recorded_at: DateTime<Utc>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        if insert_history(pool, row.topic.trim(), row.trend_score, row.recorded_at).await? {
            inserted += 1;
        }
    }

    Ok(inserted)
}
