use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod classifier;
mod db;
mod enrich;
mod forecast;
mod models;
mod report;

use enrich::{Enricher, DEFAULT_HISTORY_DAYS};
use forecast::{ForecastError, TrendForecaster};

#[derive(Parser)]
#[command(name = "trend-insight")]
#[command(about = "Domain classification, forecasting and risk analysis for trend signals", long_about = None)]
struct Cli {
    /// Log at debug level
    #[arg(long, global = true)]
    verbose: bool,
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
    #[arg(long, global = true, default_value_t = 5)]
    max_connections: u32,
    /// Days of history used to fit forecasts
    #[arg(long, global = true, default_value_t = DEFAULT_HISTORY_DAYS)]
    history_days: i64,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load demo snapshots and history
    Seed,
    /// Import trend snapshots from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Import score history points from a CSV file
    ImportHistory {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Classify topics into business domains
    Classify {
        #[arg(required = true)]
        topics: Vec<String>,
        #[arg(long)]
        json: bool,
    },
    /// List every domain label the classifier can return
    Domains,
    /// Fit a trend line to a topic's history and project it forward
    Forecast {
        #[arg(long)]
        topic: String,
        /// Horizon in days; omit for the standard 1/7/30 day set
        #[arg(long)]
        days: Option<u32>,
        #[arg(long)]
        json: bool,
    },
    /// Enrich the latest trend snapshots
    Trends {
        #[arg(long, default_value_t = 48)]
        limit: i64,
        #[arg(long)]
        json: bool,
    },
    /// Show medium and high priority alerts for the latest snapshots
    Alerts {
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
    /// Generate a markdown report
    Report {
        /// Restrict the report to these topics
        #[arg(long = "topic")]
        topics: Vec<String>,
        #[arg(long, default_value_t = 48)]
        limit: i64,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_tracing(cli.log_format, cli.verbose);

    match cli.command {
        Commands::Classify { topics, json } => {
            let results = classifier::classify_batch(&topics);
            let distribution = classifier::domain_distribution(&topics);

            if json {
                let results: Vec<serde_json::Value> = results
                    .iter()
                    .map(|(topic, result)| {
                        serde_json::json!({
                            "topic": topic,
                            "domain": result.domain,
                            "confidence": result.confidence,
                        })
                    })
                    .collect();
                let distribution: Vec<serde_json::Value> = distribution
                    .iter()
                    .map(|(domain, count)| serde_json::json!({ "domain": domain, "count": count }))
                    .collect();
                let payload = serde_json::json!({
                    "results": results,
                    "distribution": distribution,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
                return Ok(());
            }

            for (topic, result) in results.iter() {
                println!(
                    "- {} -> {} ({:.0}%)",
                    topic,
                    result.domain,
                    result.confidence * 100.0
                );
            }
            println!("Domain distribution:");
            for (domain, count) in distribution.iter() {
                println!("- {}: {}", domain, count);
            }
        }
        Commands::Domains => {
            for domain in classifier::all_domains() {
                println!("{domain}");
            }
        }
        command => {
            let pool = connect(cli.max_connections).await?;
            run_with_pool(&pool, command, cli.history_days).await?;
        }
    }

    Ok(())
}

async fn connect(max_connections: u32) -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(max_connections.max(1))
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn run_with_pool(pool: &PgPool, command: Commands, history_days: i64) -> anyhow::Result<()> {
    let enricher = Enricher::new(db::PgHistory::new(pool.clone())).with_history_days(history_days);

    match command {
        Commands::InitDb => {
            db::init_db(pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(pool, &csv).await?;
            println!("Inserted {inserted} snapshots from {}.", csv.display());
        }
        Commands::ImportHistory { csv } => {
            let inserted = db::import_history_csv(pool, &csv).await?;
            println!("Inserted {inserted} history points from {}.", csv.display());
        }
        Commands::Forecast { topic, days, json } => {
            let history = db::fetch_history(pool, &topic, history_days).await?;
            let mut forecaster = TrendForecaster::new();

            let summary = match forecaster.train(&history) {
                Ok(summary) => summary,
                Err(ForecastError::InsufficientData { actual, .. }) => {
                    println!("Not enough history for {topic}: {actual} points in the last {history_days} days.");
                    return Ok(());
                }
                Err(err) => {
                    println!("No forecast available for {topic}: {err}.");
                    return Ok(());
                }
            };

            let horizons = match days {
                Some(days) => vec![forecaster.predict(days)?.points],
                None => {
                    let batch = forecaster.predict_batch()?;
                    vec![batch.one_day, batch.seven_day, batch.thirty_day]
                }
            };

            if json {
                let payload = serde_json::json!({
                    "topic": topic,
                    "fit": summary,
                    "horizons": horizons,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
                return Ok(());
            }

            println!(
                "{} is {} (R² {:.4}, {} confidence, {} points)",
                topic, summary.direction, summary.r_squared, summary.confidence, summary.data_points
            );
            for horizon in horizons.iter() {
                if let Some(point) = horizon.last() {
                    println!(
                        "- {} day(s): {:.2} [{:.2}, {:.2}] on {}",
                        horizon.len(),
                        point.predicted_score,
                        point.lower_bound,
                        point.upper_bound,
                        point.target_date.date_naive()
                    );
                }
            }
        }
        Commands::Trends { limit, json } => {
            let signals = db::fetch_snapshots(pool, limit).await?;
            let enriched = enricher.enrich_all(signals).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&enriched)?);
                return Ok(());
            }

            if enriched.is_empty() {
                println!("No trend snapshots found.");
                return Ok(());
            }

            for trend in enriched.iter() {
                let Some(analysis) = trend.analysis.as_ref() else {
                    continue;
                };
                println!(
                    "- {} ({}) strength {} {} risk, growth {}% by {}",
                    trend.signal.topic,
                    analysis.category,
                    analysis.strength_score,
                    analysis.risk_level,
                    analysis.predictions.growth_probability,
                    analysis.predictions.peak_window_label()
                );
            }
        }
        Commands::Alerts { limit } => {
            let signals = db::fetch_snapshots(pool, limit).await?;
            let enriched = enricher.enrich_all(signals).await;
            let alerts = report::collect_alerts(&enriched, report::ALERT_FEED_LIMIT);

            if alerts.is_empty() {
                println!("No alerts raised.");
                return Ok(());
            }

            for alert in alerts.iter() {
                println!(
                    "- [{:?}/{:?}] {} at {}",
                    alert.priority,
                    alert.kind,
                    alert.message,
                    alert.generated_at.to_rfc3339()
                );
            }
        }
        Commands::Report { topics, limit, out } => {
            let signals = if topics.is_empty() {
                db::fetch_snapshots(pool, limit).await?
            } else if let [topic] = topics.as_slice() {
                db::fetch_snapshot_by_topic(pool, topic)
                    .await?
                    .into_iter()
                    .collect()
            } else {
                db::fetch_snapshots_for_topics(pool, &topics, limit).await?
            };

            let scope = (!topics.is_empty()).then(|| topics.join(", "));
            let enriched = enricher.enrich_all(signals).await;
            let report = report::build_report(scope.as_deref(), Utc::now(), &enriched);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Classify { .. } | Commands::Domains => {}
    }

    Ok(())
}

fn setup_tracing(format: LogFormat, verbose: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            tracing_subscriber::EnvFilter::new("trend_insight=debug,info")
        } else {
            tracing_subscriber::EnvFilter::new("trend_insight=info,warn")
        }
    });

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
