/// Stage timing for forecast runs
use chrono::{DateTime, Utc};
use instant::Instant;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageMetrics {
    pub run_label: String,
    pub stage: RunStage,
    pub duration_ms: u64,
    /// Rows loaded, trials simulated or files written, depending on the stage.
    pub items_processed: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunStage {
    Loading,
    Weighting,
    Simulation,
    Summary,
    Export,
    Complete,
}

impl std::fmt::Display for RunStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStage::Loading => write!(f, "loading"),
            RunStage::Weighting => write!(f, "weighting"),
            RunStage::Simulation => write!(f, "simulation"),
            RunStage::Summary => write!(f, "summary"),
            RunStage::Export => write!(f, "export"),
            RunStage::Complete => write!(f, "complete"),
        }
    }
}

impl std::str::FromStr for RunStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "loading" => Ok(RunStage::Loading),
            "weighting" => Ok(RunStage::Weighting),
            "simulation" => Ok(RunStage::Simulation),
            "summary" => Ok(RunStage::Summary),
            "export" => Ok(RunStage::Export),
            "complete" => Ok(RunStage::Complete),
            other => Err(format!("unknown stage {}", other)),
        }
    }
}

pub struct MetricsCollector {
    pool: SqlitePool,
    run_label: String,
    stage_timers: HashMap<RunStage, Instant>,
}

impl MetricsCollector {
    pub fn new(pool: SqlitePool, run_label: impl Into<String>) -> Self {
        Self {
            pool,
            run_label: run_label.into(),
            stage_timers: HashMap::new(),
        }
    }

    /// Start timing a stage
    pub fn start_stage(&mut self, stage: RunStage) {
        self.stage_timers.insert(stage, Instant::now());
    }

    /// End timing a stage and record metrics
    pub async fn end_stage(
        &mut self,
        stage: RunStage,
        items_processed: Option<u64>,
    ) -> crate::database::Result<StageMetrics> {
        let duration = self
            .stage_timers
            .remove(&stage)
            .map(|start| start.elapsed().as_millis() as u64)
            .unwrap_or(0);

        let metrics = StageMetrics {
            run_label: self.run_label.clone(),
            stage,
            duration_ms: duration,
            items_processed,
            timestamp: Utc::now(),
        };

        self.store_metrics(&metrics).await?;

        Ok(metrics)
    }

    async fn store_metrics(&self, metrics: &StageMetrics) -> crate::database::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO processing_metrics
            (run_label, stage, duration_ms, items_processed, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&metrics.run_label)
        .bind(metrics.stage.to_string())
        .bind(metrics.duration_ms as i64)
        .bind(metrics.items_processed.map(|n| n as i64))
        .bind(metrics.timestamp.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Metrics recorded for one run label, oldest first
    pub async fn get_run_metrics(&self, run_label: &str) -> crate::database::Result<Vec<StageMetrics>> {
        let rows: Vec<(String, String, i64, Option<i64>, String)> = sqlx::query_as(
            r#"
            SELECT run_label, stage, duration_ms, items_processed, created_at
            FROM processing_metrics
            WHERE run_label = ?
            ORDER BY id
            "#,
        )
        .bind(run_label)
        .fetch_all(&self.pool)
        .await?;

        let metrics = rows
            .into_iter()
            .filter_map(|(run_label, stage, duration_ms, items, created_at)| {
                let stage = stage.parse().ok()?;
                let timestamp = DateTime::parse_from_rfc3339(&created_at)
                    .map(|t| t.with_timezone(&Utc))
                    .ok()?;
                Some(StageMetrics {
                    run_label,
                    stage,
                    duration_ms: duration_ms as u64,
                    items_processed: items.map(|n| n as u64),
                    timestamp,
                })
            })
            .collect();

        Ok(metrics)
    }

    /// Print performance summary
    pub fn print_summary(&self, metrics: &[StageMetrics]) {
        use colored::*;

        println!("\n{}", "📊 Run Performance Summary".bright_cyan().bold());
        println!("{}", "=".repeat(50).bright_cyan());

        let mut total_duration = 0u64;
        let mut trials = 0u64;

        for metric in metrics.iter().filter(|m| m.stage != RunStage::Complete) {
            total_duration += metric.duration_ms;
            if metric.stage == RunStage::Simulation {
                trials += metric.items_processed.unwrap_or(0);
            }

            let stage_color = match metric.stage {
                RunStage::Loading => "yellow",
                RunStage::Weighting => "blue",
                RunStage::Simulation => "green",
                RunStage::Summary => "magenta",
                RunStage::Export => "cyan",
                RunStage::Complete => "bright_green",
            };

            println!(
                "{}: {} ms{}",
                format!("{:?}", metric.stage).color(stage_color),
                metric.duration_ms.to_string().bright_white(),
                if let Some(items) = metric.items_processed {
                    format!(" ({} items)", items.to_string().bright_yellow())
                } else {
                    String::new()
                }
            );
        }

        println!("{}", "-".repeat(50).bright_cyan());
        println!(
            "{}: {} ms",
            "Total Duration".bright_white().bold(),
            total_duration.to_string().bright_green().bold()
        );

        if trials > 0 {
            let simulation_ms: u64 = metrics
                .iter()
                .filter(|m| m.stage == RunStage::Simulation)
                .map(|m| m.duration_ms)
                .sum();
            let trials_per_second = if simulation_ms > 0 {
                (trials as f64 * 1000.0) / simulation_ms as f64
            } else {
                0.0
            };

            println!(
                "{}: {} trials/sec",
                "Simulation Rate".bright_white().bold(),
                format!("{:.2}", trials_per_second).bright_green().bold()
            );
        }

        println!();
    }
}

/// Create the processing_metrics table
pub async fn create_metrics_table(pool: &SqlitePool) -> crate::database::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS processing_metrics (
            id INTEGER PRIMARY KEY,
            run_label TEXT NOT NULL,
            stage TEXT NOT NULL,
            duration_ms INTEGER NOT NULL,
            items_processed INTEGER,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_processing_metrics_run ON processing_metrics(run_label)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
