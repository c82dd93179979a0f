use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{ArgGroup, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use uuid::Uuid;

mod aggregate;
mod config;
mod db;
mod error;
mod models;
mod notify;
mod service;
mod stats;
mod store;

use crate::config::Config;
use crate::error::ReportError;
use crate::models::{PeriodReportType, Report, ReportFilter};
use crate::notify::{LogNotifier, NotificationDispatcher};
use crate::service::{ReportRequest, ReportService};
use crate::store::PgStore;

#[derive(Parser)]
#[command(name = "academic-reports")]
#[command(about = "Grade, attendance and promotion reports for academic cycles", long_about = None)]
struct Cli {
    /// Path to a configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import grades from a CSV file
    ImportGrades {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Import attendance from a CSV file
    ImportAttendance {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Generate a grade report for an academic period
    Period {
        #[arg(long)]
        period: Uuid,
        #[arg(long, value_enum, default_value_t = PeriodReportType::General)]
        report_type: PeriodReportType,
        #[arg(long)]
        json: bool,
    },
    /// Generate a student's certificate for a cycle
    Certificate {
        #[arg(long)]
        student: Uuid,
        #[arg(long)]
        cycle: Uuid,
        #[arg(long)]
        json: bool,
    },
    /// Generate an attendance report for a period
    Attendance {
        #[arg(long)]
        period: Uuid,
        #[arg(long)]
        course: Option<Uuid>,
        #[arg(long)]
        json: bool,
    },
    /// Generate the promotion report for a cycle
    Promotion {
        #[arg(long)]
        cycle: Uuid,
        #[arg(long)]
        json: bool,
    },
    /// Generate cycle-wide grade and attendance statistics
    CycleStats {
        #[arg(long)]
        cycle: Uuid,
        #[arg(long)]
        json: bool,
    },
    /// List generated reports, newest first
    #[command(group(
        ArgGroup::new("scope")
            .args(["cycle", "period"])
            .required(true)
            .multiple(false)
    ))]
    List {
        #[arg(long)]
        cycle: Option<Uuid>,
        #[arg(long)]
        period: Option<Uuid>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from_file(path),
        None => Config::load(),
    }
    .context("failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&config.logging.level))
        .init();

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .context("failed to connect to Postgres")?;

    let (request, json) = match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
            return Ok(());
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
            return Ok(());
        }
        Commands::ImportGrades { csv } => {
            let inserted = db::import_grades(&pool, &csv).await?;
            println!("Inserted {inserted} grades from {}.", csv.display());
            return Ok(());
        }
        Commands::ImportAttendance { csv } => {
            let inserted = db::import_attendance(&pool, &csv).await?;
            println!("Inserted {inserted} attendance records from {}.", csv.display());
            return Ok(());
        }
        Commands::List { cycle, period } => {
            let filter = match (cycle, period) {
                (Some(cycle), _) => ReportFilter::Cycle(cycle),
                (None, Some(period)) => ReportFilter::Period(period),
                (None, None) => anyhow::bail!("either --cycle or --period is required"),
            };
            let service = ReportService::new(Arc::new(PgStore::new(pool)));
            let reports = service.list_reports(filter).await?;

            if reports.is_empty() {
                println!("No reports generated for this scope.");
            }
            for report in &reports {
                println!(
                    "- {} [{}] {} ({}) generated {}",
                    report.id,
                    report.kind.as_str(),
                    report.title,
                    report.status.as_str(),
                    report.generated_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
            return Ok(());
        }
        Commands::Period {
            period,
            report_type,
            json,
        } => (
            ReportRequest::Period {
                period_id: period,
                report_type,
            },
            json,
        ),
        Commands::Certificate {
            student,
            cycle,
            json,
        } => (
            ReportRequest::Certificate {
                student_id: student,
                cycle_id: cycle,
            },
            json,
        ),
        Commands::Attendance {
            period,
            course,
            json,
        } => (
            ReportRequest::Attendance {
                period_id: period,
                course_id: course,
            },
            json,
        ),
        Commands::Promotion { cycle, json } => (ReportRequest::Promotion { cycle_id: cycle }, json),
        Commands::CycleStats { cycle, json } => {
            (ReportRequest::CycleStatistics { cycle_id: cycle }, json)
        }
    };

    let mut service = ReportService::new(Arc::new(PgStore::new(pool)));
    let mut worker = None;
    if config.notifications.enabled {
        let (dispatcher, handle) = NotificationDispatcher::spawn(
            Arc::new(LogNotifier),
            config.notifications.recipients.clone(),
            config.notifications.queue_capacity,
        );
        service = service.with_notifications(dispatcher);
        worker = Some(handle);
    }

    let outcome = service.generate(request).await;
    drop(service);

    if let Some(worker) = worker {
        if let Err(e) = worker.await {
            tracing::warn!("Notification worker ended abnormally: {}", e);
        }
    }

    match outcome {
        Ok(report) => print_report(&report, json)?,
        Err(ReportError::NotFound(what)) => println!("Nothing to report: {what} does not exist."),
        Err(ReportError::NoData(why)) => println!("Nothing to report: {why}."),
        Err(err @ ReportError::Persistence(_)) => {
            return Err(err).context("report was not saved");
        }
    }

    info!("Done");
    Ok(())
}

fn print_report(report: &Report, json: bool) -> anyhow::Result<()> {
    println!(
        "Generated {} report {}: {}",
        report.kind.as_str(),
        report.id,
        report.title
    );
    if let Some(mean) = report.overall_mean {
        println!("Overall: {mean:.2}");
    }
    if let (Some(highest), Some(lowest)) = (report.highest, report.lowest) {
        println!("Highest: {highest:.2}, lowest: {lowest:.2}");
    }
    if let Some(file_name) = &report.file_name {
        println!("Suggested export: {file_name}");
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&report.payload)?);
    }
    Ok(())
}
