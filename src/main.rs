use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;

mod chance;
mod db;
mod models;
mod report;

use models::Scheme;

#[derive(Parser)]
#[command(name = "admissions-chance")]
#[command(about = "Admission chance estimator for selective high school programs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import cutoff scores from a CSV file
    ImportCutoffs {
        #[arg(long)]
        csv: PathBuf,
        /// Scheme the rows belong to (se or ib)
        #[arg(long)]
        scheme: String,
    },
    /// Import student profiles from a CSV file
    ImportStudents {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Estimate admission chances for one student
    Chances {
        #[arg(long)]
        email: String,
        /// Restrict evaluation to one scheme (se or ib)
        #[arg(long)]
        scheme: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report for one student
    Report {
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::ImportCutoffs { csv, scheme } => {
            let scheme: Scheme = scheme.parse()?;
            let imported = db::import_cutoffs_csv(&pool, &csv, scheme).await?;
            println!("Imported {imported} {scheme} cutoff rows from {}.", csv.display());
        }
        Commands::ImportStudents { csv } => {
            let imported = db::import_students_csv(&pool, &csv).await?;
            println!("Imported {imported} students from {}.", csv.display());
        }
        Commands::Chances { email, scheme, json } => {
            let scheme = scheme.map(|s| s.parse::<Scheme>()).transpose()?;
            let student = db::fetch_student(&pool, &email).await?;
            let programs = db::fetch_programs(&pool, scheme).await?;
            let se_cutoffs = db::fetch_se_cutoffs(&pool).await?;
            let ib_cutoffs = db::fetch_ib_cutoffs(&pool).await?;
            let results =
                chance::evaluate_programs(&student, &programs, &se_cutoffs, &ib_cutoffs)?;

            if results.is_empty() {
                println!("No programs on file.");
                return Ok(());
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
                return Ok(());
            }

            println!(
                "Admission chances for {} ({}):",
                student.full_name, student.email
            );
            for result in &results {
                match result.points {
                    Some(points) => println!(
                        "- {} at {} [{}]: {} with {points:.0} points",
                        result.program_name, result.school_name, result.scheme, result.chance
                    ),
                    None => println!(
                        "- {} at {} [{}]: {} (profile incomplete)",
                        result.program_name, result.school_name, result.scheme, result.chance
                    ),
                }
            }
        }
        Commands::Report { email, out } => {
            let student = db::fetch_student(&pool, &email).await?;
            let programs = db::fetch_programs(&pool, None).await?;
            let se_cutoffs = db::fetch_se_cutoffs(&pool).await?;
            let ib_cutoffs = db::fetch_ib_cutoffs(&pool).await?;
            let results =
                chance::evaluate_programs(&student, &programs, &se_cutoffs, &ib_cutoffs)?;
            let report = report::build_report(&student, &results, Utc::now().date_naive());
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
