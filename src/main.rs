use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod aggregator;
mod classifier;
mod config;
mod error;
mod insights;
mod loader;
mod models;
mod normalizer;
mod pipeline;
mod report;

use crate::config::Config;
use crate::models::{Analysis, StudentId};

#[derive(Parser)]
#[command(name = "gradegraph")]
#[command(about = "Classify students from a marks sheet and surface class insights", long_about = None)]
struct Cli {
    /// TOML file overriding weights, maximum marks and thresholds
    #[arg(long, global = true, env = "GRADEGRAPH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportFormat {
    Markdown,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Print tiers, top performers, at-risk students and subject difficulty
    Analyze {
        sheet: PathBuf,
        /// Override the configured number of top performers
        #[arg(long)]
        limit: Option<usize>,
        /// Print the full analysis as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write a report file
    Report {
        sheet: PathBuf,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
        #[arg(long, value_enum, default_value_t = ReportFormat::Markdown)]
        format: ReportFormat,
    },
    /// Show one student's subject breakdown and focus areas
    Student {
        sheet: PathBuf,
        #[arg(long)]
        id: String,
    },
    /// Show one subject's statistics with its best and weakest scorers
    Subject {
        sheet: PathBuf,
        /// Subject name as written in the sheet header (case-insensitive)
        #[arg(long)]
        name: String,
    },
    /// List subjects where students trail the class average
    Recommend {
        sheet: PathBuf,
        #[arg(long)]
        id: Option<String>,
    },
    /// Print the effective configuration as TOML
    Config,
}

/// Runs the pipeline on a sheet path, or on stdin when the path is `-`.
fn run_pipeline(sheet: &Path, config: &Config) -> anyhow::Result<Analysis> {
    let result = if sheet == Path::new("-") {
        pipeline::analyze_reader(std::io::stdin().lock(), config)
    } else {
        pipeline::analyze_file(sheet, config)
    };
    result.with_context(|| format!("failed to analyze {}", sheet.display()))
}

fn print_analysis(analysis: &Analysis) {
    let insights = &analysis.insights;
    println!(
        "{} students, {} subjects, class average {:.2}%, pass rate {:.1}%",
        insights.summary.students,
        insights.summary.subjects,
        insights.summary.average_percentage,
        insights.summary.pass_rate
    );
    for tier in &insights.tier_distribution {
        println!("  {}: {} ({:.1}%)", tier.tier, tier.count, tier.share);
    }

    println!();
    println!("Top performers:");
    for student in &insights.top_performers {
        println!(
            "{:>3}. {} ({}) {:.2}% {}",
            student.rank, student.name, student.id, student.percentage, student.tier
        );
    }

    println!();
    if insights.at_risk.is_empty() {
        println!("No students need attention.");
    } else {
        println!("Students needing attention:");
        for student in &insights.at_risk {
            println!(
                "{:>3}. {} ({}) {:.2}%",
                student.rank, student.name, student.id, student.percentage
            );
        }
    }

    println!();
    println!("Subject difficulty (hardest first):");
    for subject in &insights.subject_difficulty {
        println!(
            "{:>3}. {} average {:.2}/{:.0}, fail rate {:.1}% [{}]",
            subject.difficulty_rank,
            subject.subject,
            subject.average,
            subject.max_score,
            subject.fail_rate,
            subject.difficulty
        );
    }

    if !insights.cohort_advice.is_empty() {
        println!();
        println!("Cohort advice:");
        for advice in &insights.cohort_advice {
            println!("- [{}] {}: {}", advice.priority, advice.area, advice.finding);
            println!("  {}", advice.action);
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Commands::Analyze { sheet, limit, json } => {
            if let Some(limit) = limit {
                config.insights.top_n = limit;
            }
            let analysis = run_pipeline(&sheet, &config)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&analysis)?);
            } else {
                print_analysis(&analysis);
            }
        }
        Commands::Report { sheet, out, format } => {
            let analysis = run_pipeline(&sheet, &config)?;
            let body = match format {
                ReportFormat::Markdown => report::build_report(
                    &sheet.display().to_string(),
                    chrono::Utc::now(),
                    &analysis,
                ),
                ReportFormat::Json => serde_json::to_string_pretty(&analysis)?,
            };
            std::fs::write(&out, body)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Student { sheet, id } => {
            let analysis = run_pipeline(&sheet, &config)?;
            let id = StudentId::new(&id);
            let Some(profile) =
                insights::student_profile(&analysis.students, &analysis.subjects, &id, &config)
            else {
                bail!("no student with SR.No. {id} in {}", sheet.display());
            };
            print!("{}", report::render_profile(&profile));
        }
        Commands::Subject { sheet, name } => {
            let analysis = run_pipeline(&sheet, &config)?;
            let Some(stats) = analysis
                .subjects
                .iter()
                .find(|s| s.subject.eq_ignore_ascii_case(name.trim()))
            else {
                bail!("no subject named `{name}` in {}", sheet.display());
            };
            let Some(leaders) = analysis
                .insights
                .subject_leaders
                .iter()
                .find(|l| l.subject == stats.subject)
            else {
                bail!("no student has marks in {}", stats.subject);
            };
            print!("{}", report::render_subject(stats, leaders));
        }
        Commands::Recommend { sheet, id } => {
            let analysis = run_pipeline(&sheet, &config)?;
            let wanted = id.as_deref().map(StudentId::new);
            let records: Vec<_> = analysis
                .insights
                .recommendations
                .iter()
                .filter(|rec| wanted.as_ref().map_or(true, |id| &rec.student_id == id))
                .collect();
            if records.is_empty() {
                println!("No recommendations.");
            }
            for rec in records {
                println!("- {}", report::recommendation_line(rec));
            }
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}
