use std::io::Read;
use std::path::Path;

use tracing::{info, instrument};

use crate::aggregator::{aggregate_students, subject_stats};
use crate::classifier::classify_students;
use crate::config::Config;
use crate::error::Result;
use crate::insights::build_insights;
use crate::loader::{load_sheet, read_sheet, Sheet};
use crate::models::Analysis;
use crate::normalizer::normalize;

#[instrument(skip(config), fields(sheet = %path.display()))]
pub fn analyze_file(path: &Path, config: &Config) -> Result<Analysis> {
    let sheet = load_sheet(path)?;
    analyze_sheet(&sheet, config)
}

pub fn analyze_reader<R: Read>(reader: R, config: &Config) -> Result<Analysis> {
    let sheet = read_sheet(reader)?;
    analyze_sheet(&sheet, config)
}

pub fn analyze_sheet(sheet: &Sheet, config: &Config) -> Result<Analysis> {
    let roster = normalize(sheet, &config.scheme)?;
    let totals = aggregate_students(&roster, &config.scheme)?;
    let subjects = subject_stats(&roster, &totals, config)?;
    let students = classify_students(totals, &config.tiers);
    let insights = build_insights(&students, &subjects, config);

    info!(
        students = students.len(),
        at_risk = insights.at_risk.len(),
        recommendations = insights.recommendations.len(),
        "analysis complete"
    );

    Ok(Analysis {
        students,
        subjects,
        insights,
    })
}
