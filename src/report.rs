use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::models::{
    Analysis, Recommendation, StudentProfile, StudentSummary, SubjectLeaders, SubjectRanking,
    SubjectStats,
};

fn student_table(output: &mut String, students: &[StudentSummary]) {
    let _ = writeln!(output, "| Rank | SR.No. | Name | Percentage | Tier |");
    let _ = writeln!(output, "|---:|---|---|---:|---|");
    for student in students {
        let _ = writeln!(
            output,
            "| {} | {} | {} | {:.2}% | {} |",
            student.rank, student.id, student.name, student.percentage, student.tier
        );
    }
}

fn ranking_lines(output: &mut String, rankings: &[SubjectRanking]) {
    for entry in rankings {
        let _ = writeln!(
            output,
            "{:>3}. {} ({}) {:.1} ({:.1}%)",
            entry.rank, entry.name, entry.id, entry.score, entry.percentage
        );
    }
}

pub fn build_report(source: &str, generated_at: DateTime<Utc>, analysis: &Analysis) -> String {
    let insights = &analysis.insights;
    let mut output = String::new();

    let _ = writeln!(output, "# GradeGraph Performance Report");
    let _ = writeln!(
        output,
        "Generated for {} on {}",
        source,
        generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");
    let _ = writeln!(
        output,
        "- {} students across {} subjects",
        insights.summary.students, insights.summary.subjects
    );
    let _ = writeln!(
        output,
        "- Class average {:.2}%, pass rate {:.1}%",
        insights.summary.average_percentage, insights.summary.pass_rate
    );
    for tier in &insights.tier_distribution {
        let _ = writeln!(
            output,
            "- {}: {} ({:.1}%)",
            tier.tier, tier.count, tier.share
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Performers");
    if insights.top_performers.is_empty() {
        let _ = writeln!(output, "No students to rank.");
    } else {
        student_table(&mut output, &insights.top_performers);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Students Needing Attention");
    if insights.at_risk.is_empty() {
        let _ = writeln!(output, "No students below the attention threshold.");
    } else {
        student_table(&mut output, &insights.at_risk);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Subject Difficulty");
    let _ = writeln!(
        output,
        "| Rank | Subject | Class Average | Average % | Fail Rate | Level |"
    );
    let _ = writeln!(output, "|---:|---|---:|---:|---:|---|");
    for subject in &insights.subject_difficulty {
        let _ = writeln!(
            output,
            "| {} | {} | {:.2} / {:.0} | {:.1}% | {:.1}% | {} |",
            subject.difficulty_rank,
            subject.subject,
            subject.average,
            subject.max_score,
            subject.average_percentage,
            subject.fail_rate,
            subject.difficulty
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Subject Leaders");
    for leaders in &insights.subject_leaders {
        let best = leaders.top.first();
        let weakest = leaders.bottom.first();
        if let (Some(best), Some(weakest)) = (best, weakest) {
            let _ = writeln!(
                output,
                "- {}: best {} ({:.1}), weakest {} ({:.1})",
                leaders.subject, best.name, best.score, weakest.name, weakest.score
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recommendations");
    if insights.recommendations.is_empty() {
        let _ = writeln!(output, "No student trails a class average by more than the margin.");
    } else {
        for rec in &insights.recommendations {
            let _ = writeln!(output, "- {}", recommendation_line(rec));
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Cohort Advice");
    if insights.cohort_advice.is_empty() {
        let _ = writeln!(output, "No cohort-level issues found.");
    } else {
        for advice in &insights.cohort_advice {
            let _ = writeln!(
                output,
                "- **{} ({})**: {}. {}.",
                advice.area, advice.priority, advice.finding, advice.action
            );
        }
    }

    output
}

pub fn recommendation_line(rec: &Recommendation) -> String {
    format!(
        "{} ({}) in {}: {:.1} against a class average of {:.1} ({:.1} behind)",
        rec.student_name, rec.student_id, rec.subject, rec.score, rec.class_average, rec.gap
    )
}

/// Class statistics for one subject followed by its best and weakest scorers.
pub fn render_subject(stats: &SubjectStats, leaders: &SubjectLeaders) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "{} ({} students, difficulty rank {}, {})",
        stats.subject, stats.students, stats.difficulty_rank, stats.difficulty
    );
    let _ = writeln!(
        output,
        "Average {:.2} / {:.0} ({:.1}%), min {:.1}, max {:.1}, std dev {:.2}, fail rate {:.1}%",
        stats.average,
        stats.max_score,
        stats.average_percentage,
        stats.min,
        stats.max,
        stats.std_dev,
        stats.fail_rate
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "Top performers:");
    ranking_lines(&mut output, &leaders.top);
    let _ = writeln!(output);
    let _ = writeln!(output, "Need improvement:");
    ranking_lines(&mut output, &leaders.bottom);
    output
}

pub fn render_profile(profile: &StudentProfile) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "{} (SR.No. {})", profile.name, profile.id);
    if let Some(roll_no) = &profile.roll_no {
        let _ = writeln!(output, "Roll No: {roll_no}");
    }
    let _ = writeln!(
        output,
        "Overall {:.2}%, tier {}",
        profile.percentage, profile.tier
    );
    match profile.support_priority {
        Some(priority) => {
            let _ = writeln!(output, "Support priority: {priority}");
        }
        None => {
            let _ = writeln!(output, "Support priority: none");
        }
    }
    let _ = writeln!(output);
    for subject in &profile.subjects {
        let _ = writeln!(
            output,
            "- {}: {:.1} / {:.0} (class average {:.1}){}",
            subject.subject,
            subject.score,
            subject.max_score,
            subject.class_average,
            if subject.incomplete { " [incomplete]" } else { "" }
        );
    }
    if !profile.recommendations.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "Focus areas:");
        for rec in &profile.recommendations {
            let _ = writeln!(output, "- {}", recommendation_line(rec));
        }
    }
    output
}
