use std::collections::BTreeMap;

use crate::config::Config;
use crate::models::{
    CohortAdvice, CohortSummary, Difficulty, Insights, Priority, Recommendation, StudentAggregate,
    StudentId, StudentProfile, StudentSummary, SubjectComparison, SubjectLeaders, SubjectRanking,
    SubjectScore, SubjectStats, Tier, TierCount,
};

fn summarize<'a>(ranked: impl IntoIterator<Item = &'a StudentAggregate>) -> Vec<StudentSummary> {
    ranked
        .into_iter()
        .enumerate()
        .map(|(index, student)| StudentSummary {
            rank: index + 1,
            id: student.totals.id.clone(),
            name: student.totals.name.clone(),
            percentage: student.totals.percentage,
            tier: student.tier,
        })
        .collect()
}

/// Highest percentage first, ties by id, at most `limit` entries.
pub fn top_performers(students: &[StudentAggregate], limit: usize) -> Vec<StudentSummary> {
    let mut ranked: Vec<&StudentAggregate> = students.iter().collect();
    ranked.sort_by(|a, b| {
        b.totals
            .percentage
            .total_cmp(&a.totals.percentage)
            .then_with(|| a.totals.id.cmp(&b.totals.id))
    });
    summarize(ranked.into_iter().take(limit))
}

/// Students below the attention threshold, most at risk first.
pub fn at_risk(students: &[StudentAggregate], attention_threshold: f64) -> Vec<StudentSummary> {
    let mut flagged: Vec<&StudentAggregate> = students
        .iter()
        .filter(|s| s.totals.percentage < attention_threshold)
        .collect();
    flagged.sort_by(|a, b| {
        a.totals
            .percentage
            .total_cmp(&b.totals.percentage)
            .then_with(|| a.totals.id.cmp(&b.totals.id))
    });
    summarize(flagged)
}

pub fn subject_difficulty(stats: &[SubjectStats]) -> Vec<SubjectStats> {
    let mut ordered = stats.to_vec();
    crate::aggregator::sort_by_difficulty(&mut ordered);
    ordered
}

fn subject_rankings(
    scored: &[(&StudentAggregate, &SubjectScore)],
    limit: usize,
) -> Vec<SubjectRanking> {
    scored
        .iter()
        .take(limit)
        .enumerate()
        .map(|(index, (student, score))| SubjectRanking {
            rank: index + 1,
            id: student.totals.id.clone(),
            name: student.totals.name.clone(),
            score: score.score,
            percentage: score.percentage(),
        })
        .collect()
}

/// Best and weakest `limit` scorers in one subject, ties by id.
/// `None` when no student has the subject.
pub fn subject_leaders(
    students: &[StudentAggregate],
    subject: &str,
    limit: usize,
) -> Option<SubjectLeaders> {
    let mut scored: Vec<(&StudentAggregate, &SubjectScore)> = students
        .iter()
        .filter_map(|student| student.totals.score_for(subject).map(|score| (student, score)))
        .collect();
    if scored.is_empty() {
        return None;
    }

    scored.sort_by(|a, b| {
        b.1.score
            .total_cmp(&a.1.score)
            .then_with(|| a.0.totals.id.cmp(&b.0.totals.id))
    });
    let top = subject_rankings(&scored, limit);

    scored.sort_by(|a, b| {
        a.1.score
            .total_cmp(&b.1.score)
            .then_with(|| a.0.totals.id.cmp(&b.0.totals.id))
    });
    let bottom = subject_rankings(&scored, limit);

    Some(SubjectLeaders {
        subject: subject.to_string(),
        top,
        bottom,
    })
}

/// Subjects where a student trails the class average by more than `margin` marks.
pub fn recommendations(
    students: &[StudentAggregate],
    stats: &[SubjectStats],
    margin: f64,
) -> Vec<Recommendation> {
    let averages: BTreeMap<&str, f64> = stats
        .iter()
        .map(|s| (s.subject.as_str(), s.average))
        .collect();

    let mut ordered: Vec<&StudentAggregate> = students.iter().collect();
    ordered.sort_by(|a, b| a.totals.id.cmp(&b.totals.id));

    let mut records = Vec::new();
    for student in ordered {
        // subject_scores come out of a BTreeMap, already sorted by subject
        for score in &student.totals.subject_scores {
            let Some(&class_average) = averages.get(score.subject.as_str()) else {
                continue;
            };
            let gap = class_average - score.score;
            if gap > margin {
                records.push(Recommendation {
                    student_id: student.totals.id.clone(),
                    student_name: student.totals.name.clone(),
                    subject: score.subject.clone(),
                    score: score.score,
                    class_average,
                    gap,
                });
            }
        }
    }
    records
}

pub fn tier_distribution(students: &[StudentAggregate]) -> Vec<TierCount> {
    let total = students.len();
    Tier::ALL
        .into_iter()
        .map(|tier| {
            let count = students.iter().filter(|s| s.tier == tier).count();
            TierCount {
                tier,
                count,
                share: if total == 0 {
                    0.0
                } else {
                    count as f64 / total as f64 * 100.0
                },
            }
        })
        .collect()
}

pub fn cohort_summary(students: &[StudentAggregate], subjects: usize, pass_mark: f64) -> CohortSummary {
    let count = students.len();
    let (average_percentage, pass_rate) = if count == 0 {
        (0.0, 0.0)
    } else {
        let sum: f64 = students.iter().map(|s| s.totals.percentage).sum();
        let passed = students
            .iter()
            .filter(|s| s.totals.percentage >= pass_mark)
            .count();
        (sum / count as f64, passed as f64 / count as f64 * 100.0)
    };
    CohortSummary {
        students: count,
        subjects,
        average_percentage,
        pass_rate,
    }
}

pub fn cohort_advice(
    summary: &CohortSummary,
    distribution: &[TierCount],
    difficulty: &[SubjectStats],
    config: &Config,
) -> Vec<CohortAdvice> {
    let mut advice = Vec::new();

    if let Some(weak) = distribution.iter().find(|t| t.tier == Tier::Weak) {
        if weak.share > config.insights.weak_share_alert {
            advice.push(CohortAdvice {
                priority: Priority::High,
                area: "Academic Support".to_string(),
                finding: format!(
                    "{} students ({:.1}%) are in the Weak tier",
                    weak.count, weak.share
                ),
                action: "Run remedial classes and pair weak students with peer tutors".to_string(),
            });
        }
    }

    if let Some(hardest) = difficulty
        .iter()
        .find(|s| s.difficulty == Difficulty::Difficult)
    {
        advice.push(CohortAdvice {
            priority: Priority::High,
            area: "Curriculum".to_string(),
            finding: format!(
                "{} has the lowest class average ({:.1} of {:.0} marks)",
                hardest.subject, hardest.average, hardest.max_score
            ),
            action: "Review the teaching approach and add practice material".to_string(),
        });
    }

    if summary.students > 0 && summary.pass_rate < config.insights.pass_rate_target {
        advice.push(CohortAdvice {
            priority: Priority::High,
            area: "Pass Rate".to_string(),
            finding: format!(
                "pass rate is {:.1}%, below the {:.0}% target",
                summary.pass_rate, config.insights.pass_rate_target
            ),
            action: "Set up early-warning check-ins before the end-semester exam".to_string(),
        });
    }

    advice
}

pub fn support_priority(tier: Tier) -> Option<Priority> {
    match tier {
        Tier::Weak => Some(Priority::High),
        Tier::Average => Some(Priority::Medium),
        Tier::Bright => None,
    }
}

pub fn student_profile(
    students: &[StudentAggregate],
    stats: &[SubjectStats],
    id: &StudentId,
    config: &Config,
) -> Option<StudentProfile> {
    let student = students.iter().find(|s| &s.totals.id == id)?;
    let subjects = student
        .totals
        .subject_scores
        .iter()
        .map(|score| SubjectComparison {
            subject: score.subject.clone(),
            score: score.score,
            max_score: score.max_score,
            class_average: stats
                .iter()
                .find(|s| s.subject == score.subject)
                .map(|s| s.average)
                .unwrap_or(score.score),
            incomplete: score.incomplete,
        })
        .collect();

    Some(StudentProfile {
        id: student.totals.id.clone(),
        name: student.totals.name.clone(),
        roll_no: student.totals.roll_no.clone(),
        percentage: student.totals.percentage,
        tier: student.tier,
        support_priority: support_priority(student.tier),
        subjects,
        recommendations: recommendations(
            std::slice::from_ref(student),
            stats,
            config.insights.recommendation_margin,
        ),
    })
}

pub fn build_insights(
    students: &[StudentAggregate],
    stats: &[SubjectStats],
    config: &Config,
) -> Insights {
    let summary = cohort_summary(students, stats.len(), config.insights.pass_mark);
    let tier_distribution = tier_distribution(students);
    let subject_difficulty = subject_difficulty(stats);
    let cohort_advice = cohort_advice(&summary, &tier_distribution, &subject_difficulty, config);
    let subject_leaders = subject_difficulty
        .iter()
        .filter_map(|s| subject_leaders(students, &s.subject, config.insights.subject_top_n))
        .collect();

    Insights {
        top_performers: top_performers(students, config.insights.top_n),
        at_risk: at_risk(students, config.attention_threshold()),
        recommendations: recommendations(
            students,
            stats,
            config.insights.recommendation_margin,
        ),
        summary,
        tier_distribution,
        subject_difficulty,
        subject_leaders,
        cohort_advice,
    }
}
