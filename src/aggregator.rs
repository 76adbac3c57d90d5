use tracing::{info, warn};

use crate::config::{Config, MarkScheme};
use crate::error::{GradeError, Result};
use crate::models::{
    Difficulty, Roster, StudentRecord, StudentTotals, SubjectMarks, SubjectScore, SubjectStats,
    MISSING_COMPONENT_MARK,
};

/// Weighted total of the components a subject offers.
pub fn subject_score(subject: &str, marks: &SubjectMarks, scheme: &MarkScheme) -> SubjectScore {
    let score = marks
        .offered
        .iter()
        .map(|c| scheme.weight(*c) * marks.get(*c).unwrap_or(MISSING_COMPONENT_MARK))
        .sum();
    SubjectScore {
        subject: subject.to_string(),
        score,
        max_score: scheme.max_score(&marks.offered),
        incomplete: marks.is_incomplete(),
    }
}

pub fn student_totals(student: &StudentRecord, scheme: &MarkScheme) -> Result<StudentTotals> {
    let subject_scores: Vec<SubjectScore> = student
        .subjects
        .iter()
        .filter(|(_, marks)| marks.has_any())
        .map(|(subject, marks)| subject_score(subject, marks, scheme))
        .collect();

    if subject_scores.is_empty() {
        return Err(GradeError::insufficient(format!(
            "student {} ({}) has no marks in any subject",
            student.id, student.name
        )));
    }
    if let Some(score) = subject_scores.iter().find(|s| s.max_score <= 0.0) {
        return Err(GradeError::insufficient(format!(
            "{} has no reachable marks under the configured weights",
            score.subject
        )));
    }
    let max_total: f64 = subject_scores.iter().map(|s| s.max_score).sum();

    for score in subject_scores.iter().filter(|s| s.incomplete) {
        warn!(
            student = %student.id,
            subject = %score.subject,
            "missing components counted as {MISSING_COMPONENT_MARK}"
        );
    }

    let total: f64 = subject_scores.iter().map(|s| s.score).sum();
    Ok(StudentTotals {
        id: student.id.clone(),
        name: student.name.clone(),
        roll_no: student.roll_no.clone(),
        subject_scores,
        total,
        max_total,
        percentage: (total / max_total * 100.0).clamp(0.0, 100.0),
    })
}

pub fn aggregate_students(roster: &Roster, scheme: &MarkScheme) -> Result<Vec<StudentTotals>> {
    if roster.students.is_empty() {
        return Err(GradeError::insufficient("the sheet has no student rows"));
    }
    roster
        .students
        .iter()
        .map(|student| student_totals(student, scheme))
        .collect()
}

pub fn difficulty_level(average_percentage: f64, config: &Config) -> Difficulty {
    match average_percentage {
        p if p >= config.insights.easy_average => Difficulty::Easy,
        p if p >= config.insights.moderate_average => Difficulty::Moderate,
        _ => Difficulty::Difficult,
    }
}

/// Class statistics per subject, ranked hardest first.
pub fn subject_stats(
    roster: &Roster,
    students: &[StudentTotals],
    config: &Config,
) -> Result<Vec<SubjectStats>> {
    let mut stats = Vec::with_capacity(roster.subjects.len());

    for subject in roster.subjects.keys() {
        let scores: Vec<&SubjectScore> = students
            .iter()
            .filter_map(|student| student.score_for(subject))
            .collect();
        if scores.is_empty() {
            return Err(GradeError::insufficient(format!(
                "no student has marks in {subject}"
            )));
        }

        let max_score = config.scheme.max_score(&roster.subjects[subject]);
        if max_score <= 0.0 {
            return Err(GradeError::insufficient(format!(
                "{subject} has no reachable marks under the configured weights"
            )));
        }

        let count = scores.len() as f64;
        let average = scores.iter().map(|s| s.score).sum::<f64>() / count;
        let variance = scores
            .iter()
            .map(|s| (s.score - average).powi(2))
            .sum::<f64>()
            / count;
        let min = scores.iter().map(|s| s.score).fold(f64::INFINITY, f64::min);
        let max = scores.iter().map(|s| s.score).fold(f64::NEG_INFINITY, f64::max);
        let failing = scores
            .iter()
            .filter(|s| s.percentage() < config.insights.pass_mark)
            .count();
        let average_percentage = average / max_score * 100.0;

        stats.push(SubjectStats {
            subject: subject.clone(),
            students: scores.len(),
            max_score,
            average,
            average_percentage,
            min,
            max,
            std_dev: variance.sqrt(),
            fail_rate: failing as f64 / count * 100.0,
            difficulty: difficulty_level(average_percentage, config),
            difficulty_rank: 0,
        });
    }

    sort_by_difficulty(&mut stats);
    for (index, entry) in stats.iter_mut().enumerate() {
        entry.difficulty_rank = index + 1;
    }

    info!(subjects = stats.len(), "subject statistics computed");
    Ok(stats)
}

/// Ascending class average, ties by subject name.
pub fn sort_by_difficulty(stats: &mut [SubjectStats]) {
    stats.sort_by(|a, b| {
        a.average
            .total_cmp(&b.average)
            .then_with(|| a.subject.cmp(&b.subject))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::read_sheet;
    use crate::models::Component;
    use crate::normalizer::normalize;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn roster(text: &str) -> Roster {
        normalize(&read_sheet(text.as_bytes()).unwrap(), &MarkScheme::default()).unwrap()
    }

    const THREE_STUDENTS: &str = "\
SR.No.,Name,Maths,,,
,,ISE,MSE,ESE,Practical
1,Asha,10,10,10,10
2,Bala,10,10,10,10
3,Chitra,5,5,5,5
";

    #[test]
    fn lowest_marks_give_lowest_percentage() {
        let roster = roster(THREE_STUDENTS);
        let totals = aggregate_students(&roster, &MarkScheme::default()).unwrap();
        assert_eq!(totals[0].total, 40.0);
        assert_eq!(totals[2].total, 20.0);
        assert!((totals[2].percentage - 20.0 / 135.0 * 100.0).abs() < 1e-9);
        assert!(totals[2].percentage < totals[0].percentage);
    }

    #[test]
    fn class_average_is_mean_of_subject_scores() {
        let roster = roster(THREE_STUDENTS);
        let config = Config::default();
        let totals = aggregate_students(&roster, &config.scheme).unwrap();
        let stats = subject_stats(&roster, &totals, &config).unwrap();
        assert_eq!(stats.len(), 1);
        assert!((stats[0].average - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats[0].min, 20.0);
        assert_eq!(stats[0].max, 40.0);
        assert_eq!(stats[0].difficulty_rank, 1);
        assert_eq!(stats[0].fail_rate, 100.0);
        assert_eq!(stats[0].difficulty, Difficulty::Difficult);
    }

    #[test]
    fn weights_scale_components() {
        let mut scheme = MarkScheme::default();
        scheme.weights.ese = 2.0;
        let marks = SubjectMarks {
            offered: [Component::Mse, Component::Ese].into_iter().collect(),
            marks: [(Component::Mse, 20.0), (Component::Ese, 30.0)]
                .into_iter()
                .collect(),
        };
        let score = subject_score("Maths", &marks, &scheme);
        assert_eq!(score.score, 80.0);
        assert_eq!(score.max_score, 25.0 + 120.0);
        assert!(!score.incomplete);
    }

    #[test]
    fn missing_subject_leaves_denominator() {
        let roster = roster(
            "SR.No.,Name,Maths,Physics\n\
             ,,ESE,ESE\n\
             1,Asha,30,\n\
             2,Bala,60,60\n",
        );
        let totals = aggregate_students(&roster, &MarkScheme::default()).unwrap();
        assert_eq!(totals[0].max_total, 60.0);
        assert_eq!(totals[0].percentage, 50.0);
        assert_eq!(totals[0].subject_scores.len(), 1);
    }

    #[test]
    fn missing_component_counts_as_zero_and_flags() {
        let roster = roster("SR.No.,Name,Maths,\n,,ISE,ESE\n1,Asha,25,\n");
        let totals = aggregate_students(&roster, &MarkScheme::default()).unwrap();
        let maths = totals[0].score_for("Maths").unwrap();
        assert_eq!(maths.score, 25.0);
        assert_eq!(maths.max_score, 85.0);
        assert!(maths.incomplete);
    }

    #[test]
    fn student_without_any_subject_is_insufficient() {
        let roster = roster("SR.No.,Name,Maths,Physics\n,,ESE,ESE\n1,Asha,AB,\n2,Bala,10,10\n");
        let err = aggregate_students(&roster, &MarkScheme::default()).unwrap_err();
        assert!(matches!(err, GradeError::InsufficientData(_)));
        assert!(err.to_string().contains("Asha"));
    }

    #[test]
    fn subject_nobody_sat_is_insufficient() {
        let roster = roster("SR.No.,Name,Maths,Physics\n,,ESE,ESE\n1,Asha,10,\n2,Bala,20,\n");
        let config = Config::default();
        let totals = aggregate_students(&roster, &config.scheme).unwrap();
        let err = subject_stats(&roster, &totals, &config).unwrap_err();
        assert!(err.to_string().contains("Physics"));
    }

    #[test]
    fn subject_worth_nothing_is_insufficient() {
        let roster = roster("SR.No.,Name,Maths,Lab\n,,ESE,ISE\n1,Asha,40,20\n2,Bala,30,15\n");
        let mut scheme = MarkScheme::default();
        scheme.weights.ise = 0.0;
        let err = aggregate_students(&roster, &scheme).unwrap_err();
        assert!(matches!(err, GradeError::InsufficientData(_)));
        assert!(err.to_string().contains("Lab"));
    }

    #[test]
    fn stats_refuse_a_subject_worth_nothing() {
        let roster = roster("SR.No.,Name,Maths,Lab\n,,ESE,ISE\n1,Asha,40,20\n2,Bala,30,15\n");
        let totals = aggregate_students(&roster, &MarkScheme::default()).unwrap();
        let mut config = Config::default();
        config.scheme.weights.ise = 0.0;
        let err = subject_stats(&roster, &totals, &config).unwrap_err();
        assert!(matches!(err, GradeError::InsufficientData(_)));
        assert!(err.to_string().contains("Lab"));
    }

    #[test]
    fn empty_roster_is_insufficient() {
        let roster = Roster {
            subjects: BTreeMap::new(),
            students: Vec::new(),
        };
        assert!(aggregate_students(&roster, &MarkScheme::default()).is_err());
    }

    #[test]
    fn subjects_rank_hardest_first() {
        let roster = roster(
            "SR.No.,Name,Maths,Physics,Biology\n\
             ,,ESE,ESE,ESE\n\
             1,Asha,50,20,20\n\
             2,Bala,40,30,30\n",
        );
        let config = Config::default();
        let totals = aggregate_students(&roster, &config.scheme).unwrap();
        let stats = subject_stats(&roster, &totals, &config).unwrap();
        let order: Vec<(&str, usize)> = stats
            .iter()
            .map(|s| (s.subject.as_str(), s.difficulty_rank))
            .collect();
        assert_eq!(order, vec![("Biology", 1), ("Physics", 2), ("Maths", 3)]);
        assert_eq!(stats[2].difficulty, Difficulty::Easy);
    }

    proptest! {
        #[test]
        fn percentage_stays_in_bounds(
            marks in proptest::collection::vec(
                (proptest::option::of(0.0f64..=25.0), proptest::option::of(0.0f64..=60.0)),
                1..6,
            ),
            ise_weight in 0.0f64..3.0,
            ese_weight in 0.0f64..3.0,
        ) {
            let mut scheme = MarkScheme::default();
            scheme.weights.ise = ise_weight;
            scheme.weights.ese = ese_weight + 0.01;
            let offered: std::collections::BTreeSet<Component> =
                [Component::Ise, Component::Ese].into_iter().collect();
            let subjects: BTreeMap<String, SubjectMarks> = marks
                .iter()
                .enumerate()
                .map(|(i, (ise, ese))| {
                    let mut entered = BTreeMap::new();
                    if let Some(v) = ise { entered.insert(Component::Ise, *v); }
                    // every subject keeps at least one mark
                    entered.insert(Component::Ese, ese.unwrap_or(0.0));
                    (format!("Subject {i}"), SubjectMarks { offered: offered.clone(), marks: entered })
                })
                .collect();
            let student = StudentRecord {
                id: crate::models::StudentId::new("1"),
                roll_no: None,
                name: "Asha".to_string(),
                subjects,
            };
            let totals = student_totals(&student, &scheme).unwrap();
            prop_assert!((0.0..=100.0).contains(&totals.percentage));
        }
    }
}
