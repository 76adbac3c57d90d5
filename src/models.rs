use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

/// Mark used for an offered component that a student has no entry for.
pub const MISSING_COMPONENT_MARK: f64 = 0.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Component {
    #[serde(rename = "ISE")]
    Ise,
    #[serde(rename = "MSE")]
    Mse,
    #[serde(rename = "ESE")]
    Ese,
    Practical,
}

impl Component {
    pub const ALL: [Component; 4] = [
        Component::Ise,
        Component::Mse,
        Component::Ese,
        Component::Practical,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Component::Ise => "ISE",
            Component::Mse => "MSE",
            Component::Ese => "ESE",
            Component::Practical => "Practical",
        }
    }

    /// Accepts the spellings found in exported sheets ("PR", "Prac", "ise").
    pub fn parse(label: &str) -> Option<Component> {
        let key: String = label
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_uppercase();
        match key.as_str() {
            "ISE" => Some(Component::Ise),
            "MSE" => Some(Component::Mse),
            "ESE" => Some(Component::Ese),
            "PRACTICAL" | "PRAC" | "PR" => Some(Component::Practical),
            _ => None,
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Student identifier from the `SR.No.` column.
///
/// Integer ids compare numerically so that row 10 sorts after row 2.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct StudentId(String);

impl StudentId {
    pub fn new(raw: &str) -> Self {
        let trimmed = raw.trim();
        // Spreadsheet exports often write integer serials as "7.0".
        if let Ok(value) = trimmed.parse::<f64>() {
            if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value < 1e15 {
                return Self(format!("{}", value as u64));
            }
        }
        Self(trimmed.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn numeric(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl Ord for StudentId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.numeric(), other.numeric()) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for StudentId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw marks of one student in one subject.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectMarks {
    pub offered: BTreeSet<Component>,
    pub marks: BTreeMap<Component, f64>,
}

impl SubjectMarks {
    pub fn get(&self, component: Component) -> Option<f64> {
        self.marks.get(&component).copied()
    }

    pub fn has_any(&self) -> bool {
        !self.marks.is_empty()
    }

    /// An offered component has no mark.
    pub fn is_incomplete(&self) -> bool {
        self.offered.iter().any(|c| !self.marks.contains_key(c))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentRecord {
    pub id: StudentId,
    pub roll_no: Option<String>,
    pub name: String,
    pub subjects: BTreeMap<String, SubjectMarks>,
}

/// Normalized sheet: every subject the header declares and the students.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Roster {
    pub subjects: BTreeMap<String, BTreeSet<Component>>,
    pub students: Vec<StudentRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectScore {
    pub subject: String,
    pub score: f64,
    pub max_score: f64,
    pub incomplete: bool,
}

impl SubjectScore {
    pub fn percentage(&self) -> f64 {
        if self.max_score > 0.0 {
            self.score / self.max_score * 100.0
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentTotals {
    pub id: StudentId,
    pub name: String,
    pub roll_no: Option<String>,
    pub subject_scores: Vec<SubjectScore>,
    pub total: f64,
    pub max_total: f64,
    pub percentage: f64,
}

impl StudentTotals {
    pub fn score_for(&self, subject: &str) -> Option<&SubjectScore> {
        self.subject_scores.iter().find(|s| s.subject == subject)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Tier {
    Weak,
    Average,
    Bright,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Weak, Tier::Average, Tier::Bright];
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Tier::Weak => "Weak",
            Tier::Average => "Average",
            Tier::Bright => "Bright",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentAggregate {
    #[serde(flatten)]
    pub totals: StudentTotals,
    pub tier: Tier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Difficulty {
    Easy,
    Moderate,
    Difficult,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Difficulty::Easy => "Easy",
            Difficulty::Moderate => "Moderate",
            Difficulty::Difficult => "Difficult",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectStats {
    pub subject: String,
    pub students: usize,
    pub max_score: f64,
    pub average: f64,
    pub average_percentage: f64,
    pub min: f64,
    pub max: f64,
    pub std_dev: f64,
    pub fail_rate: f64,
    pub difficulty: Difficulty,
    /// 1 is the hardest subject.
    pub difficulty_rank: usize,
}

/// One row of a ranked student table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentSummary {
    pub rank: usize,
    pub id: StudentId,
    pub name: String,
    pub percentage: f64,
    pub tier: Tier,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub student_id: StudentId,
    pub student_name: String,
    pub subject: String,
    pub score: f64,
    pub class_average: f64,
    pub gap: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Priority {
    High,
    Medium,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::High => f.write_str("High"),
            Priority::Medium => f.write_str("Medium"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortAdvice {
    pub priority: Priority,
    pub area: String,
    pub finding: String,
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierCount {
    pub tier: Tier,
    pub count: usize,
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortSummary {
    pub students: usize,
    pub subjects: usize,
    pub average_percentage: f64,
    pub pass_rate: f64,
}

/// One student's place in a single subject.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectRanking {
    pub rank: usize,
    pub id: StudentId,
    pub name: String,
    pub score: f64,
    pub percentage: f64,
}

/// Highest and lowest scorers in one subject.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectLeaders {
    pub subject: String,
    pub top: Vec<SubjectRanking>,
    pub bottom: Vec<SubjectRanking>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insights {
    pub summary: CohortSummary,
    pub tier_distribution: Vec<TierCount>,
    pub top_performers: Vec<StudentSummary>,
    pub at_risk: Vec<StudentSummary>,
    pub subject_difficulty: Vec<SubjectStats>,
    pub subject_leaders: Vec<SubjectLeaders>,
    pub recommendations: Vec<Recommendation>,
    pub cohort_advice: Vec<CohortAdvice>,
}

/// Everything one pipeline run produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub students: Vec<StudentAggregate>,
    pub subjects: Vec<SubjectStats>,
    pub insights: Insights,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectComparison {
    pub subject: String,
    pub score: f64,
    pub max_score: f64,
    pub class_average: f64,
    pub incomplete: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentProfile {
    pub id: StudentId,
    pub name: String,
    pub roll_no: Option<String>,
    pub percentage: f64,
    pub tier: Tier,
    pub support_priority: Option<Priority>,
    pub subjects: Vec<SubjectComparison>,
    pub recommendations: Vec<Recommendation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_aliases_resolve() {
        assert_eq!(Component::parse("ISE"), Some(Component::Ise));
        assert_eq!(Component::parse(" mse "), Some(Component::Mse));
        assert_eq!(Component::parse("E.S.E"), Some(Component::Ese));
        assert_eq!(Component::parse("PR"), Some(Component::Practical));
        assert_eq!(Component::parse("Practical"), Some(Component::Practical));
        assert_eq!(Component::parse("TW"), None);
    }

    #[test]
    fn student_ids_sort_numerically() {
        let mut ids = vec![
            StudentId::new("10"),
            StudentId::new("2"),
            StudentId::new("A7"),
            StudentId::new("1.0"),
        ];
        ids.sort();
        let ordered: Vec<&str> = ids.iter().map(StudentId::as_str).collect();
        assert_eq!(ordered, vec!["1", "2", "10", "A7"]);
    }

    #[test]
    fn incomplete_when_offered_component_missing() {
        let marks = SubjectMarks {
            offered: Component::ALL.into_iter().collect(),
            marks: [(Component::Ise, 10.0), (Component::Ese, 40.0)]
                .into_iter()
                .collect(),
        };
        assert!(marks.has_any());
        assert!(marks.is_incomplete());
        assert_eq!(marks.get(Component::Mse), None);
    }
}
