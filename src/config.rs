use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{GradeError, Result};
use crate::models::Component;

/// One value per mark component.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerComponent {
    pub ise: f64,
    pub mse: f64,
    pub ese: f64,
    pub practical: f64,
}

impl PerComponent {
    pub fn get(&self, component: Component) -> f64 {
        match component {
            Component::Ise => self.ise,
            Component::Mse => self.mse,
            Component::Ese => self.ese,
            Component::Practical => self.practical,
        }
    }
}

fn default_weights() -> PerComponent {
    PerComponent {
        ise: 1.0,
        mse: 1.0,
        ese: 1.0,
        practical: 1.0,
    }
}

// Grading scale of the departmental mark sheets: ESE out of 60, the rest out of 25.
fn default_max_marks() -> PerComponent {
    PerComponent {
        ise: 25.0,
        mse: 25.0,
        ese: 60.0,
        practical: 25.0,
    }
}

/// A `[scheme.weights]` or `[scheme.max_marks]` table as written; absent keys stay `None`.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct PartialPerComponent {
    ise: Option<f64>,
    mse: Option<f64>,
    ese: Option<f64>,
    practical: Option<f64>,
}

impl PartialPerComponent {
    fn over(self, base: PerComponent) -> PerComponent {
        PerComponent {
            ise: self.ise.unwrap_or(base.ise),
            mse: self.mse.unwrap_or(base.mse),
            ese: self.ese.unwrap_or(base.ese),
            practical: self.practical.unwrap_or(base.practical),
        }
    }
}

fn weights_over_defaults<'de, D>(deserializer: D) -> std::result::Result<PerComponent, D::Error>
where
    D: Deserializer<'de>,
{
    PartialPerComponent::deserialize(deserializer).map(|table| table.over(default_weights()))
}

fn max_marks_over_defaults<'de, D>(deserializer: D) -> std::result::Result<PerComponent, D::Error>
where
    D: Deserializer<'de>,
{
    PartialPerComponent::deserialize(deserializer).map(|table| table.over(default_max_marks()))
}

/// How raw component marks turn into a subject score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkScheme {
    #[serde(default = "default_weights", deserialize_with = "weights_over_defaults")]
    pub weights: PerComponent,
    #[serde(default = "default_max_marks", deserialize_with = "max_marks_over_defaults")]
    pub max_marks: PerComponent,
}

impl Default for MarkScheme {
    fn default() -> Self {
        Self {
            weights: default_weights(),
            max_marks: default_max_marks(),
        }
    }
}

impl MarkScheme {
    pub fn weight(&self, component: Component) -> f64 {
        self.weights.get(component)
    }

    pub fn max_mark(&self, component: Component) -> f64 {
        self.max_marks.get(component)
    }

    /// Highest subject score reachable with the given components.
    pub fn max_score<'a>(&self, components: impl IntoIterator<Item = &'a Component>) -> f64 {
        components
            .into_iter()
            .map(|c| self.weight(*c) * self.max_mark(*c))
            .sum()
    }

    fn validate(&self) -> Result<()> {
        for component in Component::ALL {
            let weight = self.weight(component);
            if !weight.is_finite() || weight < 0.0 {
                return Err(GradeError::config(format!(
                    "{component} weight must be a non-negative number, got {weight}"
                )));
            }
            let max = self.max_mark(component);
            if !max.is_finite() || max <= 0.0 {
                return Err(GradeError::config(format!(
                    "{component} max marks must be positive, got {max}"
                )));
            }
        }
        if self.max_score(Component::ALL.iter()) <= 0.0 {
            return Err(GradeError::config(
                "at least one component needs a positive weight",
            ));
        }
        Ok(())
    }
}

/// Percentage cutoffs between tiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub low: f64,
    pub high: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            low: 40.0,
            high: 75.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightSettings {
    pub top_n: usize,
    /// Length of the best and weakest lists per subject.
    pub subject_top_n: usize,
    /// Students below this percentage are at risk. Defaults to the Weak cutoff.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attention_threshold: Option<f64>,
    /// Marks below the class average before a subject is recommended.
    pub recommendation_margin: f64,
    pub pass_mark: f64,
    pub pass_rate_target: f64,
    /// Weak share of the cohort, in percent, that triggers an alert.
    pub weak_share_alert: f64,
    pub easy_average: f64,
    pub moderate_average: f64,
}

impl Default for InsightSettings {
    fn default() -> Self {
        Self {
            top_n: 10,
            subject_top_n: 10,
            attention_threshold: None,
            recommendation_margin: 5.0,
            pass_mark: 40.0,
            pass_rate_target: 80.0,
            weak_share_alert: 30.0,
            easy_average: 60.0,
            moderate_average: 40.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scheme: MarkScheme,
    pub tiers: Thresholds,
    pub insights: InsightSettings,
}

impl Config {
    /// Reads a TOML file, falling back to defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        };
        let text = std::fs::read_to_string(path).map_err(|err| {
            GradeError::config(format!("cannot read {}: {err}", path.display()))
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(text).map_err(|err| GradeError::config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|err| GradeError::config(err.to_string()))
    }

    pub fn attention_threshold(&self) -> f64 {
        self.insights.attention_threshold.unwrap_or(self.tiers.low)
    }

    pub fn validate(&self) -> Result<()> {
        self.scheme.validate()?;

        let Thresholds { low, high } = self.tiers;
        check_percentage("tiers.low", low)?;
        check_percentage("tiers.high", high)?;
        if low > high {
            return Err(GradeError::config(format!(
                "tiers.low ({low}) must not exceed tiers.high ({high})"
            )));
        }

        let insights = &self.insights;
        let attention = self.attention_threshold();
        check_percentage("insights.attention_threshold", attention)?;
        if attention < low {
            return Err(GradeError::config(format!(
                "insights.attention_threshold ({attention}) must be at least tiers.low ({low})"
            )));
        }
        if !insights.recommendation_margin.is_finite() || insights.recommendation_margin < 0.0 {
            return Err(GradeError::config(
                "insights.recommendation_margin must be non-negative",
            ));
        }
        check_percentage("insights.pass_mark", insights.pass_mark)?;
        check_percentage("insights.pass_rate_target", insights.pass_rate_target)?;
        check_percentage("insights.weak_share_alert", insights.weak_share_alert)?;
        check_percentage("insights.easy_average", insights.easy_average)?;
        check_percentage("insights.moderate_average", insights.moderate_average)?;
        if insights.moderate_average > insights.easy_average {
            return Err(GradeError::config(
                "insights.moderate_average must not exceed insights.easy_average",
            ));
        }
        Ok(())
    }
}

fn check_percentage(name: &str, value: f64) -> Result<()> {
    if (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(GradeError::config(format!(
            "{name} must be between 0 and 100, got {value}"
        )))
    }
}
