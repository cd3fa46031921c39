//! Suggestion rotation and pattern analysis

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::{self, FALLBACK_SUGGESTION};

/// Share of one label in a history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelShare {
    pub label: String,
    pub count: usize,
    /// 0..=100
    pub percent: f32,
}

/// Headline conclusion of a pattern analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Insight {
    /// One label covers more than the persistence threshold
    Persistent {
        label: String,
        advice: Option<String>,
    },
    /// More than five distinct labels
    Varied,
    Healthy,
}

/// Summary of a label history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternAnalysis {
    pub total: usize,
    /// Most frequent first
    pub distribution: Vec<LabelShare>,
    pub dominant: Option<String>,
    pub insight: Option<Insight>,
}

impl PatternAnalysis {
    /// Plain-text report with one bar per label
    pub fn render(&self) -> String {
        if self.total == 0 {
            return "Insufficient data for analysis.".to_string();
        }

        let mut out = String::from("Emotional Pattern Analysis\n");
        out.push_str(&"-".repeat(40));
        out.push('\n');
        for share in &self.distribution {
            let bar = "#".repeat((share.percent / 5.0) as usize);
            let _ = writeln!(out, "{:10}: {} {:.1}%", share.label, bar, share.percent);
        }
        out.push('\n');

        match &self.insight {
            Some(Insight::Persistent { label, advice }) => {
                let _ = writeln!(out, "You've been mostly {} recently.", label.to_lowercase());
                if let Some(advice) = advice {
                    let _ = writeln!(out, "Tip: {}", advice);
                }
            }
            Some(Insight::Varied) => {
                out.push_str("Your emotions have been quite varied. That's normal!\n")
            }
            Some(Insight::Healthy) => {
                out.push_str("Your emotional state shows healthy variation.\n")
            }
            None => {}
        }
        out
    }
}

/// Suggestion source; rotates through each label's list
#[derive(Debug)]
pub struct WellbeingAdvisor {
    cursor: AtomicUsize,
    /// Dominant share (percent) above which a pattern counts as persistent
    persistent_percent: f32,
}

impl Default for WellbeingAdvisor {
    fn default() -> Self {
        Self::new()
    }
}

impl WellbeingAdvisor {
    /// Create new advisor with every rotation at its first entry
    pub fn new() -> Self {
        Self {
            cursor: AtomicUsize::new(0),
            persistent_percent: 60.0,
        }
    }

    /// Next suggestion for `label`
    pub fn suggestion(&self, label: &str) -> &'static str {
        pick(catalog::suggestions(label), &self.cursor).unwrap_or(FALLBACK_SUGGESTION)
    }

    /// Advice for a persistent pattern, for labels that have any
    pub fn pattern_suggestion(&self, label: &str) -> Option<&'static str> {
        pick(catalog::pattern_suggestions(label), &self.cursor)
    }

    /// Tip of the day, stable for a given calendar day
    pub fn daily_tip(&self) -> &'static str {
        Self::tip_for_day(chrono::Local::now().ordinal())
    }

    /// Tip for a given day of the year
    pub fn tip_for_day(day_of_year: u32) -> &'static str {
        catalog::DAILY_TIPS[day_of_year as usize % catalog::DAILY_TIPS.len()]
    }

    /// Distribution, dominant label and insight for `history`
    pub fn analyze<S: AsRef<str>>(&self, history: &[S]) -> PatternAnalysis {
        if history.is_empty() {
            return PatternAnalysis {
                total: 0,
                distribution: Vec::new(),
                dominant: None,
                insight: None,
            };
        }

        // (count, first position) per label
        let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
        for (pos, label) in history.iter().enumerate() {
            counts.entry(label.as_ref()).or_insert((0, pos)).0 += 1;
        }

        let mut ranked: Vec<(&str, usize, usize)> =
            counts.into_iter().map(|(l, (c, p))| (l, c, p)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

        let total = history.len();
        let distribution: Vec<LabelShare> = ranked
            .iter()
            .map(|&(label, count, _)| LabelShare {
                label: label.to_string(),
                count,
                percent: count as f32 * 100.0 / total as f32,
            })
            .collect();

        let top = &distribution[0];
        let insight = if top.percent > self.persistent_percent {
            Insight::Persistent {
                label: top.label.clone(),
                advice: self.pattern_suggestion(&top.label).map(str::to_string),
            }
        } else if distribution.len() > 5 {
            Insight::Varied
        } else {
            Insight::Healthy
        };
        debug!("Pattern analysis over {} entries: {:?}", total, insight);

        PatternAnalysis {
            total,
            dominant: Some(top.label.clone()),
            distribution,
            insight: Some(insight),
        }
    }
}

fn pick(options: &'static [&'static str], cursor: &AtomicUsize) -> Option<&'static str> {
    if options.is_empty() {
        return None;
    }
    let i = cursor.fetch_add(1, Ordering::Relaxed);
    Some(options[i % options.len()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggestion_known_and_unknown() {
        let advisor = WellbeingAdvisor::new();
        assert!(catalog::suggestions("Sad").contains(&advisor.suggestion("Sad")));
        assert_eq!(advisor.suggestion("Bored"), FALLBACK_SUGGESTION);
    }

    #[test]
    fn test_suggestions_rotate() {
        let advisor = WellbeingAdvisor::new();
        let first = advisor.suggestion("Happy");
        let second = advisor.suggestion("Happy");
        assert_ne!(first, second);
    }

    #[test]
    fn test_empty_history() {
        let analysis = WellbeingAdvisor::new().analyze::<&str>(&[]);
        assert_eq!(analysis.total, 0);
        assert!(analysis.insight.is_none());
        assert_eq!(analysis.render(), "Insufficient data for analysis.");
    }

    #[test]
    fn test_persistent_pattern() {
        let history = ["Sad", "Sad", "Sad", "Sad", "Sad", "Sad", "Sad", "Neutral", "Happy", "Sad"];
        let analysis = WellbeingAdvisor::new().analyze(&history);

        assert_eq!(analysis.dominant.as_deref(), Some("Sad"));
        assert_eq!(analysis.distribution[0].count, 8);
        assert!((analysis.distribution[0].percent - 80.0).abs() < 1e-4);
        match &analysis.insight {
            Some(Insight::Persistent { label, advice }) => {
                assert_eq!(label, "Sad");
                assert!(advice.is_some());
            }
            other => panic!("unexpected insight {:?}", other),
        }
        assert!(analysis.render().contains("mostly sad"));
    }

    #[test]
    fn test_persistent_without_advice() {
        let analysis = WellbeingAdvisor::new().analyze(&["Happy"; 4]);
        assert_eq!(
            analysis.insight,
            Some(Insight::Persistent {
                label: "Happy".into(),
                advice: None
            })
        );
    }

    #[test]
    fn test_varied_and_healthy() {
        let advisor = WellbeingAdvisor::new();
        let varied = ["Angry", "Disgust", "Fear", "Happy", "Neutral", "Sad", "Surprise"];
        assert_eq!(advisor.analyze(&varied).insight, Some(Insight::Varied));

        let healthy = ["Happy", "Neutral", "Happy", "Neutral", "Sad"];
        let analysis = advisor.analyze(&healthy);
        assert_eq!(analysis.insight, Some(Insight::Healthy));
        // equal counts keep first-seen order
        assert_eq!(analysis.distribution[0].label, "Happy");
        assert_eq!(analysis.distribution[1].label, "Neutral");
    }

    #[test]
    fn test_exactly_sixty_percent_is_not_persistent() {
        let history = ["Fear", "Fear", "Fear", "Neutral", "Happy"];
        let analysis = WellbeingAdvisor::new().analyze(&history);
        assert_eq!(analysis.insight, Some(Insight::Healthy));
    }

    #[test]
    fn test_daily_tip_stable_per_day() {
        assert_eq!(WellbeingAdvisor::tip_for_day(42), WellbeingAdvisor::tip_for_day(42));
        assert_ne!(WellbeingAdvisor::tip_for_day(1), WellbeingAdvisor::tip_for_day(2));
    }

    #[test]
    fn test_insight_serialization() {
        let json = serde_json::to_string(&Insight::Varied).unwrap();
        assert_eq!(json, r#"{"kind":"varied"}"#);
    }
}
