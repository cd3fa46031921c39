//! Wellbeing Advisor
//!
//! Maps detected emotions to short suggestions and summarises the
//! emotional pattern of a prediction history.

mod advisor;
mod catalog;

pub use advisor::{Insight, LabelShare, PatternAnalysis, WellbeingAdvisor};
pub use catalog::FALLBACK_SUGGESTION;
