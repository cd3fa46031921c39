//! Label sets and display colours

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ClassifierError;

/// FER2013 emotion categories, in model output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmotionLabel {
    Angry,
    Disgust,
    Fear,
    Happy,
    Neutral,
    Sad,
    Surprise,
}

impl EmotionLabel {
    /// All labels in index order
    pub const ALL: [EmotionLabel; 7] = [
        EmotionLabel::Angry,
        EmotionLabel::Disgust,
        EmotionLabel::Fear,
        EmotionLabel::Happy,
        EmotionLabel::Neutral,
        EmotionLabel::Sad,
        EmotionLabel::Surprise,
    ];

    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionLabel::Angry => "Angry",
            EmotionLabel::Disgust => "Disgust",
            EmotionLabel::Fear => "Fear",
            EmotionLabel::Happy => "Happy",
            EmotionLabel::Neutral => "Neutral",
            EmotionLabel::Sad => "Sad",
            EmotionLabel::Surprise => "Surprise",
        }
    }

    /// Index in the FER2013 output vector
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Display colour (RGB)
    pub fn color(&self) -> DisplayColor {
        match self {
            EmotionLabel::Angry => DisplayColor::new(255, 0, 0),
            EmotionLabel::Disgust => DisplayColor::new(0, 128, 0),
            EmotionLabel::Fear => DisplayColor::new(128, 0, 128),
            EmotionLabel::Happy => DisplayColor::new(0, 255, 0),
            EmotionLabel::Neutral => DisplayColor::new(128, 128, 128),
            EmotionLabel::Sad => DisplayColor::new(0, 0, 255),
            EmotionLabel::Surprise => DisplayColor::new(255, 255, 0),
        }
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmotionLabel {
    type Err = ClassifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EmotionLabel::ALL
            .iter()
            .copied()
            .find(|label| label.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ClassifierError::InvalidLabels(format!("unknown emotion '{}'", s)))
    }
}

/// Ordered, immutable set of class names shared by every vector in an ensemble
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    names: Arc<[String]>,
}

impl LabelSet {
    /// Create a label set; names must be non-empty and unique
    pub fn new<I, S>(names: I) -> Result<Self, ClassifierError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(ClassifierError::InvalidLabels("label set is empty".into()));
        }
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(ClassifierError::InvalidLabels(format!("duplicate label '{}'", name)));
            }
        }
        Ok(Self { names: names.into() })
    }

    /// The seven FER2013 emotions
    /// Colours for the seven FER2013 labels
    pub fn fer2013() -> Self {
        Self {
            names: EmotionLabel::ALL.iter().map(|l| l.as_str().to_string()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Name at `index`
    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Position of `name`, if present
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.names.to_vec()
    }
}

impl Default for LabelSet {
    fn default() -> Self {
        Self::fer2013()
    }
}

/// RGB display colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl DisplayColor {
    pub const WHITE: DisplayColor = DisplayColor::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Label -> colour lookup, white for anything unmapped
#[derive(Debug, Clone, Default)]
pub struct ColorMap {
    colors: HashMap<String, DisplayColor>,
}

impl ColorMap {
    pub fn fer2013() -> Self {
        Self {
            colors: EmotionLabel::ALL
                .iter()
                .map(|l| (l.as_str().to_string(), l.color()))
                .collect(),
        }
    }

    pub fn with_color(mut self, label: impl Into<String>, color: DisplayColor) -> Self {
        self.colors.insert(label.into(), color);
        self
    }

    /// Colour for `label`, white when unmapped
    pub fn get(&self, label: &str) -> DisplayColor {
        self.colors.get(label).copied().unwrap_or(DisplayColor::WHITE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fer2013_order() {
        let labels = LabelSet::fer2013();
        assert_eq!(
            labels.to_vec(),
            vec!["Angry", "Disgust", "Fear", "Happy", "Neutral", "Sad", "Surprise"]
        );
        assert_eq!(labels.index_of("Happy"), Some(EmotionLabel::Happy.index()));
    }

    #[test]
    fn test_rejects_duplicates_and_empty() {
        assert!(LabelSet::new(["A", "B", "A"]).is_err());
        assert!(LabelSet::new(Vec::<String>::new()).is_err());
        assert_eq!(LabelSet::new(["A", "B"]).unwrap().len(), 2);
    }

    #[test]
    fn test_parse_emotion() {
        assert_eq!("surprise".parse::<EmotionLabel>().unwrap(), EmotionLabel::Surprise);
        assert!("Bored".parse::<EmotionLabel>().is_err());
    }

    #[test]
    fn test_unknown_color_is_white() {
        let colors = ColorMap::fer2013();
        assert_eq!(colors.get("Sad"), DisplayColor::new(0, 0, 255));
        assert_eq!(colors.get("Bored"), DisplayColor::WHITE);
    }
}
