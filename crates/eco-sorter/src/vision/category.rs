//! Waste categories recognised by the detector

use serde::{Deserialize, Serialize};

/// Question asked when nothing specific was recognised
pub const GENERIC_QUESTION: &str = "Où jeter ce déchet ?";

/// Material classes, in the detector's class-index order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WasteCategory {
    Cardboard,
    Garbage,
    Glass,
    Metal,
    Paper,
    Plastic,
    Trash,
}

impl WasteCategory {
    pub const ALL: [WasteCategory; 7] = [
        WasteCategory::Cardboard,
        WasteCategory::Garbage,
        WasteCategory::Glass,
        WasteCategory::Metal,
        WasteCategory::Paper,
        WasteCategory::Plastic,
        WasteCategory::Trash,
    ];

    /// Category for a detector class index
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Class name as exported with the model
    pub fn class_name(&self) -> &'static str {
        match self {
            Self::Cardboard => "Cardboard",
            Self::Garbage => "Garbage",
            Self::Glass => "Glass",
            Self::Metal => "Metal",
            Self::Paper => "Paper",
            Self::Plastic => "Plastic",
            Self::Trash => "Trash",
        }
    }

    /// French label shown to users
    pub fn label_fr(&self) -> &'static str {
        match self {
            Self::Cardboard => "carton",
            Self::Garbage => "ordure ménagère",
            Self::Glass => "verre",
            Self::Metal => "métal",
            Self::Paper => "papier",
            Self::Plastic => "plastique",
            Self::Trash => "déchet",
        }
    }

    /// Canned question fed back into the assistant
    pub fn follow_up_question(&self) -> &'static str {
        match self {
            Self::Cardboard => "Où jeter un déchet qui ressemble à du carton ?",
            Self::Garbage => "Où jeter un déchet qui ressemble à une ordure ménagère ?",
            Self::Glass => "Où jeter un déchet qui ressemble à du verre ?",
            Self::Metal => "Où jeter un déchet qui ressemble à du métal ?",
            Self::Paper => "Où jeter un déchet qui ressemble à du papier ?",
            Self::Plastic => "Où jeter un déchet qui ressemble à du plastique ?",
            Self::Trash => GENERIC_QUESTION,
        }
    }
}

/// Outcome of classifying one photo
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub category: Option<WasteCategory>,
    /// Detection score in `[0, 1]`; 0 when nothing was detected
    pub confidence: f32,
    pub detected: bool,
}

impl Prediction {
    pub fn new(category: WasteCategory, confidence: f32) -> Self {
        Self {
            category: Some(category),
            confidence,
            detected: true,
        }
    }

    /// Nothing at or above the confidence threshold
    pub fn none() -> Self {
        Self {
            category: None,
            confidence: 0.0,
            detected: false,
        }
    }

    /// `"carton (confiance: 87.00%)"`, or `"aucun déchet détecté"`
    pub fn describe(&self) -> String {
        match self.category {
            Some(category) if self.detected => format!(
                "{} (confiance: {:.2}%)",
                category.label_fr(),
                self.confidence * 100.0
            ),
            _ => "aucun déchet détecté".to_string(),
        }
    }

    pub fn follow_up_question(&self) -> &'static str {
        match self.category {
            Some(category) if self.detected => category.follow_up_question(),
            _ => GENERIC_QUESTION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_order_matches_model() {
        let names: Vec<&str> = WasteCategory::ALL.iter().map(|c| c.class_name()).collect();
        assert_eq!(
            names,
            vec!["Cardboard", "Garbage", "Glass", "Metal", "Paper", "Plastic", "Trash"]
        );
        assert_eq!(WasteCategory::from_index(2), Some(WasteCategory::Glass));
        assert_eq!(WasteCategory::from_index(7), None);
    }

    #[test]
    fn test_describe() {
        assert_eq!(
            Prediction::new(WasteCategory::Cardboard, 0.87).describe(),
            "carton (confiance: 87.00%)"
        );
        assert_eq!(Prediction::none().describe(), "aucun déchet détecté");
    }

    #[test]
    fn test_follow_up_questions() {
        assert_eq!(
            Prediction::new(WasteCategory::Plastic, 0.9).follow_up_question(),
            "Où jeter un déchet qui ressemble à du plastique ?"
        );
        // Multi-word label keeps its own question
        assert_eq!(
            WasteCategory::Garbage.follow_up_question(),
            "Où jeter un déchet qui ressemble à une ordure ménagère ?"
        );
        assert_eq!(WasteCategory::Trash.follow_up_question(), GENERIC_QUESTION);
        assert_eq!(Prediction::none().follow_up_question(), GENERIC_QUESTION);
    }

    #[test]
    fn test_serde_lowercase() {
        assert_eq!(serde_json::to_string(&WasteCategory::Glass).unwrap(), "\"glass\"");
        let c: WasteCategory = serde_json::from_str("\"metal\"").unwrap();
        assert_eq!(c, WasteCategory::Metal);
    }
}
