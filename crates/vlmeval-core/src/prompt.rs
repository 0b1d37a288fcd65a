//! Prompt templates sent alongside each diagram crop.
//!
//! A run uses exactly one prompt: either a named template from the catalogue
//! or a literal custom string.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const MORPHOLOGICAL: &str = r#"OUTPUT FORMAT: JSON only, no explanation.

Count visual elements in this diagram:
1. Cuts (closed curves): How many?
2. Lines (heavy lines): How many? Do any branch?
3. Spots (text labels): How many? What text?

JSON:
{"cuts":{"count":N,"nested":true/false},"lines":{"count":N,"branching":true/false},"spots":{"count":N,"labels":["..."]}}"#;

const INDEXICAL: &str = "Is there a relationship between the elements present in the image? \
Which elements are connected to each other?";

const SYMBOLIC: &str = "In Peirce's diagrammatic logic, a closed curve called a cut represents \
logical negation. Elements inside the same region are interpreted conjunctively (i.e., asserted \
together). Elements placed directly on the background (the Sheet of Assertion) are considered \
true. A cut around propositions denies them. Nested cuts represent nested negation. Lines may \
indicate identity or existential quantification. Based on these principles, interpret the \
diagram and translate its meaning into a logical statement. If this is not possible, provide a \
clear explanation in natural language.";

const DESCRIPTION: &str = "Describe this diagram in detail, including its structure, content, \
and any visible text or labels.";

const CLASSIFICATION: &str = "What type of diagram is this? (e.g., graph, chart, geometric \
figure, logical diagram, tree diagram, etc.)";

const TRANSCRIPTION: &str = "Transcribe any text, symbols, or mathematical notation visible in \
this diagram.";

/// Named prompt templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PromptKind {
    /// Count cuts, lines and spots; answer as JSON
    #[default]
    Morphological,
    /// Ask which elements are related
    Indexical,
    /// Translate the diagram into a logical statement
    Symbolic,
    /// Free-form description
    Description,
    /// Diagram type
    Classification,
    /// Transcribe visible text and notation
    Transcription,
}

impl PromptKind {
    pub const ALL: [PromptKind; 6] = [
        Self::Morphological,
        Self::Indexical,
        Self::Symbolic,
        Self::Description,
        Self::Classification,
        Self::Transcription,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Self::Morphological => "morphological",
            Self::Indexical => "indexical",
            Self::Symbolic => "symbolic",
            Self::Description => "description",
            Self::Classification => "classification",
            Self::Transcription => "transcription",
        }
    }

    pub fn text(self) -> &'static str {
        match self {
            Self::Morphological => MORPHOLOGICAL,
            Self::Indexical => INDEXICAL,
            Self::Symbolic => SYMBOLIC,
            Self::Description => DESCRIPTION,
            Self::Classification => CLASSIFICATION,
            Self::Transcription => TRANSCRIPTION,
        }
    }
}

impl fmt::Display for PromptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for PromptKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.id().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown prompt template '{s}'"))
    }
}

/// The prompt selected for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    /// Template name, or "custom" for a literal override
    pub id: String,
    /// Literal text sent to the model
    pub text: String,
}

impl PromptTemplate {
    pub fn named(kind: PromptKind) -> Self {
        Self {
            id: kind.id().to_string(),
            text: kind.text().to_string(),
        }
    }

    pub fn custom(text: impl Into<String>) -> Self {
        Self {
            id: "custom".to_string(),
            text: text.into(),
        }
    }

    /// Pick the run's prompt. A non-blank custom string wins over the named
    /// template; with neither, the default template is used.
    pub fn select(kind: Option<PromptKind>, custom: Option<&str>) -> Self {
        match custom.filter(|c| !c.trim().is_empty()) {
            Some(text) => Self::custom(text),
            None => Self::named(kind.unwrap_or_default()),
        }
    }

    /// First `max_chars` characters, for log lines.
    pub fn preview(&self, max_chars: usize) -> String {
        let mut preview: String = self.text.chars().take(max_chars).collect();
        if self.text.chars().count() > max_chars {
            preview.push_str("...");
        }
        preview.replace('\n', " ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_defaults_to_morphological() {
        let prompt = PromptTemplate::select(None, None);
        assert_eq!(prompt.id, "morphological");
        assert!(prompt.text.starts_with("OUTPUT FORMAT: JSON only"));
    }

    #[test]
    fn test_select_named() {
        let prompt = PromptTemplate::select(Some(PromptKind::Symbolic), None);
        assert_eq!(prompt.id, "symbolic");
        assert!(prompt.text.contains("Sheet of Assertion"));
    }

    #[test]
    fn test_custom_overrides_named() {
        let prompt = PromptTemplate::select(Some(PromptKind::Indexical), Some("Count the cuts."));
        assert_eq!(prompt.id, "custom");
        assert_eq!(prompt.text, "Count the cuts.");
    }

    #[test]
    fn test_blank_custom_is_ignored() {
        let prompt = PromptTemplate::select(Some(PromptKind::Description), Some("   "));
        assert_eq!(prompt.id, "description");
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!("transcription".parse(), Ok(PromptKind::Transcription));
        assert_eq!("Classification".parse(), Ok(PromptKind::Classification));
        assert!("poetry".parse::<PromptKind>().is_err());
    }

    #[test]
    fn test_preview_truncates_and_flattens() {
        let prompt = PromptTemplate::named(PromptKind::Morphological);
        let preview = prompt.preview(20);
        assert!(preview.ends_with("..."));
        assert!(!preview.contains('\n'));
    }
}
