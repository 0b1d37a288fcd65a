//! CLI enum types for the evaluate command: model and prompt selection.

use clap::ValueEnum;
use vlmeval_core::{ModelSelector, PromptKind};

/// Models that can be evaluated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModelArg {
    /// Claude Sonnet via the Anthropic API
    Claude,
    /// Gemini Pro via OpenRouter
    Gemini,
    /// Gemini Flash via OpenRouter
    GeminiFlash,
    /// Gemma 3 27B via AcademicCloud
    Gemma,
    /// Qwen 2.5 VL 72B via AcademicCloud
    Qwen,
}

impl From<ModelArg> for ModelSelector {
    fn from(arg: ModelArg) -> Self {
        match arg {
            ModelArg::Claude => ModelSelector::Claude,
            ModelArg::Gemini => ModelSelector::Gemini,
            ModelArg::GeminiFlash => ModelSelector::GeminiFlash,
            ModelArg::Gemma => ModelSelector::Gemma,
            ModelArg::Qwen => ModelSelector::Qwen,
        }
    }
}

/// Named prompt templates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum PromptArg {
    /// Count cuts, lines and spots as JSON
    Morphological,
    /// Which elements are related
    Indexical,
    /// Translate into a logical statement
    Symbolic,
    /// Free-form description
    Description,
    /// Diagram type
    Classification,
    /// Transcribe visible text
    Transcription,
}

impl From<PromptArg> for PromptKind {
    fn from(arg: PromptArg) -> Self {
        match arg {
            PromptArg::Morphological => PromptKind::Morphological,
            PromptArg::Indexical => PromptKind::Indexical,
            PromptArg::Symbolic => PromptKind::Symbolic,
            PromptArg::Description => PromptKind::Description,
            PromptArg::Classification => PromptKind::Classification,
            PromptArg::Transcription => PromptKind::Transcription,
        }
    }
}
