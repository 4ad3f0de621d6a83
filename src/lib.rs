//! novelgen: drafts a short novel with a language model and writes it as text and EPUB.

pub mod cli;
pub mod config;
pub mod epub;
pub mod formats;
pub mod model;
pub mod pacing;
pub mod postprocess;
pub mod prompts;
pub mod provider;
pub mod revision;
pub mod sequencer;

// Re-exports for CLI and consumers.
pub use epub::{write_epub, EpubError};
pub use formats::{write_text, FormatError};
pub use pacing::{FixedDelay, NoDelay, Pacer};
pub use postprocess::{remove_first_line, sanitize_title};
pub use provider::{
    AnthropicClient, GenerationRequest, HttpClient, ImageGenerator, ProviderError,
    StabilityClient, TextGenerator,
};
pub use sequencer::{ChapterStrategy, PipelineError, RunOutput, Sequencer, SequencerOptions};
