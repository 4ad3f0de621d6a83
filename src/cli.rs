//! CLI parsing and orchestration. Collects the brief, builds the providers, runs the
//! sequencer (with an optional revision loop), and maps errors to exit codes.

use crate::config::{self, Config, ConfigError, Settings};
use crate::model::{BookBrief, Draft, DEFAULT_AUTHOR};
use crate::pacing::{FixedDelay, NoDelay, Pacer, DEFAULT_CHAPTER_DELAY_SECS};
use crate::provider::{
    AnthropicClient, HttpClient, ImageGenerator, StabilityClient, TextGenerator,
};
use crate::revision::{self, RevisionOutcome, RevisionTarget};
use crate::sequencer::{
    ChapterStrategy, GenerationParams, PipelineError, Sequencer, SequencerOptions, Stage,
};
use clap::Parser;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Input;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// CLI error carrying exit code and message.
#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Pipeline(#[from] PipelineError),

    #[error("Interactive input failed: {0}")]
    Prompt(#[from] dialoguer::Error),
}

impl CliRunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliRunError::InvalidInput(_) | CliRunError::Config(_) | CliRunError::Prompt(_) => 1,
            CliRunError::Pipeline(PipelineError::InvalidBrief(_)) => 1,
            CliRunError::Pipeline(PipelineError::Provider { .. }) => 2,
            CliRunError::Pipeline(_) => 3,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "novelgen")]
#[command(about = "Generate a short novel with a language model and write it as text and EPUB")]
#[command(
    after_help = "API keys come from ANTHROPIC_API_KEY and STABILITY_API_KEY (a .env file is loaded if present). Config file keys (output_dir, model, temperature, outline_max_tokens, chapter_max_tokens, chapter_delay_secs, timeout_secs, user_agent, author, image_api_host) are read from ./novelgen.toml or ~/.config/novelgen/config.toml. CLI flags override config."
)]
pub struct Args {
    /// Writing style, e.g. "детектив". Prompted for when missing.
    #[arg(long)]
    pub style: Option<String>,

    /// High-level description of the book. Prompted for when missing.
    #[arg(long)]
    pub description: Option<String>,

    /// Number of chapters. Prompted for when missing.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub chapters: Option<u32>,

    /// Main characters (used by the outline and by --staged scenes).
    #[arg(long)]
    pub characters: Option<String>,

    /// Setting description.
    #[arg(long)]
    pub setting: Option<String>,

    /// Key events that should happen in the story.
    #[arg(long)]
    pub events: Option<String>,

    /// Write each chapter as plan, description/dialogue/action scenes and an edit pass.
    #[arg(long)]
    pub staged: bool,

    /// Offer to revise plot, characters, setting, events or a chapter before packaging.
    #[arg(long)]
    pub review: bool,

    /// Output directory for the .txt, .epub and cover.png (overrides config; default .).
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Config file to use instead of the default search locations.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Text model identifier (overrides config).
    #[arg(long)]
    pub model: Option<String>,

    /// Sampling temperature in [0, 2] (overrides config; default 0.7).
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Seconds to wait after each chapter (overrides config; default 65, 0 disables).
    #[arg(long)]
    pub delay: Option<u64>,

    /// HTTP request timeout in seconds (overrides config; default 600).
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Author written into the EPUB (overrides config; default "AI").
    #[arg(long)]
    pub author: Option<String>,

    /// Suppress progress output (errors only).
    #[arg(short, long)]
    pub quiet: bool,

    /// Debug logging and the full error chain.
    #[arg(long)]
    pub verbose: bool,
}

/// Install the stderr subscriber. `RUST_LOG` wins over `verbose`.
pub fn init_tracing(verbose: bool) {
    let default = if verbose { "novelgen=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Output directory must already exist.
fn validate_output_dir(dir: &Path) -> Result<(), CliRunError> {
    if !dir.is_dir() {
        return Err(CliRunError::InvalidInput(format!(
            "Cannot write output: {}: directory does not exist.",
            dir.display()
        )));
    }
    Ok(())
}

/// Merge flags over config over defaults.
fn generation_params(
    args: &Args,
    config: Option<&Config>,
) -> Result<GenerationParams, CliRunError> {
    let defaults = GenerationParams::default();
    let temperature = args
        .temperature
        .or_else(|| config.and_then(|c| c.temperature))
        .unwrap_or(defaults.temperature);
    if !(0.0..=2.0).contains(&temperature) {
        return Err(CliRunError::InvalidInput(format!(
            "Invalid temperature {}: must be between 0 and 2.",
            temperature
        )));
    }
    Ok(GenerationParams {
        model: args
            .model
            .clone()
            .or_else(|| config.and_then(|c| c.model.clone()))
            .unwrap_or(defaults.model),
        temperature,
        outline_max_tokens: config
            .and_then(|c| c.outline_max_tokens)
            .unwrap_or(defaults.outline_max_tokens),
        chapter_max_tokens: config
            .and_then(|c| c.chapter_max_tokens)
            .unwrap_or(defaults.chapter_max_tokens),
        ..defaults
    })
}

fn pacer_for(delay_secs: u64) -> Box<dyn Pacer> {
    if delay_secs == 0 {
        Box::new(NoDelay)
    } else {
        Box::new(FixedDelay::from_secs(delay_secs))
    }
}

fn prompt_text(
    theme: &ColorfulTheme,
    question: &str,
    allow_empty: bool,
) -> Result<String, CliRunError> {
    let answer: String = Input::with_theme(theme)
        .with_prompt(question)
        .allow_empty(allow_empty)
        .interact_text()?;
    Ok(answer.trim().to_string())
}

/// Fill the brief from flags, prompting for whatever is missing.
fn collect_brief(args: &Args) -> Result<BookBrief, CliRunError> {
    let theme = ColorfulTheme::default();
    let style = match &args.style {
        Some(s) => s.clone(),
        None => prompt_text(&theme, "Enter the desired writing style", false)?,
    };
    let description = match &args.description {
        Some(d) => d.clone(),
        None => prompt_text(&theme, "Enter a high-level description of the book", false)?,
    };
    let chapter_count = match args.chapters {
        Some(n) => n,
        None => Input::<u32>::with_theme(&theme)
            .with_prompt("Enter the number of chapters")
            .validate_with(|n: &u32| {
                if *n >= 1 {
                    Ok(())
                } else {
                    Err("must be at least 1")
                }
            })
            .interact_text()?,
    };

    // Cast, setting and events are only asked for in staged mode.
    let optional = |flag: &Option<String>, question: &str| -> Result<Option<String>, CliRunError> {
        match flag {
            Some(v) => Ok(Some(v.clone())),
            None if args.staged => {
                let v = prompt_text(&theme, question, true)?;
                Ok(Some(v).filter(|v| !v.is_empty()))
            }
            None => Ok(None),
        }
    };
    let characters = optional(&args.characters, "Enter a description of the main characters")?;
    let setting = optional(&args.setting, "Enter a description of the setting")?;
    let events = optional(
        &args.events,
        "Enter a list of key events that should happen in the story",
    )?;

    Ok(BookBrief {
        style,
        description,
        chapter_count,
        characters,
        setting,
        events,
    })
}

/// Ask for revisions until the operator accepts the draft.
fn review_loop<T, I, P>(
    seq: &mut Sequencer<'_, T, I, P>,
    brief: &mut BookBrief,
    mut draft: Draft,
    before_prompt: &dyn Fn(),
) -> Result<Draft, CliRunError>
where
    T: TextGenerator,
    I: ImageGenerator,
    P: Pacer,
{
    let theme = ColorfulTheme::default();
    loop {
        before_prompt();
        eprintln!(
            "Draft has {} chapter(s), {} characters in total.",
            draft.chapters.len(),
            draft.chapters.iter().map(|c| c.content.chars().count()).sum::<usize>()
        );
        let answer = prompt_text(
            &theme,
            "Revise (plot, characters, setting, events, chapter N) or 'done' to accept",
            false,
        )?;
        let target: RevisionTarget = match answer.parse() {
            Ok(t) => t,
            Err(e) => {
                eprintln!("{}", e);
                continue;
            }
        };
        let payload = match target.payload_prompt() {
            Some(question) => prompt_text(&theme, &question, false)?,
            None => String::new(),
        };
        match revision::apply(target.with_payload(payload), brief, &mut draft) {
            Ok(RevisionOutcome::Accepted) => return Ok(draft),
            Ok(RevisionOutcome::Edited) => {}
            Ok(RevisionOutcome::Regenerate { outline }) => {
                draft = seq.draft(brief, outline)?;
            }
            Err(e) => eprintln!("{}", e),
        }
    }
}

/// Entry point for the CLI. Returns Ok(()) on success; Err with exit code and message on failure.
pub fn run(args: &Args) -> Result<(), CliRunError> {
    let config = match &args.config {
        Some(path) => Some(config::load_config_from(path)?),
        None => config::load_config()?,
    };
    let config = config.as_ref();

    let settings = Settings::from_env();
    let text_api_key = settings.require_text_api_key()?;
    if settings.image_api_key.is_none() {
        warn!(
            "{} is not set; the cover step will fail after the chapters are generated",
            config::IMAGE_API_KEY_VAR
        );
    }

    let output_dir = args
        .output_dir
        .clone()
        .or_else(|| config.and_then(|c| c.output_dir.clone()))
        .unwrap_or_else(|| PathBuf::from("."));
    validate_output_dir(&output_dir)?;

    let params = generation_params(args, config)?;
    let delay_secs = args
        .delay
        .or_else(|| config.and_then(|c| c.chapter_delay_secs))
        .unwrap_or(DEFAULT_CHAPTER_DELAY_SECS);
    let author = args
        .author
        .clone()
        .or_else(|| config.and_then(|c| c.author.clone()))
        .unwrap_or_else(|| DEFAULT_AUTHOR.to_string());

    let mut builder = HttpClient::builder();
    if let Some(secs) = args.timeout.or_else(|| config.and_then(|c| c.timeout_secs)) {
        builder = builder.timeout_secs(secs);
    }
    if let Some(ua) = config.and_then(|c| c.user_agent.clone()) {
        builder = builder.user_agent(ua);
    }
    let http = builder
        .build()
        .map_err(|e| CliRunError::InvalidInput(format!("Failed to create HTTP client: {}", e)))?;
    let text = AnthropicClient::new(http.clone(), text_api_key);
    let image_host = settings
        .image_api_host
        .clone()
        .or_else(|| config.and_then(|c| c.image_api_host.clone()));
    let image = StabilityClient::new(http, settings.image_api_key.clone(), image_host);

    let mut brief = collect_brief(args)?;

    let progress_state: RefCell<Option<indicatif::ProgressBar>> = RefCell::new(None);
    let progress_cb = |stage: Stage| {
        let mut state = progress_state.borrow_mut();
        let pb = state.get_or_insert_with(|| {
            let bar = indicatif::ProgressBar::new_spinner();
            bar.set_style(
                indicatif::ProgressStyle::with_template("{spinner} {msg} ({elapsed})")
                    .unwrap_or_else(|_| indicatif::ProgressStyle::default_spinner())
                    .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "),
            );
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        });
        pb.set_message(format!("Generating {}", stage));
    };
    let clear_progress = || {
        if let Some(pb) = progress_state.borrow_mut().take() {
            pb.disable_steady_tick();
            pb.finish_and_clear();
        }
    };

    let progress: Option<&dyn Fn(Stage)> = if args.quiet { None } else { Some(&progress_cb) };
    let options = SequencerOptions {
        strategy: if args.staged {
            ChapterStrategy::Staged
        } else {
            ChapterStrategy::Direct
        },
        params,
        output_dir,
        author,
        progress,
    };
    let mut seq = Sequencer::new(text, image, pacer_for(delay_secs), options);

    let mut draft = seq.draft(&brief, None)?;
    if args.review {
        draft = review_loop(&mut seq, &mut brief, draft, &clear_progress)?;
    }
    let result = seq.finish(draft);
    clear_progress();
    let output = result?;

    if !args.quiet {
        eprintln!("Wrote {}", output.text_path.display());
        eprintln!("Wrote {}", output.cover_path.display());
        eprintln!("Wrote {}", output.epub_path.display());
    }
    Ok(())
}
