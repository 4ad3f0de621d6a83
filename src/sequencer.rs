//! Book assembly: outline, chapters, title, cover, text export, EPUB export. Strictly in that
//! order, one blocking provider call at a time. Any failure aborts the run.

use crate::epub::{write_epub, EpubError};
use crate::formats::{write_text, FormatError};
use crate::model::{Book, BookBrief, Chapter, Draft, PlotOutline, DEFAULT_AUTHOR};
use crate::pacing::Pacer;
use crate::postprocess::{normalize_whitespace, remove_first_line, sanitize_title};
use crate::prompts::{self, Scene};
use crate::provider::{GenerationRequest, ImageGenerator, ProviderError, TextGenerator};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, instrument};

pub const DEFAULT_MODEL: &str = "claude-3-opus-20240229";
pub const COVER_FILE_NAME: &str = "cover.png";

/// Pipeline step, used for progress reporting and error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Outline,
    Chapter { index: u32, total: u32 },
    Title,
    Cover,
    ChapterTitle { index: u32, total: u32 },
    Package,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Outline => write!(f, "plot outline"),
            Stage::Chapter { index, total } => write!(f, "chapter {}/{}", index, total),
            Stage::Title => write!(f, "title"),
            Stage::Cover => write!(f, "cover"),
            Stage::ChapterTitle { index, total } => {
                write!(f, "chapter title {}/{}", index, total)
            }
            Stage::Package => write!(f, "EPUB"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid book brief: {0}")]
    InvalidBrief(String),

    #[error("Generating {stage} failed: {source}")]
    Provider {
        stage: Stage,
        #[source]
        source: ProviderError,
    },

    #[error("Cannot write cover image: {path}: {source}")]
    WriteCover {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Format(#[from] FormatError),

    #[error("{0}")]
    Epub(#[from] EpubError),
}

/// How each chapter is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChapterStrategy {
    /// One call per chapter, conditioned on the outline and every previous chapter.
    #[default]
    Direct,
    /// Plan, three scenes (description, dialogue, action), then an editing pass.
    Staged,
}

/// Model, temperatures and token budgets for every kind of call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f32,
    /// Outline, title, cover description and chapter titles.
    pub outline_max_tokens: u32,
    pub chapter_max_tokens: u32,
    pub plan_max_tokens: u32,
    pub scene_max_tokens: u32,
    pub edit_max_tokens: u32,
    pub edit_temperature: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            outline_max_tokens: 2000,
            chapter_max_tokens: 4000,
            plan_max_tokens: 500,
            scene_max_tokens: 3000,
            edit_max_tokens: 5000,
            edit_temperature: 0.6,
        }
    }
}

/// Options for a run: strategy, parameters, where outputs go, and a progress callback.
pub struct SequencerOptions<'a> {
    pub strategy: ChapterStrategy,
    pub params: GenerationParams,
    pub output_dir: PathBuf,
    pub author: String,
    pub progress: Option<&'a dyn Fn(Stage)>,
}

impl Default for SequencerOptions<'_> {
    fn default() -> Self {
        Self {
            strategy: ChapterStrategy::Direct,
            params: GenerationParams::default(),
            output_dir: PathBuf::from("."),
            author: DEFAULT_AUTHOR.to_string(),
            progress: None,
        }
    }
}

/// Files written by a successful run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Sanitized title, also the file stem.
    pub title: String,
    pub text_path: PathBuf,
    pub cover_path: PathBuf,
    pub epub_path: PathBuf,
    pub chapters: Vec<Chapter>,
}

/// Drives the providers in a fixed order.
pub struct Sequencer<'a, T, I, P> {
    text: T,
    image: I,
    pacer: P,
    options: SequencerOptions<'a>,
}

impl<'a, T, I, P> Sequencer<'a, T, I, P>
where
    T: TextGenerator,
    I: ImageGenerator,
    P: Pacer,
{
    pub fn new(text: T, image: I, pacer: P, options: SequencerOptions<'a>) -> Self {
        Self {
            text,
            image,
            pacer,
            options,
        }
    }

    /// Draft, then title, cover and both exports.
    pub fn run(&mut self, brief: &BookBrief) -> Result<RunOutput, PipelineError> {
        let draft = self.draft(brief, None)?;
        self.finish(draft)
    }

    /// Outline and every chapter. With `outline` set, no outline call is made.
    #[instrument(
        skip_all,
        fields(chapters = brief.chapter_count, strategy = ?self.options.strategy)
    )]
    pub fn draft(
        &mut self,
        brief: &BookBrief,
        outline: Option<PlotOutline>,
    ) -> Result<Draft, PipelineError> {
        validate_brief(brief)?;
        let outline_fixed = outline.is_some();
        let outline = match outline {
            Some(o) => {
                info!("Using supplied plot outline");
                o
            }
            None => self.outline(brief)?,
        };
        let chapters = self.chapters(brief, &outline)?;
        Ok(Draft {
            outline,
            chapters,
            outline_fixed,
        })
    }

    /// Title, cover, text file, then EPUB.
    pub fn finish(&mut self, draft: Draft) -> Result<RunOutput, PipelineError> {
        let title = self.title(&draft.outline)?;
        let cover_path = self.cover(&draft.outline)?;
        let text_path = self.export_text(&title, &draft)?;
        let (epub_path, chapters) = self.export_epub(&title, draft, &cover_path)?;
        Ok(RunOutput {
            title,
            text_path,
            cover_path,
            epub_path,
            chapters,
        })
    }

    pub fn outline(&mut self, brief: &BookBrief) -> Result<PlotOutline, PipelineError> {
        self.report(Stage::Outline);
        info!("Generating plot outline");
        let max_tokens = self.options.params.outline_max_tokens;
        let text = self.generate(Stage::Outline, prompts::outline(brief), max_tokens, None)?;
        Ok(PlotOutline(text))
    }

    /// Chapters 1..N in order, pausing after each one.
    pub fn chapters(
        &mut self,
        brief: &BookBrief,
        outline: &PlotOutline,
    ) -> Result<Vec<Chapter>, PipelineError> {
        let total = brief.chapter_count;
        let mut chapters: Vec<Chapter> = Vec::with_capacity(total as usize);
        for index in 1..=total {
            let stage = Stage::Chapter { index, total };
            self.report(stage);
            info!(index, total, "Generating chapter");
            let content = match self.options.strategy {
                ChapterStrategy::Direct => {
                    let previous: Vec<&str> = chapters.iter().map(|c| c.content.as_str()).collect();
                    let prompt = prompts::chapter(&brief.style, outline, &previous, index);
                    let max_tokens = self.options.params.chapter_max_tokens;
                    self.generate(stage, prompt, max_tokens, None)?
                }
                ChapterStrategy::Staged => self.staged_chapter(brief, outline, stage, index)?,
            };
            chapters.push(Chapter {
                index,
                content: remove_first_line(&content).to_string(),
                title: String::new(),
            });
            self.pacer.wait();
        }
        Ok(chapters)
    }

    fn staged_chapter(
        &mut self,
        brief: &BookBrief,
        outline: &PlotOutline,
        stage: Stage,
        index: u32,
    ) -> Result<String, PipelineError> {
        let params = self.options.params.clone();
        let plan = self.generate(
            stage,
            prompts::chapter_plan(outline, index),
            params.plan_max_tokens,
            None,
        )?;
        let mut scenes = Vec::with_capacity(Scene::ALL.len());
        for scene in Scene::ALL {
            let text = self.generate(
                stage,
                prompts::scene(brief, &plan, scene, index),
                params.scene_max_tokens,
                None,
            )?;
            scenes.push(normalize_whitespace(&text));
        }
        self.generate(
            stage,
            prompts::edit_chapter(&scenes.join("\n\n")),
            params.edit_max_tokens,
            Some(params.edit_temperature),
        )
    }

    /// Generated title, preamble stripped, sanitized for use as a file stem and EPUB title.
    pub fn title(&mut self, outline: &PlotOutline) -> Result<String, PipelineError> {
        self.report(Stage::Title);
        info!("Generating title");
        let max_tokens = self.options.params.outline_max_tokens;
        let raw = self.generate(Stage::Title, prompts::title(outline), max_tokens, None)?;
        Ok(sanitize_title(remove_first_line(&raw)))
    }

    /// Describe a cover from the outline, render it, and write it to `<output_dir>/cover.png`.
    /// Nothing is written unless both calls succeed.
    pub fn cover(&mut self, outline: &PlotOutline) -> Result<PathBuf, PipelineError> {
        self.report(Stage::Cover);
        info!("Generating cover");
        let max_tokens = self.options.params.outline_max_tokens;
        let description = self.generate(
            Stage::Cover,
            prompts::cover_description(outline),
            max_tokens,
            None,
        )?;
        let bytes = self
            .image
            .generate_image(&description)
            .map_err(|e| PipelineError::Provider {
                stage: Stage::Cover,
                source: e,
            })?;
        let path = self.options.output_dir.join(COVER_FILE_NAME);
        std::fs::write(&path, bytes).map_err(|e| PipelineError::WriteCover {
            path: path.clone(),
            source: e,
        })?;
        Ok(path)
    }

    pub fn export_text(&self, title: &str, draft: &Draft) -> Result<PathBuf, PipelineError> {
        let path = self.options.output_dir.join(format!("{}.txt", title));
        write_text(&draft.chapters, &path)?;
        info!(path = %path.display(), "Wrote text");
        Ok(path)
    }

    /// Derive one title per chapter (one call each), then package.
    pub fn export_epub(
        &mut self,
        title: &str,
        draft: Draft,
        cover_path: &std::path::Path,
    ) -> Result<(PathBuf, Vec<Chapter>), PipelineError> {
        let mut chapters = draft.chapters;
        let total = chapters.len() as u32;
        let max_tokens = self.options.params.outline_max_tokens;
        for chapter in chapters.iter_mut() {
            let stage = Stage::ChapterTitle {
                index: chapter.index,
                total,
            };
            self.report(stage);
            let prompt = prompts::chapter_title(&chapter.content);
            let raw = self.generate(stage, prompt, max_tokens, None)?;
            chapter.title = remove_first_line(&raw).trim().to_string();
        }

        self.report(Stage::Package);
        let book = Book {
            title: title.to_string(),
            author: self.options.author.clone(),
            chapters,
            cover_path: Some(cover_path.to_path_buf()),
        };
        let path = self.options.output_dir.join(format!("{}.epub", title));
        write_epub(&book, &path)?;
        info!(path = %path.display(), "Wrote EPUB");
        Ok((path, book.chapters))
    }

    fn generate(
        &mut self,
        stage: Stage,
        prompt: String,
        max_tokens: u32,
        temperature: Option<f32>,
    ) -> Result<String, PipelineError> {
        let request = GenerationRequest {
            prompt,
            model: self.options.params.model.clone(),
            max_tokens,
            temperature: temperature.unwrap_or(self.options.params.temperature),
        };
        self.text
            .generate_text(&request)
            .map_err(|e| PipelineError::Provider { stage, source: e })
    }

    fn report(&self, stage: Stage) {
        if let Some(progress) = self.options.progress {
            progress(stage);
        }
    }
}

fn validate_brief(brief: &BookBrief) -> Result<(), PipelineError> {
    if brief.chapter_count == 0 {
        return Err(PipelineError::InvalidBrief(
            "chapter count must be at least 1".to_string(),
        ));
    }
    if brief.style.trim().is_empty() {
        return Err(PipelineError::InvalidBrief("writing style is empty".to_string()));
    }
    if brief.description.trim().is_empty() {
        return Err(PipelineError::InvalidBrief("book description is empty".to_string()));
    }
    Ok(())
}
