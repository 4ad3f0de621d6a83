//! Post-generation revision commands.
//!
//! The operator types a target (`plot`, `characters`, `setting`, `events`, `chapter N`) and
//! then supplies the replacement text. Parsing yields a [RevisionTarget]; attaching the
//! payload yields a [RevisionCommand] that the CLI dispatches with one exhaustive match.

use crate::model::{BookBrief, Draft, PlotOutline};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RevisionError {
    #[error("Unknown revision target '{0}'. Use plot, characters, setting, events, chapter N, or done.")]
    UnknownTarget(String),

    #[error("Invalid chapter number '{0}'.")]
    InvalidChapterNumber(String),

    #[error("Chapter {index} does not exist; the draft has {count} chapter(s).")]
    ChapterOutOfRange { index: u32, count: usize },
}

/// What the operator wants to revise. Parsed from one line of input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevisionTarget {
    Accept,
    Plot,
    Characters,
    Setting,
    Events,
    Chapter(u32),
}

impl FromStr for RevisionTarget {
    type Err = RevisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "done" | "yes" | "y" | "accept" => return Ok(RevisionTarget::Accept),
            "plot" => return Ok(RevisionTarget::Plot),
            "characters" => return Ok(RevisionTarget::Characters),
            "setting" => return Ok(RevisionTarget::Setting),
            "events" => return Ok(RevisionTarget::Events),
            _ => {}
        }
        match s.split_whitespace().collect::<Vec<_>>().as_slice() {
            ["chapter", n] => {
                let index: u32 = n
                    .parse()
                    .map_err(|_| RevisionError::InvalidChapterNumber(n.to_string()))?;
                if index == 0 {
                    return Err(RevisionError::InvalidChapterNumber(n.to_string()));
                }
                Ok(RevisionTarget::Chapter(index))
            }
            _ => Err(RevisionError::UnknownTarget(s.clone())),
        }
    }
}

impl RevisionTarget {
    /// Question to ask for this target's payload; `None` for [RevisionTarget::Accept].
    pub fn payload_prompt(&self) -> Option<String> {
        match self {
            RevisionTarget::Accept => None,
            RevisionTarget::Plot => Some("Updated plot outline".to_string()),
            RevisionTarget::Characters => Some("Updated character descriptions".to_string()),
            RevisionTarget::Setting => Some("Updated setting description".to_string()),
            RevisionTarget::Events => Some("Updated list of key events".to_string()),
            RevisionTarget::Chapter(n) => Some(format!("Updated text of chapter {}", n)),
        }
    }

    /// Attach the operator's text. [RevisionTarget::Accept] ignores it.
    pub fn with_payload(self, text: String) -> RevisionCommand {
        match self {
            RevisionTarget::Accept => RevisionCommand::Accept,
            RevisionTarget::Plot => RevisionCommand::ReplaceOutline(text),
            RevisionTarget::Characters => RevisionCommand::ReplaceCharacters(text),
            RevisionTarget::Setting => RevisionCommand::ReplaceSetting(text),
            RevisionTarget::Events => RevisionCommand::ReplaceEvents(text),
            RevisionTarget::Chapter(index) => RevisionCommand::ReplaceChapter { index, text },
        }
    }
}

/// A complete revision with its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevisionCommand {
    Accept,
    /// Regenerate every chapter from this outline; no outline call is made.
    ReplaceOutline(String),
    ReplaceCharacters(String),
    ReplaceSetting(String),
    ReplaceEvents(String),
    /// Replace one chapter's text in place, without regenerating anything.
    ReplaceChapter { index: u32, text: String },
}

/// What the caller must do after a command has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevisionOutcome {
    Accepted,
    /// The draft was edited in place; ask again.
    Edited,
    /// The brief changed; regenerate the draft, optionally from a fixed outline.
    Regenerate { outline: Option<PlotOutline> },
}

/// Apply `command` to the brief and draft.
pub fn apply(
    command: RevisionCommand,
    brief: &mut BookBrief,
    draft: &mut Draft,
) -> Result<RevisionOutcome, RevisionError> {
    match command {
        RevisionCommand::Accept => Ok(RevisionOutcome::Accepted),
        RevisionCommand::ReplaceOutline(text) => Ok(RevisionOutcome::Regenerate {
            outline: Some(PlotOutline(text)),
        }),
        RevisionCommand::ReplaceCharacters(text) => {
            brief.characters = Some(text);
            Ok(regenerate(draft))
        }
        RevisionCommand::ReplaceSetting(text) => {
            brief.setting = Some(text);
            Ok(regenerate(draft))
        }
        RevisionCommand::ReplaceEvents(text) => {
            brief.events = Some(text);
            Ok(regenerate(draft))
        }
        RevisionCommand::ReplaceChapter { index, text } => {
            let count = draft.chapters.len();
            let chapter = index
                .checked_sub(1)
                .and_then(|i| draft.chapters.get_mut(i as usize))
                .ok_or(RevisionError::ChapterOutOfRange { index, count })?;
            chapter.content = text;
            Ok(RevisionOutcome::Edited)
        }
    }
}

/// Brief edits regenerate the draft; an operator-typed outline survives them.
fn regenerate(draft: &Draft) -> RevisionOutcome {
    RevisionOutcome::Regenerate {
        outline: draft.outline_fixed.then(|| draft.outline.clone()),
    }
}
