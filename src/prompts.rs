//! Prompt templates. All prompts ask for Russian prose to match the system persona.

use crate::model::{BookBrief, PlotOutline};

/// Optional cast, setting and events are appended only when the operator gave them.
pub fn outline(brief: &BookBrief) -> String {
    let mut prompt = format!(
        "Создайте подробную схему сюжета для книги из {} глав в стиле {}, основываясь на следующем описании:\n\n{}\n\nСхема должна включать завязку, развитие сюжета, кульминацию и развязку. Каждая глава должна быть не менее 10 страниц. Текст должен быть на русском языке.",
        brief.chapter_count, brief.style, brief.description
    );
    let extras = [
        ("Персонажи", &brief.characters),
        ("Место действия", &brief.setting),
        ("Ключевые события", &brief.events),
    ];
    for (label, value) in extras {
        if let Some(v) = value.as_deref().filter(|v| !v.trim().is_empty()) {
            prompt.push_str(&format!("\n\n{}: {}", label, v));
        }
    }
    prompt
}

/// Direct chapter prompt. Embeds every previous chapter verbatim, joined by a space.
pub fn chapter(style: &str, outline: &PlotOutline, previous: &[&str], index: u32) -> String {
    format!(
        "Предыдущие главы:\n\n{}\n\nСтиль написания: `{}`\n\nСхема сюжета:\n\n{}\n\nНапишите главу {} книги на русском языке, убедившись, что она соответствует схеме сюжета, опирается на предыдущие главы и продвигает историю вперед. Глава должна быть написана увлекательно, с интересными диалогами и описаниями. Используйте богатую и разнообразную лексику, чтобы полностью погрузить читателя в происходящее. Глава должна состоять не менее чем из 50 абзацев, мы стремимся к насыщенным и захватывающим главам.",
        previous.join(" "),
        style,
        outline.as_str(),
        index
    )
}

pub fn title(outline: &PlotOutline) -> String {
    format!(
        "Вот сюжет книги: {}\n\n--\n\nПридумайте креативное, запоминающееся и интригующее название для этой книги на русском языке. Название должно отражать суть сюжета и привлекать потенциальных читателей. Отвечайте только названием книги, без дополнительного текста.",
        outline.as_str()
    )
}

pub fn cover_description(outline: &PlotOutline) -> String {
    format!(
        "Сюжет: {}\n\n--\n\nОпишите подробно, какой должна быть обложка книги, основываясь на приведенном сюжете. Обложка должна привлекать внимание и отражать ключевые моменты сюжета. Опишите цвета, композицию и основные элементы, которые должны присутствовать на обложке. Текст должен быть на русском языке и состоять из 3-4 предложений.",
        outline.as_str()
    )
}

pub fn chapter_title(content: &str) -> String {
    format!(
        "Содержание главы:\n\n{}\n\n--\n\nСоздайте краткое, информативное и привлекательное название для этой главы на русском языке, основываясь на ее содержании. Название должно отражать ключевые события или тему главы. Отвечайте только названием главы, без дополнительного текста.",
        content
    )
}

/// Staged pipeline: short plan for one chapter.
pub fn chapter_plan(outline: &PlotOutline, index: u32) -> String {
    format!(
        "Составьте краткий план главы {} на основе следующей схемы сюжета:\n\n{}\n\nСосредоточьтесь на ключевых событиях и изменениях, которые должны произойти в этой главе.",
        index,
        outline.as_str()
    )
}

/// Kind of scene the staged pipeline writes for each chapter, in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scene {
    Description,
    Dialogue,
    Action,
}

impl Scene {
    pub const ALL: [Scene; 3] = [Scene::Description, Scene::Dialogue, Scene::Action];

    fn instruction(self, index: u32) -> String {
        match self {
            Scene::Description => format!(
                "Напишите подробное описание обстановки и персонажей для главы {}",
                index
            ),
            Scene::Dialogue => format!("Напишите увлекательную сцену диалога для главы {}", index),
            Scene::Action => format!("Напишите захватывающую сцену действия для главы {}", index),
        }
    }
}

/// Staged pipeline: one scene, grounded in the plan and the brief's cast, setting and events.
pub fn scene(brief: &BookBrief, plan: &str, scene: Scene, index: u32) -> String {
    format!(
        "План главы: {plan}\n\nПерсонажи: {characters}\n\nМесто действия: {setting}\n\nКлючевые события: {events}\n\n{instruction}, основываясь на плане главы:\n\n{plan}",
        plan = plan,
        characters = brief.characters.as_deref().unwrap_or(""),
        setting = brief.setting.as_deref().unwrap_or(""),
        events = brief.events.as_deref().unwrap_or(""),
        instruction = scene.instruction(index),
    )
}

/// Staged pipeline: final editing pass over the joined scenes.
pub fn edit_chapter(draft: &str) -> String {
    format!(
        "Отредактируйте и улучшите следующую главу:\n\n{}\n\nСосредоточьтесь на улучшении стиля, связности и общего качества текста.",
        draft
    )
}
