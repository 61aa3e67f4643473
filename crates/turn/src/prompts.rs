//! Prompt text catalog — every instruction template the pipeline renders.
//!
//! Templates are assembled from plain sections; the only interpolation is
//! the persona description, the session description, and timestamps.

use chatloom_config::PersonaConfig;
use chrono::Utc;

use crate::retriever::MemoryKind;

/// Header prefixed once above retrieved long-term/working memories.
pub const PAST_MEMORIES_HEADER: &str =
    "Below are relevant memories from past conversations, grouped by memory type:";

/// Header prefixed once above retrieved document snippets.
pub const DOCUMENT_SNIPPETS_HEADER: &str =
    "Below are snippets from documents relevant to the conversation:";

/// Render the system persona: who the bot is, plus the per-session
/// description and temporal grounding.
pub fn render_persona(persona: &PersonaConfig, system_description: &str) -> String {
    let mut out = String::with_capacity(512);
    out.push_str(&persona.description);
    if !system_description.trim().is_empty() {
        out.push_str("\n\n");
        out.push_str(system_description.trim());
    }
    out.push_str(&format!(
        "\n\nYour knowledge cutoff is {}. The current date and time is {}.",
        persona.knowledge_cutoff,
        Utc::now().format("%A, %B %-d, %Y at %H:%M UTC")
    ));
    out
}

/// Instructions for the audience extraction sub-completion.
pub fn audience_instructions() -> &'static str {
    concat!(
        "Rewrite the last message to reflect who the chat is with, given the ",
        "chat history. Answer only with the list of names, or \"unknown\" if ",
        "the audience cannot be determined. Do not add commentary.",
    )
}

/// Instructions for the intent extraction sub-completion.
pub fn intent_instructions() -> &'static str {
    concat!(
        "Rewrite the user's last message as a self-contained statement of ",
        "intent, resolving pronouns and references from the chat history. ",
        "Answer only with the rewritten intent, in one or two sentences.",
    )
}

/// Instructions for the post-turn memory extraction sub-completion.
///
/// The model must answer with a JSON array of `{"label", "details"}`
/// objects; the extractor tolerates a fenced code block around it.
pub fn memory_extraction_instructions(kind: MemoryKind) -> &'static str {
    match kind {
        MemoryKind::LongTerm => concat!(
            "From the conversation below, extract facts worth remembering ",
            "across sessions: durable information about the user, their ",
            "preferences, and decisions that were made. Answer with a JSON ",
            "array of objects with \"label\" and \"details\" fields. Answer ",
            "with [] if nothing qualifies.",
        ),
        MemoryKind::Working => concat!(
            "From the conversation below, extract short-lived task context ",
            "useful only for the current session: open questions, steps in ",
            "progress, and immediate goals. Answer with a JSON array of ",
            "objects with \"label\" and \"details\" fields. Answer with [] ",
            "if nothing qualifies.",
        ),
        MemoryKind::Document => "",
    }
}

/// Section of the meta prompt describing the audience.
pub fn audience_section(audience: &str) -> String {
    format!("The chat participants are: {audience}")
}

/// Section of the meta prompt describing the extracted intent.
pub fn intent_section(intent: &str) -> String {
    format!("The user's current intent: {intent}")
}
