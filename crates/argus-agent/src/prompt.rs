//! System prompt assembly for the conversational loop.

use chrono::{DateTime, Utc};

use argus_memory::types::UserProfile;

pub struct PromptInputs<'a> {
    pub persona_name: &'a str,
    pub now: DateTime<Utc>,
    /// Newest-first long-term summaries (top 3).
    pub summaries: &'a [String],
    pub profile: Option<&'a UserProfile>,
    /// Pre-fetched knowledge block, already formatted.
    pub knowledge: Option<&'a str>,
}

/// Build the system prompt: persona, tool-selection guidance, the clock,
/// and whatever long-term memory is worth carrying in.
pub fn build_system_prompt(inputs: &PromptInputs<'_>) -> String {
    let mut out = String::with_capacity(1024);

    out.push_str(&format!(
        "You are {}, a personal assistant chatting over a mobile messenger. \
         You are curious, concise, and honest about what you don't know.\n\n",
        inputs.persona_name
    ));

    out.push_str(
        "Tool guidance, in order of preference:\n\
         1. Answer from the conversation and the knowledge context below when possible.\n\
         2. recall_history — for things this user told you in the past.\n\
         3. scrape_news — for \"what's happening\" questions by category.\n\
         4. web_search — for current facts you don't have.\n\
         5. deep_research — last resort when cheaper tools return nothing.\n\n",
    );

    out.push_str(
        "Replies are read on a phone: keep them under 50 words, no markdown \
         tables, no bullet walls.\n\n",
    );

    out.push_str(&format!(
        "Current time: {}\n",
        inputs.now.format("%Y-%m-%d %H:%M UTC")
    ));

    if let Some(profile) = inputs.profile {
        let mut line = String::from("Known user profile:");
        if let Some(name) = &profile.name {
            line.push_str(&format!(" name={name}"));
        }
        if let Some(location) = &profile.location {
            line.push_str(&format!(" location={location}"));
        }
        if let Some(language) = &profile.language {
            line.push_str(&format!(" language={language}"));
        }
        out.push_str(&line);
        out.push('\n');
    }

    if !inputs.summaries.is_empty() {
        out.push_str("\nWhat you remember from earlier conversations:\n");
        for summary in inputs.summaries {
            out.push_str(&format!("---\n{summary}\n"));
        }
    }

    if let Some(knowledge) = inputs.knowledge {
        out.push_str(&format!(
            "\nRelevant knowledge you gathered recently:\n{knowledge}\n"
        ));
    }

    out
}
