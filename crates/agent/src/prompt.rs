//! Prompt assembly.
//!
//! A prompt is plain text: persona, the knowledge slice for the message's
//! topic, a tail of the conversation so far, and the message itself. Both
//! knowledge and context are clipped to character budgets.

use parley_config::AppConfig;
use parley_core::message::{Role, Turn};
use parley_memory::truncate_chars;

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    persona: String,
    knowledge_budget: usize,
    context_budget: usize,
}

/// The last `max_chars` characters of `text`.
fn tail_chars(text: &str, max_chars: usize) -> &str {
    let total = text.chars().count();
    if total <= max_chars {
        return text;
    }
    match text.char_indices().nth(total - max_chars) {
        Some((idx, _)) => &text[idx..],
        None => "",
    }
}

impl PromptBuilder {
    pub fn new(persona: impl Into<String>, knowledge_budget: usize, context_budget: usize) -> Self {
        Self {
            persona: persona.into(),
            knowledge_budget,
            context_budget,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.assistant.persona.clone(),
            config.policy.knowledge_char_budget,
            config.policy.context_char_budget,
        )
    }

    /// Clip selected knowledge to the knowledge budget.
    pub fn clip_knowledge<'a>(&self, knowledge: &'a str) -> &'a str {
        truncate_chars(knowledge, self.knowledge_budget)
    }

    /// Render turns as `User: ...` / `Assistant: ...` lines, keeping the newest
    /// characters within the context budget.
    pub fn render_context(&self, turns: &[Turn]) -> String {
        let rendered = turns
            .iter()
            .filter_map(|t| {
                let speaker = match t.role {
                    Role::User => "User",
                    Role::Assistant => "Assistant",
                    Role::System => return None,
                };
                Some(format!("{speaker}: {}", t.content))
            })
            .collect::<Vec<_>>()
            .join("\n");

        tail_chars(&rendered, self.context_budget).to_string()
    }

    /// Compose the full prompt sent to the model gateway.
    pub fn build(&self, knowledge: &str, context: &str, message: &str) -> String {
        let mut prompt = String::with_capacity(
            self.persona.len() + knowledge.len() + context.len() + message.len() + 96,
        );
        prompt.push_str(self.persona.trim());

        let knowledge = self.clip_knowledge(knowledge).trim();
        if !knowledge.is_empty() {
            prompt.push_str("\n\nUse this knowledge base when it is relevant:\n");
            prompt.push_str(knowledge);
        }

        if !context.trim().is_empty() {
            prompt.push_str("\n\nConversation so far:\n");
            prompt.push_str(context.trim());
        }

        prompt.push_str("\n\nUser: ");
        prompt.push_str(message.trim());
        prompt.push_str("\nAssistant:");
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::message::Message;

    #[test]
    fn tail_keeps_newest_chars() {
        assert_eq!(tail_chars("abcdef", 3), "def");
        assert_eq!(tail_chars("abc", 10), "abc");
        assert_eq!(tail_chars("jambo ñ", 1), "ñ");
    }

    #[test]
    fn context_renders_roles() {
        let builder = PromptBuilder::new("", 4000, 2000);
        let turns = vec![
            Message::user("Hi"),
            Message::assistant("Hello! How can I help?"),
        ];
        assert_eq!(
            builder.render_context(&turns),
            "User: Hi\nAssistant: Hello! How can I help?"
        );
    }

    #[test]
    fn context_is_clipped_from_the_front() {
        let builder = PromptBuilder::new("", 4000, 10);
        let turns = vec![Message::user("old message"), Message::assistant("newest")];
        let context = builder.render_context(&turns);
        assert_eq!(context.chars().count(), 10);
        assert!(context.ends_with("newest"));
    }

    #[test]
    fn knowledge_is_clipped_to_budget() {
        let builder = PromptBuilder::new("persona", 5, 2000);
        let prompt = builder.build("0123456789", "", "hi");
        assert!(prompt.contains("01234"));
        assert!(!prompt.contains("012345"));
    }

    #[test]
    fn build_orders_sections() {
        let builder = PromptBuilder::new("You are Parley.", 4000, 2000);
        let prompt = builder.build("Honey: KSh 500", "User: hi\nAssistant: hello", "price?");

        let persona = prompt.find("You are Parley.").unwrap();
        let knowledge = prompt.find("Honey: KSh 500").unwrap();
        let context = prompt.find("Assistant: hello").unwrap();
        let message = prompt.find("User: price?").unwrap();
        assert!(persona < knowledge && knowledge < context && context < message);
        assert!(prompt.ends_with("Assistant:"));
    }

    #[test]
    fn empty_sections_are_omitted() {
        let builder = PromptBuilder::new("P", 4000, 2000);
        let prompt = builder.build("", "", "hello");
        assert_eq!(prompt, "P\n\nUser: hello\nAssistant:");
    }
}
