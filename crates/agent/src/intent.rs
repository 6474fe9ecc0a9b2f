//! Keyword intent classification.

use parley_config::TopicKeywords;
use parley_core::message::Topic;

/// Maps message text to a `Topic` by case-insensitive substring match.
///
/// Topics are checked in a fixed order (shop, business, health) and the
/// first with a matching keyword wins; anything else is `general`.
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    rules: Vec<(Topic, Vec<String>)>,
}

impl IntentClassifier {
    pub fn new(keywords: &TopicKeywords) -> Self {
        let lower = |words: &[String]| -> Vec<String> {
            words
                .iter()
                .map(|w| w.trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect()
        };

        Self {
            rules: vec![
                (Topic::Shop, lower(&keywords.shop)),
                (Topic::Business, lower(&keywords.business)),
                (Topic::Health, lower(&keywords.health)),
            ],
        }
    }

    pub fn classify(&self, text: &str) -> Topic {
        let text = text.to_lowercase();
        self.rules
            .iter()
            .find(|(_, words)| words.iter().any(|w| text.contains(w.as_str())))
            .map(|(topic, _)| *topic)
            .unwrap_or(Topic::General)
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new(&TopicKeywords::default())
    }
}
