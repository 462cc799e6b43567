//! Trigger-phrase detection in operator prompts.

use regex::{Regex, RegexBuilder};

use crate::core::workflow::WorkflowEvent;

/// Configured phrase lists, borrowed from the loaded config.
#[derive(Debug, Clone, Copy)]
pub struct PhraseSets<'a> {
    pub implementation: &'a [String],
    pub discussion: &'a [String],
    pub emergency_stop: &'a [String],
}

/// Phrase matchers compiled once from the configured lists.
#[derive(Debug, Clone)]
pub struct TriggerDetector {
    emergency_stop: Option<Regex>,
    discussion: Option<Regex>,
    implementation: Option<Regex>,
}

impl TriggerDetector {
    /// Stop and discussion phrases are case-sensitive; implementation
    /// phrases are not.
    pub fn new(phrases: PhraseSets<'_>) -> Self {
        Self {
            emergency_stop: phrase_pattern(phrases.emergency_stop, true),
            discussion: phrase_pattern(phrases.discussion, true),
            implementation: phrase_pattern(phrases.implementation, false),
        }
    }

    /// Detect the workflow event requested by `prompt`, if any.
    ///
    /// Precedence: emergency stop, then discussion, then implementation.
    pub fn detect(&self, prompt: &str) -> Option<WorkflowEvent> {
        let hit = |pattern: &Option<Regex>| pattern.as_ref().is_some_and(|re| re.is_match(prompt));
        if hit(&self.emergency_stop) {
            return Some(WorkflowEvent::EmergencyStop);
        }
        if hit(&self.discussion) {
            return Some(WorkflowEvent::DiscussionTrigger);
        }
        if hit(&self.implementation) {
            return Some(WorkflowEvent::ImplementationTrigger);
        }
        None
    }
}

/// Whole-phrase alternation over `phrases`: a phrase may not touch a word
/// character on either side. `None` when no usable phrase is configured.
fn phrase_pattern(phrases: &[String], case_sensitive: bool) -> Option<Regex> {
    let alternatives: Vec<String> = phrases
        .iter()
        .map(|phrase| phrase.trim())
        .filter(|phrase| !phrase.is_empty())
        .map(regex::escape)
        .collect();
    if alternatives.is_empty() {
        return None;
    }
    RegexBuilder::new(&format!(
        r"(?:^|[^\w])(?:{})(?:$|[^\w])",
        alternatives.join("|")
    ))
    .case_insensitive(!case_sensitive)
    .build()
    .ok()
}
