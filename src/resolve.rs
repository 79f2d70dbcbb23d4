//! Turning raw model output into a validated [`Action`].
//!
//! Model replies arrive as free text that usually, but not always, contains
//! a JSON object, often wrapped in Markdown code fences. The resolver
//! strips fences, parses, and validates against the action schema. When
//! validation fails it re-prompts the model with the invalid output and the
//! validation error, up to a bounded number of correction attempts, then
//! collapses to an `error` action rather than surfacing a failure.

use regex::Regex;

use crate::action::{Action, ActionKind};
use crate::llm::{ChatMessage, CompletionRequest, RequestDispatcher};

/// Default number of correction re-prompts before giving up.
pub const DEFAULT_CORRECTION_ATTEMPTS: u32 = 2;

/// Validates model output against the action schema, with bounded
/// self-correction through the dispatcher.
pub struct ActionResolver {
    fence_re: Regex,
    max_correction_attempts: u32,
}

impl Default for ActionResolver {
    fn default() -> Self {
        Self::new(DEFAULT_CORRECTION_ATTEMPTS)
    }
}

impl ActionResolver {
    pub fn new(max_correction_attempts: u32) -> Self {
        Self {
            fence_re: Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").unwrap(),
            max_correction_attempts,
        }
    }

    /// Extract the JSON payload from raw model text.
    ///
    /// Takes the first fenced code block if one is present; otherwise
    /// returns the trimmed text verbatim and lets parsing report the
    /// problem. JSON buried in unfenced prose is deliberately not fished
    /// out: that reply is invalid and goes through the correction loop.
    pub fn extract_json_block<'a>(&self, text: &'a str) -> &'a str {
        if let Some(captures) = self.fence_re.captures(text) {
            if let Some(inner) = captures.get(1) {
                return inner.as_str();
            }
        }
        text.trim()
    }

    /// Parse and validate one reply. The error string is phrased for the
    /// correction prompt.
    pub fn parse_action(&self, raw: &str) -> std::result::Result<Action, String> {
        let payload = self.extract_json_block(raw);
        serde_json::from_str(payload).map_err(|e| e.to_string())
    }

    /// Resolve a raw reply into an action, re-prompting through the
    /// dispatcher on validation failure.
    ///
    /// Never fails: an exhausted correction budget, or a dispatcher
    /// failure while correcting, is contained as an `error` action.
    pub async fn resolve(
        &self,
        dispatcher: &mut RequestDispatcher,
        request: &CompletionRequest,
        raw: &str,
    ) -> Action {
        let mut current = raw.to_string();
        let mut last_error;

        match self.parse_action(&current) {
            Ok(action) => return action,
            Err(e) => last_error = e,
        }

        for attempt in 1..=self.max_correction_attempts {
            tracing::debug!(attempt, error = %last_error, "re-prompting for valid action");

            let correction = self.correction_request(request, &current, &last_error);
            current = match dispatcher.request_completion(&correction).await {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::warn!(error = %e, "correction request failed");
                    return Action::error(format!("action resolution failed: {e}"));
                }
            };

            match self.parse_action(&current) {
                Ok(action) => return action,
                Err(e) => last_error = e,
            }
        }

        tracing::warn!(error = %last_error, "correction budget exhausted");
        Action::error(format!(
            "model did not produce a valid action: {last_error}"
        ))
    }

    /// Build the follow-up request: original conversation, the invalid
    /// reply as an assistant turn, then the correction instruction.
    fn correction_request(
        &self,
        request: &CompletionRequest,
        invalid: &str,
        error: &str,
    ) -> CompletionRequest {
        let mut corrected = request.clone();
        corrected.messages.push(ChatMessage::assistant(invalid));
        corrected.messages.push(ChatMessage::user(format!(
            "Your previous reply was not a valid action object.\n\
             Validation error: {error}\n\
             Respond with a single JSON object and nothing else. The \
             \"action\" field must be one of: {}.",
            ActionKind::VALID_TAGS.join(", ")
        )));
        corrected.json_mode = true;
        corrected
    }
}
