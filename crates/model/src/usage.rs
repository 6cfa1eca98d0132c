use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// The reason why the model stopped generating.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The model finished its turn, or hit a stop sequence.
    Stop,
    /// The model reached the token limit.
    Length,
    /// The reply was caught by a content filter.
    ContentFilter,
    /// The model needs tool results to continue.
    ToolCalls,
    /// Any other vendor-specific reason, as reported.
    Other(String),
}

impl FinishReason {
    /// Normalizes a vendor finish reason.
    ///
    /// Returns `None` for an empty token, which means the generation is
    /// still in progress.
    pub fn from_vendor(token: &str) -> Option<Self> {
        if token.is_empty() {
            return None;
        }
        let reason = match token.to_ascii_lowercase().as_str() {
            "stop" | "complete" | "end_turn" | "stop_sequence" | "eos" => {
                FinishReason::Stop
            }
            "length" | "max_tokens" | "model_length" => FinishReason::Length,
            "content_filter" | "safety" | "recitation" | "blocklist"
            | "prohibited_content" | "spii" | "image_safety" => {
                FinishReason::ContentFilter
            }
            "tool_calls" | "tool_call" | "tool_use" | "function_call" => {
                FinishReason::ToolCalls
            }
            _ => FinishReason::Other(token.to_owned()),
        };
        Some(reason)
    }
}

impl Display for FinishReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FinishReason::Stop => f.write_str("stop"),
            FinishReason::Length => f.write_str("length"),
            FinishReason::ContentFilter => f.write_str("content_filter"),
            FinishReason::ToolCalls => f.write_str("tool_calls"),
            FinishReason::Other(other) => f.write_str(other),
        }
    }
}

/// Token accounting and finish reason reported by the provider.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(default)]
pub struct Usage {
    /// Tokens in the prompt.
    pub input_tokens: u64,
    /// Prompt tokens served from the provider's cache.
    pub input_cached_tokens: u64,
    /// Tokens generated.
    pub output_tokens: u64,
    /// Why the generation stopped.
    pub finish_reason: Option<FinishReason>,
}

impl Usage {
    /// Creates a usage reading with only token counters.
    #[inline]
    pub fn tokens(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            ..Default::default()
        }
    }

    /// Returns `true` if no counter is set. The finish reason is ignored.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.input_tokens == 0
            && self.input_cached_tokens == 0
            && self.output_tokens == 0
    }
}

impl Display for Usage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "in: {} (cached {}), out: {}",
            self.input_tokens, self.input_cached_tokens, self.output_tokens
        )
    }
}
