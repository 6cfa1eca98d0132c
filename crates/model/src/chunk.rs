use serde::{Deserialize, Serialize};

use crate::{DocumentFragment, FinishReason, Usage};

/// A vendor stream packet, normalized by an [`Adapter`](crate::Adapter).
///
/// Adapters only translate shapes. Policies like the candidate count,
/// role validation and usage merging are applied by the consumer of the
/// chunk, so that they are the same for every provider.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct Chunk {
    /// One delta per candidate reported in the packet.
    #[serde(default)]
    pub candidates: Vec<Delta>,
    /// Token counters, if the packet carried any.
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl Chunk {
    /// Creates a chunk with a single candidate.
    #[inline]
    pub fn single(delta: Delta) -> Self {
        Self {
            candidates: vec![delta],
            usage: None,
        }
    }

    /// Attaches token counters.
    #[inline]
    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// The delta for one candidate.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct Delta {
    /// The role marker, already mapped to the generic vocabulary
    /// (`system`, `user`, `assistant`, `tool`) where the vendor uses
    /// synonyms. Empty when the packet didn't declare one.
    #[serde(default)]
    pub role: String,
    /// Content deltas, in the order the vendor sent them.
    #[serde(default)]
    pub parts: Vec<DeltaPart>,
    /// The normalized finish reason, if reported.
    #[serde(default)]
    pub finish_reason: Option<FinishReason>,
}

impl Delta {
    /// Creates a delta declaring the given role.
    #[inline]
    pub fn with_role(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            ..Default::default()
        }
    }

    /// Appends a text delta.
    #[inline]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.parts.push(DeltaPart::Text(text.into()));
        self
    }

    /// Appends a tool call delta.
    #[inline]
    pub fn tool_call(mut self, call: ToolCallDelta) -> Self {
        self.parts.push(DeltaPart::ToolCall(call));
        self
    }

    /// Sets the finish reason.
    #[inline]
    pub fn finish(mut self, reason: FinishReason) -> Self {
        self.finish_reason = Some(reason);
        self
    }
}

/// One content delta of a [`Delta`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum DeltaPart {
    /// A piece of text.
    Text(String),
    /// A piece of a tool call.
    ToolCall(ToolCallDelta),
    /// A piece of a document.
    Document(DocumentFragment),
}

/// A piece of a tool call as reported by the vendor.
///
/// Pieces are matched by `id` when present, otherwise by `index`. A piece
/// with neither starts a new call.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct ToolCallDelta {
    /// Position of the call within the reply, if the vendor numbers them.
    #[serde(default)]
    pub index: Option<u32>,
    /// The call identifier, often only present on the first piece.
    #[serde(default)]
    pub id: Option<String>,
    /// The tool name, often only present on the first piece.
    #[serde(default)]
    pub name: Option<String>,
    /// A piece of the JSON arguments text.
    #[serde(default)]
    pub arguments: String,
}
