use serde::{Deserialize, Serialize};

use crate::{FinishReason, Role, Usage};

/// An incremental delta of a streamed reply.
///
/// A fragment is derived from one stream chunk, so it may carry several
/// kinds of delta at once. `parts` keeps the order in which the provider
/// sent them.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct Fragment {
    /// The role, only set when the chunk declared one.
    pub role: Option<Role>,
    /// Content deltas, in arrival order.
    pub parts: Vec<FragmentPart>,
    /// Set on the chunk that reported why generation stopped.
    pub finish_reason: Option<FinishReason>,
    /// The latest non-zero usage reading carried by the chunk.
    pub usage: Option<Usage>,
}

impl Fragment {
    /// Returns `true` if the fragment carries nothing visible.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.role.is_none()
            && self.parts.is_empty()
            && self.finish_reason.is_none()
            && self.usage.is_none()
    }

    /// Concatenates the text deltas of this fragment.
    pub fn text(&self) -> String {
        let mut text = String::new();
        for part in &self.parts {
            if let FragmentPart::Text(delta) = part {
                text.push_str(delta);
            }
        }
        text
    }
}

/// One delta inside a [`Fragment`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum FragmentPart {
    /// A piece of text.
    Text(String),
    /// A piece of a tool call.
    ToolCall(ToolCallFragment),
    /// A piece of a document.
    Document(DocumentFragment),
}

/// A piece of a tool call.
///
/// A single call may be split across several fragments; they share the
/// same `id` once the provider has assigned one.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct ToolCallFragment {
    /// The identifier of the call being assembled.
    pub id: String,
    /// The name of the tool, repeated on every piece once known.
    pub name: String,
    /// The arguments text carried by this piece only.
    pub arguments: String,
}

/// A piece of a document.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct DocumentFragment {
    /// The file name, if known.
    pub filename: Option<String>,
    /// A reference to the document, exclusive with `data`.
    pub url: Option<String>,
    /// Raw bytes to append to the document.
    #[serde(default)]
    pub data: Vec<u8>,
}
