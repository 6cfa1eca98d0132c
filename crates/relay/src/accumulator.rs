use std::collections::HashMap;

use genai_relay_model::{
    Completion, Content, DeltaPart, Document, DocumentFragment,
    DocumentSource, Error, FinishReason, Fragment, FragmentPart, Message,
    Role, ToolCall, ToolCallDelta, ToolCallFragment, Usage,
};

use crate::decoder::Packet;

/// Folds packets into the final message while producing the fragments to
/// relay.
///
/// Content parts keep the order in which they first appeared. Consecutive
/// text deltas share a part; a text delta after any other kind of content
/// opens a new part.
#[derive(Debug, Default)]
pub(crate) struct Accumulator {
    role: Option<Role>,
    contents: Vec<Content>,
    // Positions in `contents` of the tool calls.
    calls_by_id: HashMap<String, usize>,
    calls_by_index: HashMap<u32, usize>,
    usage: Usage,
    finish_reason: Option<FinishReason>,
}

impl Accumulator {
    /// Folds a packet. Returns the fragment to relay, if the packet carried
    /// anything worth relaying.
    pub(crate) fn fold(
        &mut self,
        packet: Packet,
    ) -> Result<Option<Fragment>, Error> {
        let (role, parts, finish_reason, usage) = match packet {
            Packet::Heartbeat { usage } => {
                self.record_usage(usage.as_ref());
                return Ok(None);
            }
            Packet::Delta {
                role,
                parts,
                finish_reason,
                usage,
            } => (role, parts, finish_reason, usage),
        };

        if let Some(role) = role {
            match self.role {
                Some(prev) if prev != role => {
                    return Err(Error::protocol(format!(
                        "role changed from {prev} to {role} within a reply"
                    )));
                }
                _ => self.role = Some(role),
            }
        }
        self.record_usage(usage.as_ref());
        if finish_reason.is_some() {
            self.finish_reason.clone_from(&finish_reason);
        }

        let mut fragment = Fragment {
            role,
            parts: Vec::with_capacity(parts.len()),
            finish_reason,
            usage,
        };
        for part in parts {
            let part = match part {
                DeltaPart::Text(text) => self.push_text(text),
                DeltaPart::ToolCall(delta) => Some(self.push_tool_call(delta)?),
                DeltaPart::Document(doc) => self.push_document(doc),
            };
            fragment.parts.extend(part);
        }

        if fragment.is_empty() {
            return Ok(None);
        }
        Ok(Some(fragment))
    }

    /// Returns the assembled message and the final usage.
    pub(crate) fn finish(self) -> Completion {
        Completion {
            message: Message {
                role: self.role.unwrap_or(Role::Assistant),
                contents: self.contents,
            },
            usage: Usage {
                finish_reason: self.finish_reason,
                ..self.usage
            },
        }
    }

    fn record_usage(&mut self, usage: Option<&Usage>) {
        let Some(usage) = usage else {
            return;
        };
        if usage.is_zero() {
            return;
        }
        self.usage = Usage {
            finish_reason: None,
            ..usage.clone()
        };
    }

    fn push_text(&mut self, text: String) -> Option<FragmentPart> {
        if text.is_empty() {
            return None;
        }
        match self.contents.last_mut() {
            Some(Content::Text(prev)) => prev.push_str(&text),
            _ => self.contents.push(Content::Text(text.clone())),
        }
        Some(FragmentPart::Text(text))
    }

    fn push_tool_call(
        &mut self,
        delta: ToolCallDelta,
    ) -> Result<FragmentPart, Error> {
        let ToolCallDelta {
            index,
            id,
            name,
            arguments,
        } = delta;
        let id = id.filter(|id| !id.is_empty());
        let name = name.filter(|name| !name.is_empty());

        // A known id continues its call. An unknown id is adopted by the
        // call at the same index if that call has no id yet; otherwise it
        // starts a new call.
        let by_index =
            index.and_then(|i| self.calls_by_index.get(&i).copied());
        let slot = match &id {
            Some(id) => self
                .calls_by_id
                .get(id)
                .copied()
                .or_else(|| by_index.filter(|&slot| self.has_no_id(slot))),
            None => by_index,
        };

        let slot = match slot {
            Some(slot) => slot,
            None => {
                self.contents.push(Content::ToolCall(ToolCall::default()));
                self.contents.len() - 1
            }
        };
        if let Some(index) = index {
            self.calls_by_index.insert(index, slot);
        }

        let Some(Content::ToolCall(call)) = self.contents.get_mut(slot) else {
            return Err(Error::protocol(format!(
                "content {slot} is not a tool call"
            )));
        };
        if call.id.is_empty() {
            if let Some(id) = id {
                self.calls_by_id.insert(id.clone(), slot);
                call.id = id;
            }
        }
        if call.name.is_empty() {
            if let Some(name) = name {
                call.name = name;
            }
        }
        call.arguments.push_str(&arguments);

        Ok(FragmentPart::ToolCall(ToolCallFragment {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments,
        }))
    }

    fn has_no_id(&self, slot: usize) -> bool {
        matches!(
            self.contents.get(slot),
            Some(Content::ToolCall(call)) if call.id.is_empty()
        )
    }

    fn push_document(&mut self, doc: DocumentFragment) -> Option<FragmentPart> {
        if let Some(url) = &doc.url {
            self.contents.push(Content::Document(Document {
                filename: doc.filename.clone(),
                source: DocumentSource::Url(url.clone()),
            }));
            return Some(FragmentPart::Document(doc));
        }
        if doc.data.is_empty() {
            return None;
        }
        match self.contents.last_mut() {
            Some(Content::Document(Document {
                filename,
                source: DocumentSource::Bytes(bytes),
            })) => {
                bytes.extend_from_slice(&doc.data);
                if filename.is_none() {
                    filename.clone_from(&doc.filename);
                }
            }
            _ => self.contents.push(Content::Document(Document {
                filename: doc.filename.clone(),
                source: DocumentSource::Bytes(doc.data.clone()),
            })),
        }
        Some(FragmentPart::Document(doc))
    }
}
