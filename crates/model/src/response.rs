use serde::{Deserialize, Serialize};

use crate::{Message, Usage};

/// The outcome of a completed call.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Completion {
    /// The reply. Exactly one message per call.
    pub message: Message,
    /// Token accounting and finish reason.
    pub usage: Usage,
}

/// A model advertised by a provider.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct Model {
    /// The identifier to pass when creating a client.
    pub id: String,
    /// A human readable description, if the provider has one.
    pub description: Option<String>,
    /// The context window in tokens, if reported.
    pub context_length: Option<u64>,
}

/// How strictly vendor payloads are decoded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DecodePolicy {
    /// Unknown fields are a decode error. This catches vendor API drift
    /// early instead of silently dropping data.
    #[default]
    Strict,
    /// Unknown fields are ignored.
    Lenient,
}
