use std::sync::Arc;

use genai_relay_model::{
    Adapter, Chunk, DecodePolicy, DeltaPart, Error, FinishReason, Role, Usage,
};

/// A vendor packet after normalization and the candidate policy.
#[derive(Debug, PartialEq)]
pub(crate) enum Packet {
    /// A packet without candidates, e.g. a trailing usage report.
    Heartbeat { usage: Option<Usage> },
    /// The delta of the single candidate.
    Delta {
        role: Option<Role>,
        parts: Vec<DeltaPart>,
        finish_reason: Option<FinishReason>,
        usage: Option<Usage>,
    },
}

/// Turns raw payloads into [`Packet`]s using a vendor adapter.
pub(crate) struct PacketDecoder<A> {
    adapter: Arc<A>,
    policy: DecodePolicy,
}

impl<A: Adapter> PacketDecoder<A> {
    #[inline]
    pub(crate) fn new(adapter: Arc<A>, policy: DecodePolicy) -> Self {
        Self { adapter, policy }
    }

    #[inline]
    pub(crate) fn name(&self) -> &'static str {
        self.adapter.name()
    }

    /// Decodes one stream payload.
    pub(crate) fn decode(&self, payload: &str) -> Result<Packet, Error> {
        let chunk = self.adapter.decode_chunk(payload, self.policy)?;
        trace!("decoded chunk: {chunk:?}");
        into_packet(chunk)
    }

    /// Decodes a complete response body, which must hold exactly one
    /// candidate.
    pub(crate) fn decode_response(&self, body: &[u8]) -> Result<Packet, Error> {
        let chunk = self.adapter.decode_response(body, self.policy)?;
        match chunk.candidates.len() {
            1 => into_packet(chunk),
            n => Err(Error::protocol(format!(
                "expected exactly 1 candidate in the response, got {n}"
            ))),
        }
    }
}

pub(crate) fn into_packet(chunk: Chunk) -> Result<Packet, Error> {
    let Chunk {
        mut candidates,
        usage,
    } = chunk;
    let usage = usage.filter(|usage| !usage.is_zero());
    if candidates.len() > 1 {
        return Err(Error::protocol(format!(
            "expected at most 1 candidate, got {}",
            candidates.len()
        )));
    }
    let Some(delta) = candidates.pop() else {
        return Ok(Packet::Heartbeat { usage });
    };
    Ok(Packet::Delta {
        role: Role::from_marker(&delta.role)?,
        parts: delta.parts,
        finish_reason: delta.finish_reason,
        usage,
    })
}

#[cfg(test)]
mod tests {
    use genai_relay_model::{Delta, ErrorKind};

    use super::*;

    #[test]
    fn test_single_candidate() {
        let chunk = Chunk::single(Delta::with_role("assistant").text("Hi"));
        let packet = into_packet(chunk).unwrap();
        assert_eq!(
            packet,
            Packet::Delta {
                role: Some(Role::Assistant),
                parts: vec![DeltaPart::Text("Hi".to_owned())],
                finish_reason: None,
                usage: None,
            }
        );
    }

    #[test]
    fn test_heartbeat() {
        let chunk = Chunk::default().with_usage(Usage::tokens(10, 20));
        let packet = into_packet(chunk).unwrap();
        assert_eq!(
            packet,
            Packet::Heartbeat {
                usage: Some(Usage::tokens(10, 20))
            }
        );

        let chunk = Chunk::default().with_usage(Usage::default());
        let packet = into_packet(chunk).unwrap();
        assert_eq!(packet, Packet::Heartbeat { usage: None });
    }

    #[test]
    fn test_multiple_candidates() {
        let chunk = Chunk {
            candidates: vec![Delta::default(), Delta::default()],
            usage: None,
        };
        let err = into_packet(chunk).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    #[test]
    fn test_unknown_role() {
        let chunk = Chunk::single(Delta::with_role("narrator"));
        let err = into_packet(chunk).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }
}
