mod chunks;
mod sse;

pub(crate) use chunks::Chunks;
pub(crate) use sse::Sse;
