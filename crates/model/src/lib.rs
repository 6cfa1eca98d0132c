//! An abstraction layer over LLM chat providers.
//!
//! This crate establishes the generic vocabulary shared by every vendor:
//! messages, streamed fragments, usage, and the normalized chunk record
//! that vendor adapters produce from their bespoke JSON packets.
//!
//! Types in this crate don't define any behavior beyond validation and
//! normalization. The two traits, [`Adapter`] and [`Transport`], are the
//! seams where vendor mappings and the HTTP stack plug in.

#![deny(missing_docs)]

mod adapter;
mod chunk;
mod error;
mod fragment;
mod message;
mod request;
mod response;
mod transport;
mod usage;

pub use adapter::*;
pub use chunk::*;
pub use error::*;
pub use fragment::*;
pub use message::*;
pub use request::*;
pub use response::*;
pub use transport::*;
pub use usage::*;
