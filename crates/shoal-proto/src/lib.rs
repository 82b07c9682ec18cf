//! Shared protocol definitions for the shoal discovery endpoint and its
//! clients. Keeping this in a dedicated crate lets the server, the viewer
//! client, and external tooling agree on the wire shapes without pulling in
//! runtime code.
//!
//! Every message on the wire is a JSON text frame of the form
//! `{"type": <string>, "data": <object>}`. Known messages are modeled as
//! adjacently-tagged enums; anything else survives decoding as a raw
//! [`Envelope`] so new message kinds never break an older peer.

mod envelope;
mod messages;

pub use envelope::{Decoded, Envelope};
pub use messages::{ClientMessage, ServerMessage, StreamDescriptor};
