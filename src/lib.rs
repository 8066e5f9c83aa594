//! `emlview` — a decoder for raw RFC 822 / MIME email.
//!
//! This crate provides the core library for turning an opaque byte blob
//! (a message as received over the wire or loaded from storage) into a
//! navigable tree of typed parts with decoded bodies, extracted headers,
//! and located attachments. Real-world mail is frequently non-conformant,
//! so the parser is deliberately permissive: everything short of a buffer
//! that is not text at all degrades instead of failing.

pub mod error;
pub mod model;
pub mod parser;
