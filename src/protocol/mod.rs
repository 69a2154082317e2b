//! Wire Protocol Module
//!
//! One JSON object per UDP datagram, UTF-8, snake_case fields. Every message
//! carries `command`, `sender_id`, and a (possibly empty) `updates` array;
//! the command decides the remaining fields.
//!
//! Decoding classifies failures: a well-formed JSON object with an unknown
//! `command` is reported as such (the dispatcher signals it), anything else
//! is a parse error and the datagram is dropped.

pub mod wire;

pub use wire::{CodecError, Message, WireUpdate, decode, encode};
