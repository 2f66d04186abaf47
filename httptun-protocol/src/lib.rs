//! Wire envelope and header constants shared by the ingress and egress relays.

pub mod envelope;
pub mod headers;

pub use envelope::{decode, encode, Encoded};
