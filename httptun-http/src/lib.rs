//! HTTP dispatch servers and data-plane client for the httptun relays.

pub mod callback;
pub mod egress;
pub mod http_client;
pub mod ingress;

pub use egress::{serve as serve_egress, EgressState};
pub use ingress::{serve as serve_ingress, IngressState};
