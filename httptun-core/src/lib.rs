//! Session model, registry and adaptive buffering shared by both relays.

pub mod buffer;
pub mod events;
pub mod registry;
pub mod session;

pub use buffer::AdaptiveBuffer;
pub use events::{EventSink, SessionEndReason, TracingEventSink};
pub use registry::SessionRegistry;
pub use session::{Session, SessionState};
