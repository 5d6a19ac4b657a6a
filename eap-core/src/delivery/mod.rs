//! Delivery notification handling: the push-event model and the listener
//! state machine that waits for this session's distribution.

pub mod clock;
pub mod event;
pub mod listener;

pub use clock::{Clock, ManualClock, SystemClock};
pub use event::{DeliveryEvent, EventKind, EventStream, StreamEvent, StreamRead};
pub use listener::{
    CancelFlag, DeliveredArtifact, DeliveryListener, ListenOutcome, ListenStats, ListenerConfig,
    ListenerState, Transition, WaitReason, DEFAULT_LISTEN_WINDOW_MINUTES,
};
