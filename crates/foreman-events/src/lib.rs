//! Foreman Events - Event bus for the delegation runtime.
//!
//! The runtime emits lifecycle events ([`RuntimeEvent`]) tagged with the
//! originating worker name and call depth. Frontends subscribe through the
//! broadcast-based [`EventBus`]; the runtime never renders, only emits.
//!
//! # Example
//!
//! ```rust
//! use foreman_events::{EventBus, EventMetadata, RuntimeEvent};
//!
//! # async fn example() {
//! let bus = EventBus::new();
//! let mut receiver = bus.subscribe();
//!
//! bus.publish(RuntimeEvent::Completion {
//!     metadata: EventMetadata::new("planner", 0),
//!     summary: "done".to_string(),
//! });
//!
//! let event = receiver.recv().await.unwrap();
//! assert_eq!(event.event_type(), "completion");
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod bus;
mod event;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, EventReceiver};
pub use event::{EventMetadata, RuntimeEvent};
