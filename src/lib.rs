//! An in-process, typed publish/subscribe event bus.
//!
//! Values of any `Clone + Send + Sync + 'static` type can be published on a
//! [`Bus`] and fanned out to every current subscriber of that type. A single
//! pump task serializes delivery; publishers and subscribers never talk to
//! each other directly.
//!
//! ```no_run
//! # async fn example() {
//! use eventbus::{Bus, BusConfig};
//!
//! let bus = Bus::new(BusConfig::default());
//! let publishers = bus.client("weather-station");
//! let dashboard = bus.client("dashboard");
//!
//! let publisher = publishers.publisher::<f64>();
//! let mut subscriber = dashboard.subscribe::<f64>();
//!
//! publisher.publish(21.5).await;
//! assert_eq!(subscriber.events().recv().await, Some(21.5));
//!
//! bus.close().await;
//! # }
//! ```
//!
//! Out of scope: cross-process delivery, durability/replay, ordering across
//! distinct topic types, exactly-once semantics, and priority classes. See
//! the [`Bus`], [`Client`], [`Publisher`], and [`Subscriber`] docs for the
//! full design.

mod bus;
mod client;
mod config;
mod envelope;
mod error;
mod publisher;
mod queue;
mod registry;
mod shutdown;
mod subscriber;

pub use bus::Bus;
pub use client::Client;
pub use config::BusConfig;
pub use envelope::BusValue;
pub use error::BusError;
pub use publisher::Publisher;
pub use subscriber::{EventStream, Subscriber};
