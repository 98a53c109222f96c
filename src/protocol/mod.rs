//! The OPRF exchange as a conversation with a server.
//!
//! [`session`] holds the state machine and knows nothing about I/O.
//! [`client`] drives a session over a [`channel::TextChannel`], adding
//! timeouts, cancellation and channel cleanup.

pub mod channel;
pub mod client;
pub mod messages;
pub mod session;

pub use channel::LineChannel;
pub use channel::TextChannel;
pub use client::ClientConfig;
pub use client::OprfClient;
pub use session::ExchangeSession;
pub use session::SessionPhase;
