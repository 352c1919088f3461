//! # Application Module
//!
//! Services orchestrating the domain, codec and outbound ports.

pub mod admin;
pub mod chain_reader;
pub mod event_stream;
pub mod sync_layer;
pub mod wallet_session;

pub use admin::AdminWriter;
pub use chain_reader::ChainReader;
pub use event_stream::{EventStream, StreamSettings, VoteSubscription};
pub use sync_layer::{SyncLayer, SyncParts};
pub use wallet_session::{NetworkSpec, SessionState, WalletSession};
