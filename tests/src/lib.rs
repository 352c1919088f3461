//! # Vote Sync Test Suite
//!
//! End-to-end scenarios driving a full `SyncLayer` against a mock ledger
//! node and mock registry/relayer services.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs       # Mock websocket node, mock services, layer builder
//! └── integration/
//!     ├── scenarios.rs  # Reference election flows
//!     ├── realtime.rs   # Websocket feed, polling fallback, teardown
//!     └── submission.rs # Relayer and registry surface
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p vote-tests
//!
//! # By category
//! cargo test -p vote-tests integration::realtime::
//!
//! # Benchmarks
//! cargo bench -p vote-tests
//! ```

pub mod fixtures;
pub mod integration;
