//! ovim-spoke — spoke agent coordination for the OVIM hub.
//!
//! Delivers operations to spoke agents and processes the results they
//! send back. Everything is best-effort and in-memory: delivery is
//! at-least-once, queues never expire, and nothing survives a restart.
//!
//! # Architecture
//!
//! ```text
//! SpokeHub
//!   ├── CallbackResolver   loopback callback URL → cluster FQDN
//!   ├── WorkerPool         bounded channel + fixed workers
//!   ├── Dispatcher
//!   │   ├── push  POST <endpoint>/operations (30s, 200/202 only)
//!   │   └── fallback → per-agent FIFO queue, drained by polls
//!   └── ResultProcessor
//!       ├── store result (overwrite)
//!       ├── classify: metadata → queued op → payload shape
//!       └── deletions → CompletionClient (deletion-complete)
//! ```

pub mod completion;
pub mod dispatcher;
pub mod error;
pub mod hub;
pub mod pool;
pub mod processor;
pub mod resolver;

pub use completion::{CompletionClient, DeletionComplete};
pub use dispatcher::{new_operation, new_operation_id, Dispatcher};
pub use error::{SpokeError, SpokeResult};
pub use hub::{SpokeConfig, SpokeHub};
pub use pool::WorkerPool;
pub use processor::{Classification, Outcome, ResultProcessor};
pub use resolver::CallbackResolver;
