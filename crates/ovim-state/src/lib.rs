//! ovim-state — in-memory spoke coordination state for the OVIM hub.
//!
//! Holds the latest status report per spoke agent, the per-agent FIFO
//! queues of pending operations, terminal operation results, resolved
//! callback endpoints, and the operation metadata side-table used to
//! correlate results after an operation has left its queue.
//!
//! # Architecture
//!
//! ```text
//! SpokeRegistry (Clone, Arc-backed)
//!   ├── agents     RwLock<HashMap<agent_id, AgentStatusReport>>
//!   ├── endpoints  RwLock<HashMap<agent_id, resolved callback URL>>
//!   ├── queues     RwLock<HashMap<agent_id, VecDeque<Operation>>>
//!   ├── results    RwLock<HashMap<operation_id, OperationResult>>
//!   └── metadata   RwLock<HashMap<operation_id, OperationMetadata>>
//! ```
//!
//! Each map has its own lock and no method holds two of them at once.
//! Nothing is persisted: a hub restart forgets every agent, queue and
//! result.

pub mod error;
pub mod registry;
pub mod types;

pub use error::{StateError, StateResult};
pub use registry::SpokeRegistry;
pub use types::*;
