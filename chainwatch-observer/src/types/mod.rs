//! Domain types for the observation engine.
//!
//! - [`primitives`] - validated newtypes and API-boundary parsing
//! - [`block`] - block records and head notices
//! - [`transaction`] - monitored transactions and their filters
//! - [`event`] - monitored events, reorg records, user actions

pub mod block;
pub mod event;
pub mod primitives;
pub mod transaction;

pub use block::{BlockRecord, HeadNotice};
pub use event::{ActionKind, EventFilter, MonitoredEvent, ReorgRecord, UserAction};
pub use primitives::{EventId, parse_address, parse_hash};
pub use transaction::{FailureReason, MonitoredTransaction, TransactionFilter, TxStatus};
