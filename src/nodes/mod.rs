//! The per-thread node actors: the KVS worker thread and the routing thread.
//!
//! Each actor processes one inbound message at a time to completion and owns
//! all of its state except the shared ring snapshot, so handler logic is
//! data-race-free within a thread. Handlers never perform I/O themselves;
//! they return `(Address, Message)` batches for the external transport driver
//! to deliver.

pub use self::{kvs::KvsNode, routing::RoutingNode};

pub mod kvs;
pub mod routing;
