//! `parkflow-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! stream identity, the domain error model, and the event-sourced aggregate
//! engine (`Aggregate` + `EventSourced`).

pub mod aggregate;
pub mod error;
pub mod id;

pub use aggregate::{Aggregate, EventSourced, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::StreamName;
