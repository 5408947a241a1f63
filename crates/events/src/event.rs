use chrono::{DateTime, Utc};

/// A domain-agnostic event.
///
/// Events are:
/// - **immutable** (treat them as facts)
/// - **versioned** (schema evolution)
/// - designed to be **append-only**
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name/type identifier (e.g. "garage.car.created").
    ///
    /// This is the envelope's type tag; the payload's serde tag must resolve
    /// to the same variant so that replay and projection agree on the type.
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn schema_version(&self) -> u32;

    /// When the event occurred (business time, distinct from the
    /// store-assigned persistence time).
    fn occurred_at(&self) -> DateTime<Utc>;
}
