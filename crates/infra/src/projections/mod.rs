//! Read-model projections for the garage domain.
//!
//! Each projection owns one entity type and folds that aggregate's events
//! into a query-optimized row. All mutations are keyed upserts, so replaying
//! an already-projected event is harmless.

pub mod cars;
pub mod spots;

pub use cars::{CarReadModel, CarsProjection};
pub use spots::{SpotOccupancyProjection, SpotReadModel};
