//! `parkflow-garage` — garage domain aggregates.
//!
//! Pure domain logic: cars and parking spots as event-sourced aggregates.
//! No IO, no storage concerns; those live in `parkflow-infra`.

pub mod car;
pub mod spot;

pub use car::{Car, CarCommand, CarEvent, CarId, TirePosition};
pub use spot::{ParkingSpot, SpotCommand, SpotEvent, SpotId};
