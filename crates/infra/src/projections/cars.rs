//! Cars read model: one row per car with its current color, plate, and tires.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use parkflow_events::{ApplyError, EventEnvelope, Projection, ProjectionStatus};
use parkflow_garage::car::{CarEvent, TirePosition};

use crate::read_model::ReadModelStore;

/// Query-side view of a single car, keyed by the stream's entity key.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CarReadModel {
    pub car_id: String,
    pub color: Option<String>,
    pub plate: Option<String>,
    pub tires: Vec<TirePosition>,
}

/// Projects `car` streams into [`CarReadModel`] rows.
pub struct CarsProjection<S> {
    store: Arc<S>,
}

impl<S> CarsProjection<S>
where
    S: ReadModelStore<String, CarReadModel>,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn get(&self, car_id: &str) -> Option<CarReadModel> {
        self.store.get(&car_id.to_string())
    }

    pub fn list(&self) -> Vec<CarReadModel> {
        self.store.list()
    }

    /// Drop every row. Used when rebuilding the read model from history.
    pub fn clear(&self) {
        self.store.clear();
    }
}

impl<S> Projection for CarsProjection<S>
where
    S: ReadModelStore<String, CarReadModel>,
{
    fn entity_type(&self) -> &'static str {
        "car"
    }

    fn project(&self, envelope: &EventEnvelope) -> Result<ProjectionStatus, ApplyError> {
        let event: CarEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ApplyError::Deserialize(e.to_string()))?;

        let key = envelope.stream_name().entity_key().to_string();
        let mut row = self.store.get(&key).unwrap_or_else(|| CarReadModel {
            car_id: key.clone(),
            ..CarReadModel::default()
        });

        match event {
            CarEvent::CarCreated(_) => {}
            CarEvent::CarPainted(e) => {
                row.color = Some(e.color);
            }
            CarEvent::PlateRegistered(e) => {
                row.plate = Some(e.plate);
            }
            CarEvent::TireFitted(e) => {
                // Redelivery guard: a tire fits each position at most once.
                if !row.tires.contains(&e.position) {
                    row.tires.push(e.position);
                }
            }
        }

        self.store.upsert(key, row);
        Ok(ProjectionStatus::Applied)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    use parkflow_core::StreamName;
    use parkflow_events::Event;
    use parkflow_garage::car::{CarId, CarPainted, TireFitted};

    use crate::read_model::InMemoryReadModelStore;

    use super::*;

    fn envelope(version: u64, event: &CarEvent) -> EventEnvelope {
        EventEnvelope::new(
            Uuid::now_v7(),
            StreamName::from_parts("car", "1").unwrap(),
            "car",
            event.event_type(),
            version,
            serde_json::to_value(event).unwrap(),
            Utc::now(),
        )
    }

    fn projection() -> CarsProjection<InMemoryReadModelStore<String, CarReadModel>> {
        CarsProjection::new(Arc::new(InMemoryReadModelStore::new()))
    }

    #[test]
    fn paint_and_tire_events_build_the_row() {
        let projection = projection();
        let painted = CarEvent::CarPainted(CarPainted {
            car_id: CarId::new("1").unwrap(),
            color: "red".to_string(),
            occurred_at: Utc::now(),
        });
        let fitted = CarEvent::TireFitted(TireFitted {
            car_id: CarId::new("1").unwrap(),
            position: TirePosition::FrontLeft,
            occurred_at: Utc::now(),
        });

        assert_eq!(
            projection.project(&envelope(2, &painted)).unwrap(),
            ProjectionStatus::Applied
        );
        projection.project(&envelope(3, &fitted)).unwrap();

        let row = projection.get("1").unwrap();
        assert_eq!(row.color.as_deref(), Some("red"));
        assert_eq!(row.tires, vec![TirePosition::FrontLeft]);
    }

    #[test]
    fn refitting_the_same_position_does_not_duplicate() {
        let projection = projection();
        let fitted = CarEvent::TireFitted(TireFitted {
            car_id: CarId::new("1").unwrap(),
            position: TirePosition::RearLeft,
            occurred_at: Utc::now(),
        });

        projection.project(&envelope(2, &fitted)).unwrap();
        projection.project(&envelope(2, &fitted)).unwrap();

        assert_eq!(projection.get("1").unwrap().tires.len(), 1);
    }

    #[test]
    fn malformed_payload_is_a_deserialize_error() {
        let projection = projection();
        let envelope = EventEnvelope::new(
            Uuid::now_v7(),
            StreamName::from_parts("car", "1").unwrap(),
            "car",
            "garage.car.exploded",
            1,
            json!({ "Exploded": {} }),
            Utc::now(),
        );

        let err = projection.project(&envelope).unwrap_err();
        assert!(matches!(err, ApplyError::Deserialize(_)));
        assert!(projection.get("1").is_none());
    }
}
