//! Spot occupancy read model: which car (if any) sits in each parking spot.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use parkflow_events::{ApplyError, EventEnvelope, Projection, ProjectionStatus};
use parkflow_garage::spot::SpotEvent;

use crate::read_model::ReadModelStore;

/// Query-side view of a single parking spot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpotReadModel {
    pub spot_id: String,
    pub level: u32,
    pub occupant: Option<String>,
}

/// Projects `spot` streams into [`SpotReadModel`] rows.
pub struct SpotOccupancyProjection<S> {
    store: Arc<S>,
}

impl<S> SpotOccupancyProjection<S>
where
    S: ReadModelStore<String, SpotReadModel>,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn get(&self, spot_id: &str) -> Option<SpotReadModel> {
        self.store.get(&spot_id.to_string())
    }

    pub fn list(&self) -> Vec<SpotReadModel> {
        self.store.list()
    }

    /// Drop every row. Used when rebuilding the read model from history.
    pub fn clear(&self) {
        self.store.clear();
    }
}

impl<S> Projection for SpotOccupancyProjection<S>
where
    S: ReadModelStore<String, SpotReadModel>,
{
    fn entity_type(&self) -> &'static str {
        "spot"
    }

    fn project(&self, envelope: &EventEnvelope) -> Result<ProjectionStatus, ApplyError> {
        let event: SpotEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ApplyError::Deserialize(e.to_string()))?;

        let key = envelope.stream_name().entity_key().to_string();
        let mut row = self.store.get(&key).unwrap_or_else(|| SpotReadModel {
            spot_id: key.clone(),
            ..SpotReadModel::default()
        });

        match event {
            SpotEvent::SpotCreated(e) => {
                row.level = e.level;
            }
            SpotEvent::SpotOccupied(e) => {
                row.occupant = Some(e.car_id.to_string());
            }
            SpotEvent::SpotVacated(_) => {
                row.occupant = None;
            }
        }

        self.store.upsert(key, row);
        Ok(ProjectionStatus::Applied)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use parkflow_core::StreamName;
    use parkflow_events::Event;
    use parkflow_garage::car::CarId;
    use parkflow_garage::spot::{SpotCreated, SpotId, SpotOccupied, SpotVacated};

    use crate::read_model::InMemoryReadModelStore;

    use super::*;

    fn envelope(version: u64, event: &SpotEvent) -> EventEnvelope {
        EventEnvelope::new(
            Uuid::now_v7(),
            StreamName::from_parts("spot", "l2.17").unwrap(),
            "spot",
            event.event_type(),
            version,
            serde_json::to_value(event).unwrap(),
            Utc::now(),
        )
    }

    fn projection() -> SpotOccupancyProjection<InMemoryReadModelStore<String, SpotReadModel>> {
        SpotOccupancyProjection::new(Arc::new(InMemoryReadModelStore::new()))
    }

    #[test]
    fn occupancy_lifecycle_is_reflected() {
        let projection = projection();
        let spot_id = SpotId::new("l2.17").unwrap();

        projection
            .project(&envelope(
                1,
                &SpotEvent::SpotCreated(SpotCreated {
                    spot_id: spot_id.clone(),
                    level: 2,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();
        projection
            .project(&envelope(
                2,
                &SpotEvent::SpotOccupied(SpotOccupied {
                    spot_id: spot_id.clone(),
                    car_id: CarId::new("1").unwrap(),
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();

        let row = projection.get("l2.17").unwrap();
        assert_eq!(row.level, 2);
        assert_eq!(row.occupant.as_deref(), Some("1"));

        projection
            .project(&envelope(
                3,
                &SpotEvent::SpotVacated(SpotVacated {
                    spot_id,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();
        assert_eq!(projection.get("l2.17").unwrap().occupant, None);
    }
}
