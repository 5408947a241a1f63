use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use parkflow_core::{Aggregate, DomainError, DomainResult, StreamName};
use parkflow_events::Event;

use crate::car::CarId;

/// Parking spot identifier: the entity-key half of a `spot-<key>` stream name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpotId(String);

impl SpotId {
    pub fn new(key: impl Into<String>) -> DomainResult<Self> {
        let key = key.into();
        StreamName::from_parts(ParkingSpot::ENTITY_TYPE, &key)?;
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for SpotId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: ParkingSpot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParkingSpot {
    id: SpotId,
    created: bool,
    level: u32,
    occupant: Option<CarId>,
}

impl ParkingSpot {
    /// Create an empty, not-yet-created instance for rehydration or creation.
    pub fn empty(id: SpotId) -> Self {
        Self {
            id,
            created: false,
            level: 0,
            occupant: None,
        }
    }

    pub fn id(&self) -> &SpotId {
        &self.id
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn occupant(&self) -> Option<&CarId> {
        self.occupant.as_ref()
    }

    pub fn is_free(&self) -> bool {
        self.occupant.is_none()
    }
}

/// Command: CreateSpot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSpot {
    pub spot_id: SpotId,
    pub level: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Occupy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupy {
    pub spot_id: SpotId,
    pub car_id: CarId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Vacate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vacate {
    pub spot_id: SpotId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpotCommand {
    CreateSpot(CreateSpot),
    Occupy(Occupy),
    Vacate(Vacate),
}

/// Event: SpotCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotCreated {
    pub spot_id: SpotId,
    pub level: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SpotOccupied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotOccupied {
    pub spot_id: SpotId,
    pub car_id: CarId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SpotVacated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotVacated {
    pub spot_id: SpotId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpotEvent {
    SpotCreated(SpotCreated),
    SpotOccupied(SpotOccupied),
    SpotVacated(SpotVacated),
}

impl Event for SpotEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SpotEvent::SpotCreated(_) => "garage.spot.created",
            SpotEvent::SpotOccupied(_) => "garage.spot.occupied",
            SpotEvent::SpotVacated(_) => "garage.spot.vacated",
        }
    }

    fn schema_version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SpotEvent::SpotCreated(e) => e.occurred_at,
            SpotEvent::SpotOccupied(e) => e.occurred_at,
            SpotEvent::SpotVacated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for ParkingSpot {
    type Command = SpotCommand;
    type Event = SpotEvent;

    const ENTITY_TYPE: &'static str = "spot";

    fn entity_key(&self) -> &str {
        self.id.as_str()
    }

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SpotEvent::SpotCreated(e) => {
                self.id = e.spot_id.clone();
                self.level = e.level;
                self.created = true;
            }
            SpotEvent::SpotOccupied(e) => {
                self.occupant = Some(e.car_id.clone());
            }
            SpotEvent::SpotVacated(_) => {
                self.occupant = None;
            }
        }
    }

    fn handle(&self, command: &Self::Command) -> DomainResult<Vec<Self::Event>> {
        match command {
            SpotCommand::CreateSpot(cmd) => self.handle_create(cmd),
            SpotCommand::Occupy(cmd) => self.handle_occupy(cmd),
            SpotCommand::Vacate(cmd) => self.handle_vacate(cmd),
        }
    }
}

impl ParkingSpot {
    fn ensure_spot_id(&self, spot_id: &SpotId) -> DomainResult<()> {
        if &self.id != spot_id {
            return Err(DomainError::business_rule("spot_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateSpot) -> DomainResult<Vec<SpotEvent>> {
        if self.created {
            return Err(DomainError::conflict("parking spot already exists"));
        }

        Ok(vec![SpotEvent::SpotCreated(SpotCreated {
            spot_id: cmd.spot_id.clone(),
            level: cmd.level,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_occupy(&self, cmd: &Occupy) -> DomainResult<Vec<SpotEvent>> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_spot_id(&cmd.spot_id)?;

        if let Some(occupant) = &self.occupant {
            return Err(DomainError::business_rule(format!(
                "spot is already occupied by car '{occupant}'"
            )));
        }

        Ok(vec![SpotEvent::SpotOccupied(SpotOccupied {
            spot_id: cmd.spot_id.clone(),
            car_id: cmd.car_id.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_vacate(&self, cmd: &Vacate) -> DomainResult<Vec<SpotEvent>> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_spot_id(&cmd.spot_id)?;

        if self.occupant.is_none() {
            return Err(DomainError::business_rule("spot is already free"));
        }

        Ok(vec![SpotEvent::SpotVacated(SpotVacated {
            spot_id: cmd.spot_id.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use parkflow_core::EventSourced;

    use super::*;

    fn spot_id() -> SpotId {
        SpotId::new("l2.17").unwrap()
    }

    fn car_id() -> CarId {
        CarId::new("1").unwrap()
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn created_spot() -> EventSourced<ParkingSpot> {
        let id = spot_id();
        EventSourced::create(
            ParkingSpot::empty(id.clone()),
            &SpotCommand::CreateSpot(CreateSpot {
                spot_id: id,
                level: 2,
                occurred_at: test_time(),
            }),
        )
        .unwrap()
    }

    #[test]
    fn create_spot_raises_created_event() {
        let root = created_spot();
        assert_eq!(root.version(), 1);
        assert_eq!(root.state().level(), 2);
        assert!(root.state().is_free());
        assert_eq!(root.stream_name().unwrap().as_str(), "spot-l2.17");
    }

    #[test]
    fn occupy_then_vacate_lifecycle() {
        let mut root = created_spot();
        root.execute(&SpotCommand::Occupy(Occupy {
            spot_id: spot_id(),
            car_id: car_id(),
            occurred_at: test_time(),
        }))
        .unwrap();
        assert_eq!(root.state().occupant(), Some(&car_id()));

        root.execute(&SpotCommand::Vacate(Vacate {
            spot_id: spot_id(),
            occurred_at: test_time(),
        }))
        .unwrap();
        assert!(root.state().is_free());
        assert_eq!(root.version(), 3);
    }

    #[test]
    fn cannot_occupy_an_occupied_spot() {
        let mut root = created_spot();
        let occupy = SpotCommand::Occupy(Occupy {
            spot_id: spot_id(),
            car_id: car_id(),
            occurred_at: test_time(),
        });
        root.execute(&occupy).unwrap();

        let err = root.execute(&occupy).unwrap_err();
        assert!(matches!(err, DomainError::BusinessRule(_)));
    }

    #[test]
    fn cannot_vacate_a_free_spot() {
        let mut root = created_spot();
        let err = root
            .execute(&SpotCommand::Vacate(Vacate {
                spot_id: spot_id(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::BusinessRule(_)));
    }

    #[test]
    fn rehydrate_reproduces_live_state() {
        let mut live = created_spot();
        live.execute(&SpotCommand::Occupy(Occupy {
            spot_id: spot_id(),
            car_id: car_id(),
            occurred_at: test_time(),
        }))
        .unwrap();

        let replayed =
            EventSourced::rehydrate(ParkingSpot::empty(spot_id()), live.pending_events().to_vec());
        assert_eq!(replayed.state(), live.state());
        assert_eq!(replayed.version(), live.version());
    }
}
