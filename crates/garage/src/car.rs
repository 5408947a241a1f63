use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use parkflow_core::{Aggregate, DomainError, DomainResult, StreamName};
use parkflow_events::Event;

/// Car identifier: the entity-key half of a `car-<key>` stream name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CarId(String);

impl CarId {
    pub fn new(key: impl Into<String>) -> DomainResult<Self> {
        let key = key.into();
        // Same rules as the stream name it will be embedded in.
        StreamName::from_parts(Car::ENTITY_TYPE, &key)?;
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for CarId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Wheel position of a fitted tire.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TirePosition {
    FrontLeft,
    FrontRight,
    RearLeft,
    RearRight,
}

/// Aggregate root: Car.
///
/// Tires are composite sub-entities: each position can be fitted at most
/// once, which is validated per command and re-checked as a whole in
/// `check_invariants` before every save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Car {
    id: CarId,
    created: bool,
    color: Option<String>,
    plate: Option<String>,
    tires: Vec<TirePosition>,
}

impl Car {
    /// Create an empty, not-yet-created instance for rehydration or creation.
    pub fn empty(id: CarId) -> Self {
        Self {
            id,
            created: false,
            color: None,
            plate: None,
            tires: Vec::new(),
        }
    }

    pub fn id(&self) -> &CarId {
        &self.id
    }

    pub fn color(&self) -> Option<&str> {
        self.color.as_deref()
    }

    pub fn plate(&self) -> Option<&str> {
        self.plate.as_deref()
    }

    pub fn tires(&self) -> &[TirePosition] {
        &self.tires
    }
}

/// Command: CreateCar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCar {
    pub car_id: CarId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: PaintCar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaintCar {
    pub car_id: CarId,
    pub color: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RegisterPlate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterPlate {
    pub car_id: CarId,
    pub plate: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: FitTire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitTire {
    pub car_id: CarId,
    pub position: TirePosition,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CarCommand {
    CreateCar(CreateCar),
    PaintCar(PaintCar),
    RegisterPlate(RegisterPlate),
    FitTire(FitTire),
}

/// Event: CarCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarCreated {
    pub car_id: CarId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CarPainted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarPainted {
    pub car_id: CarId,
    pub color: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PlateRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlateRegistered {
    pub car_id: CarId,
    pub plate: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TireFitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TireFitted {
    pub car_id: CarId,
    pub position: TirePosition,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CarEvent {
    CarCreated(CarCreated),
    CarPainted(CarPainted),
    PlateRegistered(PlateRegistered),
    TireFitted(TireFitted),
}

impl Event for CarEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CarEvent::CarCreated(_) => "garage.car.created",
            CarEvent::CarPainted(_) => "garage.car.painted",
            CarEvent::PlateRegistered(_) => "garage.car.plate_registered",
            CarEvent::TireFitted(_) => "garage.car.tire_fitted",
        }
    }

    fn schema_version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CarEvent::CarCreated(e) => e.occurred_at,
            CarEvent::CarPainted(e) => e.occurred_at,
            CarEvent::PlateRegistered(e) => e.occurred_at,
            CarEvent::TireFitted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Car {
    type Command = CarCommand;
    type Event = CarEvent;

    const ENTITY_TYPE: &'static str = "car";

    fn entity_key(&self) -> &str {
        self.id.as_str()
    }

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CarEvent::CarCreated(e) => {
                self.id = e.car_id.clone();
                self.created = true;
            }
            CarEvent::CarPainted(e) => {
                self.color = Some(e.color.clone());
            }
            CarEvent::PlateRegistered(e) => {
                self.plate = Some(e.plate.clone());
            }
            CarEvent::TireFitted(e) => {
                self.tires.push(e.position);
            }
        }
    }

    fn handle(&self, command: &Self::Command) -> DomainResult<Vec<Self::Event>> {
        match command {
            CarCommand::CreateCar(cmd) => self.handle_create(cmd),
            CarCommand::PaintCar(cmd) => self.handle_paint(cmd),
            CarCommand::RegisterPlate(cmd) => self.handle_register_plate(cmd),
            CarCommand::FitTire(cmd) => self.handle_fit_tire(cmd),
        }
    }

    fn check_invariants(&self) -> DomainResult<()> {
        if self.tires.len() > 4 {
            return Err(DomainError::business_rule(
                "a car cannot have more than four tires",
            ));
        }
        for (idx, position) in self.tires.iter().enumerate() {
            if self.tires[..idx].contains(position) {
                return Err(DomainError::business_rule(format!(
                    "duplicate tire at position {position:?}"
                )));
            }
        }
        Ok(())
    }
}

impl Car {
    fn ensure_car_id(&self, car_id: &CarId) -> DomainResult<()> {
        if &self.id != car_id {
            return Err(DomainError::business_rule("car_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateCar) -> DomainResult<Vec<CarEvent>> {
        if self.created {
            return Err(DomainError::conflict("car already exists"));
        }

        Ok(vec![CarEvent::CarCreated(CarCreated {
            car_id: cmd.car_id.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_paint(&self, cmd: &PaintCar) -> DomainResult<Vec<CarEvent>> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_car_id(&cmd.car_id)?;

        if cmd.color.trim().is_empty() {
            return Err(DomainError::validation("color must not be empty"));
        }

        Ok(vec![CarEvent::CarPainted(CarPainted {
            car_id: cmd.car_id.clone(),
            color: cmd.color.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_register_plate(&self, cmd: &RegisterPlate) -> DomainResult<Vec<CarEvent>> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_car_id(&cmd.car_id)?;

        if cmd.plate.trim().is_empty() || cmd.plate.contains(char::is_whitespace) {
            return Err(DomainError::validation(
                "plate must be non-empty and free of whitespace",
            ));
        }
        if self.plate.is_some() {
            return Err(DomainError::business_rule("plate already registered"));
        }

        Ok(vec![CarEvent::PlateRegistered(PlateRegistered {
            car_id: cmd.car_id.clone(),
            plate: cmd.plate.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_fit_tire(&self, cmd: &FitTire) -> DomainResult<Vec<CarEvent>> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_car_id(&cmd.car_id)?;

        if self.tires.contains(&cmd.position) {
            return Err(DomainError::business_rule(format!(
                "tire already fitted at position {:?}",
                cmd.position
            )));
        }
        if self.tires.len() >= 4 {
            return Err(DomainError::business_rule("all four tires already fitted"));
        }

        Ok(vec![CarEvent::TireFitted(TireFitted {
            car_id: cmd.car_id.clone(),
            position: cmd.position,
            occurred_at: cmd.occurred_at,
        })])
    }
}
