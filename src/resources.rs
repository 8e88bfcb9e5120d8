// Fleet resources: drivers and vehicles, and the directory seam the route
// coordinator uses to claim and release them

use std::fmt;

use chrono::NaiveDate;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Driver,
    Vehicle,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Driver => f.write_str("driver"),
            ResourceKind::Vehicle => f.write_str("vehicle"),
        }
    }
}

/// Status of either resource kind, for callers that handle both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "status", rename_all = "snake_case")]
pub enum ResourceStatus {
    Driver(DriverStatus),
    Vehicle(VehicleStatus),
}

impl ResourceStatus {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceStatus::Driver(_) => ResourceKind::Driver,
            ResourceStatus::Vehicle(_) => ResourceKind::Vehicle,
        }
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceStatus::Driver(status) => fmt::Display::fmt(status, f),
            ResourceStatus::Vehicle(status) => fmt::Display::fmt(status, f),
        }
    }
}

impl From<DriverStatus> for ResourceStatus {
    fn from(status: DriverStatus) -> Self {
        ResourceStatus::Driver(status)
    }
}

impl From<VehicleStatus> for ResourceStatus {
    fn from(status: VehicleStatus) -> Self {
        ResourceStatus::Vehicle(status)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResourceError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: ResourceKind, id: String },
}

/// Lookup and status mutation for one kind of resource, keyed by opaque id.
pub trait ResourceDirectory: Send + Sync + 'static {
    type Resource: Clone;
    type Status: Copy + PartialEq + fmt::Debug + fmt::Display + Into<ResourceStatus>;

    const KIND: ResourceKind;
    const AVAILABLE: Self::Status;
    const BUSY: Self::Status;

    fn find_by_id(&self, id: &str) -> Option<Self::Resource>;

    fn status_of(&self, id: &str) -> Option<Self::Status>;

    // Returns the previous status, None when the id is unknown
    fn set_status(&self, id: &str, status: Self::Status) -> Option<Self::Status>;
}

// Drivers

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverStatus {
    Available,
    OnRoute,
    OffDuty,
    Inactive,
}

impl fmt::Display for DriverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DriverStatus::Available => "available",
            DriverStatus::OnRoute => "on_route",
            DriverStatus::OffDuty => "off_duty",
            DriverStatus::Inactive => "inactive",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub license_number: String,
    pub license_type: String,
    pub license_expiration: NaiveDate,
    pub status: DriverStatus,
    pub current_vehicle_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDriver {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub license_number: String,
    pub license_type: String,
    pub license_expiration: NaiveDate,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriverUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub license_number: Option<String>,
    pub license_type: Option<String>,
    pub license_expiration: Option<NaiveDate>,
    pub current_vehicle_id: Option<String>,
}

#[derive(Default)]
pub struct DriverDirectory {
    drivers: DashMap<String, Driver>,
}

impl DriverDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// New drivers start out `available`.
    pub fn add(&self, new: NewDriver) -> Driver {
        let driver = Driver {
            id: crate::generate_id(),
            name: new.name,
            email: new.email,
            phone: new.phone,
            license_number: new.license_number,
            license_type: new.license_type,
            license_expiration: new.license_expiration,
            status: DriverStatus::Available,
            current_vehicle_id: None,
        };
        self.drivers.insert(driver.id.clone(), driver.clone());
        info!(driver_id = %driver.id, "driver added");
        driver
    }

    pub fn update(&self, id: &str, update: DriverUpdate) -> Result<Driver, ResourceError> {
        let mut driver = self.drivers.get_mut(id).ok_or_else(|| ResourceError::NotFound {
            kind: ResourceKind::Driver,
            id: id.to_string(),
        })?;
        if let Some(name) = update.name {
            driver.name = name;
        }
        if let Some(email) = update.email {
            driver.email = email;
        }
        if let Some(phone) = update.phone {
            driver.phone = phone;
        }
        if let Some(license_number) = update.license_number {
            driver.license_number = license_number;
        }
        if let Some(license_type) = update.license_type {
            driver.license_type = license_type;
        }
        if let Some(license_expiration) = update.license_expiration {
            driver.license_expiration = license_expiration;
        }
        if update.current_vehicle_id.is_some() {
            driver.current_vehicle_id = update.current_vehicle_id;
        }
        Ok(driver.clone())
    }

    pub fn delete(&self, id: &str) -> Result<Driver, ResourceError> {
        let (_, removed) = self.drivers.remove(id).ok_or_else(|| ResourceError::NotFound {
            kind: ResourceKind::Driver,
            id: id.to_string(),
        })?;
        info!(driver_id = id, "driver deleted");
        Ok(removed)
    }

    pub fn list(&self) -> Vec<Driver> {
        let mut all: Vec<Driver> = self.drivers.iter().map(|d| d.value().clone()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub fn by_status(&self, status: DriverStatus) -> Vec<Driver> {
        let mut matching: Vec<Driver> = self
            .drivers
            .iter()
            .filter(|d| d.status == status)
            .map(|d| d.value().clone())
            .collect();
        matching.sort_by(|a, b| a.name.cmp(&b.name));
        matching
    }
}

impl ResourceDirectory for DriverDirectory {
    type Resource = Driver;
    type Status = DriverStatus;

    const KIND: ResourceKind = ResourceKind::Driver;
    const AVAILABLE: DriverStatus = DriverStatus::Available;
    const BUSY: DriverStatus = DriverStatus::OnRoute;

    fn find_by_id(&self, id: &str) -> Option<Driver> {
        self.drivers.get(id).map(|d| d.value().clone())
    }

    fn status_of(&self, id: &str) -> Option<DriverStatus> {
        self.drivers.get(id).map(|d| d.status)
    }

    fn set_status(&self, id: &str, status: DriverStatus) -> Option<DriverStatus> {
        let mut driver = self.drivers.get_mut(id)?;
        let previous = std::mem::replace(&mut driver.status, status);
        debug!(driver_id = id, from = %previous, to = %status, "driver status changed");
        Some(previous)
    }
}

// Vehicles

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleStatus {
    Available,
    InUse,
    Maintenance,
    Inactive,
}

impl fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VehicleStatus::Available => "available",
            VehicleStatus::InUse => "in_use",
            VehicleStatus::Maintenance => "maintenance",
            VehicleStatus::Inactive => "inactive",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleKind {
    Car,
    Truck,
    Van,
    Motorcycle,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuelType {
    Gasoline,
    Diesel,
    Ethanol,
    Electric,
    Hybrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Valid,
    Expired,
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleMaintenanceKind {
    Preventive,
    Corrective,
    Inspection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleDocument {
    pub id: String,
    pub kind: String,
    pub name: Option<String>,
    pub number: String,
    pub expiration_date: NaiveDate,
    pub status: DocumentStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleMaintenanceRecord {
    pub id: String,
    pub date: NaiveDate,
    pub kind: VehicleMaintenanceKind,
    pub description: String,
    pub cost: f64,
    pub odometer_km: u64,
    pub provider: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelRecord {
    pub id: String,
    pub date: NaiveDate,
    pub fuel_type: FuelType,
    pub liters: f64,
    pub cost: f64,
    pub odometer_km: u64,
    pub full_tank: bool,
    pub station: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: String,
    pub plate: String,
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub kind: VehicleKind,
    pub status: VehicleStatus,
    pub fuel_type: FuelType,
    pub fuel_efficiency_km_l: f64,
    pub last_maintenance: Option<NaiveDate>,
    pub next_maintenance: Option<NaiveDate>,
    pub odometer_km: u64,
    pub documents: Vec<VehicleDocument>,
    pub maintenance_history: Vec<VehicleMaintenanceRecord>,
    pub fuel_history: Vec<FuelRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVehicle {
    pub plate: String,
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub kind: VehicleKind,
    pub fuel_type: FuelType,
    pub fuel_efficiency_km_l: f64,
    pub next_maintenance: Option<NaiveDate>,
    pub odometer_km: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VehicleUpdate {
    pub plate: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub fuel_efficiency_km_l: Option<f64>,
    pub next_maintenance: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVehicleDocument {
    pub kind: String,
    pub name: Option<String>,
    pub number: String,
    pub expiration_date: NaiveDate,
    pub status: DocumentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVehicleMaintenance {
    pub date: NaiveDate,
    pub kind: VehicleMaintenanceKind,
    pub description: String,
    pub cost: f64,
    pub odometer_km: u64,
    pub provider: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFuelRecord {
    pub date: NaiveDate,
    pub fuel_type: FuelType,
    pub liters: f64,
    pub cost: f64,
    pub odometer_km: u64,
    pub full_tank: bool,
    pub station: String,
}

#[derive(Default)]
pub struct VehicleDirectory {
    vehicles: DashMap<String, Vehicle>,
}

impl VehicleDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn not_found(id: &str) -> ResourceError {
        ResourceError::NotFound {
            kind: ResourceKind::Vehicle,
            id: id.to_string(),
        }
    }

    /// New vehicles start out `available` with empty histories.
    pub fn add(&self, new: NewVehicle) -> Vehicle {
        let vehicle = Vehicle {
            id: crate::generate_id(),
            plate: new.plate,
            brand: new.brand,
            model: new.model,
            year: new.year,
            kind: new.kind,
            status: VehicleStatus::Available,
            fuel_type: new.fuel_type,
            fuel_efficiency_km_l: new.fuel_efficiency_km_l,
            last_maintenance: None,
            next_maintenance: new.next_maintenance,
            odometer_km: new.odometer_km,
            documents: vec![],
            maintenance_history: vec![],
            fuel_history: vec![],
        };
        self.vehicles.insert(vehicle.id.clone(), vehicle.clone());
        info!(vehicle_id = %vehicle.id, plate = %vehicle.plate, "vehicle added");
        vehicle
    }

    pub fn update(&self, id: &str, update: VehicleUpdate) -> Result<Vehicle, ResourceError> {
        let mut vehicle = self.vehicles.get_mut(id).ok_or_else(|| Self::not_found(id))?;
        if let Some(plate) = update.plate {
            vehicle.plate = plate;
        }
        if let Some(brand) = update.brand {
            vehicle.brand = brand;
        }
        if let Some(model) = update.model {
            vehicle.model = model;
        }
        if let Some(year) = update.year {
            vehicle.year = year;
        }
        if let Some(efficiency) = update.fuel_efficiency_km_l {
            vehicle.fuel_efficiency_km_l = efficiency;
        }
        if update.next_maintenance.is_some() {
            vehicle.next_maintenance = update.next_maintenance;
        }
        Ok(vehicle.clone())
    }

    pub fn delete(&self, id: &str) -> Result<Vehicle, ResourceError> {
        let (_, removed) = self.vehicles.remove(id).ok_or_else(|| Self::not_found(id))?;
        info!(vehicle_id = id, "vehicle deleted");
        Ok(removed)
    }

    pub fn list(&self) -> Vec<Vehicle> {
        let mut all: Vec<Vehicle> = self.vehicles.iter().map(|v| v.value().clone()).collect();
        all.sort_by(|a, b| a.plate.cmp(&b.plate));
        all
    }

    pub fn by_status(&self, status: VehicleStatus) -> Vec<Vehicle> {
        let mut matching: Vec<Vehicle> = self
            .vehicles
            .iter()
            .filter(|v| v.status == status)
            .map(|v| v.value().clone())
            .collect();
        matching.sort_by(|a, b| a.plate.cmp(&b.plate));
        matching
    }

    /// Appends to the history and moves `last_maintenance` and the odometer
    /// to the record's values.
    pub fn add_maintenance_record(
        &self,
        id: &str,
        new: NewVehicleMaintenance,
    ) -> Result<VehicleMaintenanceRecord, ResourceError> {
        let mut vehicle = self.vehicles.get_mut(id).ok_or_else(|| Self::not_found(id))?;
        let record = VehicleMaintenanceRecord {
            id: crate::generate_id(),
            date: new.date,
            kind: new.kind,
            description: new.description,
            cost: new.cost,
            odometer_km: new.odometer_km,
            provider: new.provider,
            notes: new.notes,
        };
        vehicle.last_maintenance = Some(record.date);
        vehicle.odometer_km = record.odometer_km;
        vehicle.maintenance_history.push(record.clone());
        debug!(vehicle_id = id, record_id = %record.id, "vehicle maintenance recorded");
        Ok(record)
    }

    pub fn add_fuel_record(&self, id: &str, new: NewFuelRecord) -> Result<FuelRecord, ResourceError> {
        let mut vehicle = self.vehicles.get_mut(id).ok_or_else(|| Self::not_found(id))?;
        let record = FuelRecord {
            id: crate::generate_id(),
            date: new.date,
            fuel_type: new.fuel_type,
            liters: new.liters,
            cost: new.cost,
            odometer_km: new.odometer_km,
            full_tank: new.full_tank,
            station: new.station,
        };
        vehicle.odometer_km = record.odometer_km;
        vehicle.fuel_history.push(record.clone());
        Ok(record)
    }

    pub fn add_document(
        &self,
        id: &str,
        new: NewVehicleDocument,
    ) -> Result<VehicleDocument, ResourceError> {
        let mut vehicle = self.vehicles.get_mut(id).ok_or_else(|| Self::not_found(id))?;
        let document = VehicleDocument {
            id: crate::generate_id(),
            kind: new.kind,
            name: new.name,
            number: new.number,
            expiration_date: new.expiration_date,
            status: new.status,
        };
        vehicle.documents.push(document.clone());
        Ok(document)
    }
}

impl ResourceDirectory for VehicleDirectory {
    type Resource = Vehicle;
    type Status = VehicleStatus;

    const KIND: ResourceKind = ResourceKind::Vehicle;
    const AVAILABLE: VehicleStatus = VehicleStatus::Available;
    const BUSY: VehicleStatus = VehicleStatus::InUse;

    fn find_by_id(&self, id: &str) -> Option<Vehicle> {
        self.vehicles.get(id).map(|v| v.value().clone())
    }

    fn status_of(&self, id: &str) -> Option<VehicleStatus> {
        self.vehicles.get(id).map(|v| v.status)
    }

    fn set_status(&self, id: &str, status: VehicleStatus) -> Option<VehicleStatus> {
        let mut vehicle = self.vehicles.get_mut(id)?;
        let previous = std::mem::replace(&mut vehicle.status, status);
        debug!(vehicle_id = id, from = %previous, to = %status, "vehicle status changed");
        Some(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn van() -> NewVehicle {
        NewVehicle {
            plate: "DEF-5678".to_string(),
            brand: "Fiat".to_string(),
            model: "Fiorino".to_string(),
            year: 2021,
            kind: VehicleKind::Van,
            fuel_type: FuelType::Gasoline,
            fuel_efficiency_km_l: 10.2,
            next_maintenance: None,
            odometer_km: 25_000,
        }
    }

    fn driver(name: &str) -> NewDriver {
        NewDriver {
            name: name.to_string(),
            email: "driver@example.com".to_string(),
            phone: "(11) 98765-4321".to_string(),
            license_number: "12345678901".to_string(),
            license_type: "D".to_string(),
            license_expiration: date(2028, 1, 1),
        }
    }

    #[test]
    fn test_resource_status_keeps_kind_and_wire_name() {
        let status: ResourceStatus = VehicleStatus::InUse.into();
        assert_eq!(status.kind(), ResourceKind::Vehicle);
        assert_eq!(status.to_string(), "in_use");
        assert_eq!(
            serde_json::to_value(ResourceStatus::from(DriverStatus::OnRoute)).unwrap(),
            serde_json::json!({ "kind": "driver", "status": "on_route" })
        );
    }

    #[test]
    fn test_driver_status_roundtrip_through_directory() {
        let drivers = DriverDirectory::new();
        let joao = drivers.add(driver("Joao"));
        let maria = drivers.add(driver("Maria"));
        assert_eq!(joao.status, DriverStatus::Available);

        assert_eq!(
            drivers.set_status(&joao.id, DriverStatus::OnRoute),
            Some(DriverStatus::Available)
        );
        assert_eq!(drivers.status_of(&joao.id), Some(DriverStatus::OnRoute));
        assert_eq!(drivers.set_status("ghost", DriverStatus::OnRoute), None);

        let available = drivers.by_status(DriverStatus::Available);
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].id, maria.id);
    }

    #[test]
    fn test_driver_update_and_delete() {
        let drivers = DriverDirectory::new();
        let joao = drivers.add(driver("Joao"));

        let updated = drivers
            .update(
                &joao.id,
                DriverUpdate {
                    license_type: Some("E".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.license_type, "E");
        assert_eq!(updated.name, "Joao");

        drivers.delete(&joao.id).unwrap();
        assert!(drivers.find_by_id(&joao.id).is_none());
        assert_eq!(
            drivers.delete(&joao.id),
            Err(ResourceError::NotFound {
                kind: ResourceKind::Driver,
                id: joao.id.clone(),
            })
        );
    }

    #[test]
    fn test_vehicle_records_move_odometer() {
        let vehicles = VehicleDirectory::new();
        let van = vehicles.add(van());

        vehicles
            .add_fuel_record(
                &van.id,
                NewFuelRecord {
                    date: date(2025, 5, 2),
                    fuel_type: FuelType::Gasoline,
                    liters: 50.0,
                    cost: 300.0,
                    odometer_km: 25_400,
                    full_tank: true,
                    station: "Shell".to_string(),
                },
            )
            .unwrap();
        assert_eq!(vehicles.find_by_id(&van.id).unwrap().odometer_km, 25_400);

        vehicles
            .add_maintenance_record(
                &van.id,
                NewVehicleMaintenance {
                    date: date(2025, 5, 10),
                    kind: VehicleMaintenanceKind::Preventive,
                    description: "Full service".to_string(),
                    cost: 650.0,
                    odometer_km: 25_900,
                    provider: "Fiat dealer".to_string(),
                    notes: None,
                },
            )
            .unwrap();
        vehicles
            .add_document(
                &van.id,
                NewVehicleDocument {
                    kind: "Registration".to_string(),
                    name: None,
                    number: "987654321".to_string(),
                    expiration_date: date(2026, 1, 31),
                    status: DocumentStatus::Valid,
                },
            )
            .unwrap();

        let van = vehicles.find_by_id(&van.id).unwrap();
        assert_eq!(van.odometer_km, 25_900);
        assert_eq!(van.last_maintenance, Some(date(2025, 5, 10)));
        assert_eq!(van.fuel_history.len(), 1);
        assert_eq!(van.maintenance_history.len(), 1);
        assert_eq!(van.documents.len(), 1);
    }

    #[test]
    fn test_vehicle_lookups_report_missing_ids() {
        let vehicles = VehicleDirectory::new();
        let result = vehicles.update("ghost", VehicleUpdate::default());
        assert_eq!(
            result,
            Err(ResourceError::NotFound {
                kind: ResourceKind::Vehicle,
                id: "ghost".to_string(),
            })
        );
        assert!(vehicles.by_status(VehicleStatus::Available).is_empty());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&DriverStatus::OnRoute).unwrap(), "\"on_route\"");
        assert_eq!(serde_json::to_string(&VehicleStatus::InUse).unwrap(), "\"in_use\"");
        assert_eq!(DriverStatus::OnRoute.to_string(), "on_route");
    }
}
