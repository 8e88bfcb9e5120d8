// Facilities: rooms, equipment, maintenance records, utility consumption,
// and the store that routes room bookings through the reservation scheduler

use std::{fmt, sync::Arc};

use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::reservations::{
    NewReservation, Reservation, ReservationError, ReservationScheduler, ReservationStatus,
    ReservationUpdate,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FacilityError {
    #[error("Facility not found: {0}")]
    FacilityNotFound(String),

    #[error("Room not found: {0}")]
    RoomNotFound(String),

    #[error("Equipment not found: {0}")]
    EquipmentNotFound(String),

    #[error("Maintenance record not found: {0}")]
    MaintenanceRecordNotFound(String),

    #[error("Utility consumption entry not found: {0}")]
    UtilityNotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacilityKind {
    Office,
    Warehouse,
    Retail,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacilityStatus {
    Active,
    Inactive,
    UnderMaintenance,
    UnderConstruction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomKind {
    Meeting,
    Office,
    Storage,
    Common,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Available,
    Occupied,
    Maintenance,
    Reserved,
}

impl RoomStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RoomStatus::Available => "available",
            RoomStatus::Occupied => "occupied",
            RoomStatus::Maintenance => "maintenance",
            RoomStatus::Reserved => "reserved",
        }
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentStatus {
    Operational,
    Maintenance,
    Broken,
    Retired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceKind {
    Preventive,
    Corrective,
    Inspection,
    Emergency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UtilityKind {
    Electricity,
    Water,
    Gas,
    Internet,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    pub id: String,
    pub name: String,
    pub address: String,
    pub kind: FacilityKind,
    pub size_m2: f64,
    pub floors: u32,
    pub status: FacilityStatus,
    pub maintenance_records: Vec<FacilityMaintenanceRecord>,
    pub rooms: Vec<Room>,
    pub utilities: Vec<UtilityConsumption>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub facility_id: String,
    pub name: String,
    pub kind: RoomKind,
    pub capacity: u32,
    pub floor: i32,
    pub status: RoomStatus,
    pub equipment: Vec<Equipment>,
    pub reservations: Vec<Reservation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equipment {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub serial_number: Option<String>,
    pub purchase_date: NaiveDate,
    pub warranty_expiration: Option<NaiveDate>,
    pub status: EquipmentStatus,
    pub last_maintenance_date: Option<NaiveDate>,
    pub next_maintenance_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityMaintenanceRecord {
    pub id: String,
    pub facility_id: String,
    pub date: NaiveDate,
    pub kind: MaintenanceKind,
    pub description: String,
    pub area: String,
    pub cost: f64,
    pub provider: String,
    pub status: MaintenanceStatus,
    pub completion_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtilityConsumption {
    pub id: String,
    pub facility_id: String,
    pub kind: UtilityKind,
    pub year: i32,
    pub month: u32,
    pub reading: f64,
    pub unit: String,
    pub cost: f64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFacility {
    pub name: String,
    pub address: String,
    pub kind: FacilityKind,
    pub size_m2: f64,
    pub floors: u32,
    pub status: FacilityStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FacilityUpdate {
    pub name: Option<String>,
    pub address: Option<String>,
    pub kind: Option<FacilityKind>,
    pub size_m2: Option<f64>,
    pub floors: Option<u32>,
    pub status: Option<FacilityStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRoom {
    pub name: String,
    pub kind: RoomKind,
    pub capacity: u32,
    pub floor: i32,
    pub status: RoomStatus,
}

// Status can be forced here (e.g. into maintenance) without going through bookings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoomUpdate {
    pub name: Option<String>,
    pub kind: Option<RoomKind>,
    pub capacity: Option<u32>,
    pub floor: Option<i32>,
    pub status: Option<RoomStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEquipment {
    pub name: String,
    pub kind: String,
    pub serial_number: Option<String>,
    pub purchase_date: NaiveDate,
    pub warranty_expiration: Option<NaiveDate>,
    pub status: EquipmentStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EquipmentUpdate {
    pub name: Option<String>,
    pub status: Option<EquipmentStatus>,
    pub warranty_expiration: Option<NaiveDate>,
    pub last_maintenance_date: Option<NaiveDate>,
    pub next_maintenance_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMaintenanceRecord {
    pub date: NaiveDate,
    pub kind: MaintenanceKind,
    pub description: String,
    pub area: String,
    pub cost: f64,
    pub provider: String,
    pub status: MaintenanceStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaintenanceUpdate {
    pub date: Option<NaiveDate>,
    pub description: Option<String>,
    pub cost: Option<f64>,
    pub provider: Option<String>,
    pub status: Option<MaintenanceStatus>,
    pub completion_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUtilityConsumption {
    pub kind: UtilityKind,
    pub year: i32,
    pub month: u32,
    pub reading: f64,
    pub unit: String,
    pub cost: f64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UtilityUpdate {
    pub reading: Option<f64>,
    pub cost: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpcomingMaintenance {
    pub facility_id: String,
    pub facility_name: String,
    pub record: FacilityMaintenanceRecord,
}

/// Per-month series for one utility kind in one year, sorted by month.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UtilityStats {
    pub readings: Vec<f64>,
    pub costs: Vec<f64>,
    pub months: Vec<u32>,
}

pub struct FacilityStore {
    facilities: DashMap<String, Facility>,
    scheduler: ReservationScheduler,
    clock: Arc<dyn Clock>,
}

impl FacilityStore {
    pub fn new(scheduler: ReservationScheduler, clock: Arc<dyn Clock>) -> Self {
        Self {
            facilities: DashMap::new(),
            scheduler,
            clock,
        }
    }

    fn with_facility<T>(
        &self,
        facility_id: &str,
        f: impl FnOnce(&mut Facility) -> Result<T, FacilityError>,
    ) -> Result<T, FacilityError> {
        let mut facility = self
            .facilities
            .get_mut(facility_id)
            .ok_or_else(|| FacilityError::FacilityNotFound(facility_id.to_string()))?;
        f(facility.value_mut())
    }

    fn with_room<T>(
        &self,
        facility_id: &str,
        room_id: &str,
        f: impl FnOnce(&mut Room) -> Result<T, FacilityError>,
    ) -> Result<T, FacilityError> {
        self.with_facility(facility_id, |facility| {
            let room = facility
                .rooms
                .iter_mut()
                .find(|r| r.id == room_id)
                .ok_or_else(|| FacilityError::RoomNotFound(room_id.to_string()))?;
            f(room)
        })
    }

    // Booking paths report lookups with reservation errors
    fn with_bookable_room<T>(
        &self,
        facility_id: &str,
        room_id: &str,
        f: impl FnOnce(&ReservationScheduler, &mut Room, DateTime<Utc>) -> Result<T, ReservationError>,
    ) -> Result<T, ReservationError> {
        let mut facility = self
            .facilities
            .get_mut(facility_id)
            .ok_or_else(|| ReservationError::FacilityNotFound(facility_id.to_string()))?;
        let room = facility
            .rooms
            .iter_mut()
            .find(|r| r.id == room_id)
            .ok_or_else(|| ReservationError::RoomNotFound(room_id.to_string()))?;
        f(&self.scheduler, room, self.clock.now())
    }

    // Facilities

    pub fn add_facility(&self, new: NewFacility) -> Facility {
        let facility = Facility {
            id: crate::generate_id(),
            name: new.name,
            address: new.address,
            kind: new.kind,
            size_m2: new.size_m2,
            floors: new.floors,
            status: new.status,
            maintenance_records: vec![],
            rooms: vec![],
            utilities: vec![],
        };
        self.facilities.insert(facility.id.clone(), facility.clone());
        info!(facility_id = %facility.id, name = %facility.name, "facility added");
        facility
    }

    pub fn get_facility(&self, facility_id: &str) -> Option<Facility> {
        self.facilities.get(facility_id).map(|f| f.value().clone())
    }

    /// All facilities ordered by name.
    pub fn list_facilities(&self) -> Vec<Facility> {
        let mut all: Vec<Facility> = self.facilities.iter().map(|f| f.value().clone()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub fn update_facility(
        &self,
        facility_id: &str,
        update: FacilityUpdate,
    ) -> Result<Facility, FacilityError> {
        self.with_facility(facility_id, |facility| {
            if let Some(name) = update.name {
                facility.name = name;
            }
            if let Some(address) = update.address {
                facility.address = address;
            }
            if let Some(kind) = update.kind {
                facility.kind = kind;
            }
            if let Some(size_m2) = update.size_m2 {
                facility.size_m2 = size_m2;
            }
            if let Some(floors) = update.floors {
                facility.floors = floors;
            }
            if let Some(status) = update.status {
                facility.status = status;
            }
            debug!(facility_id, "facility updated");
            Ok(facility.clone())
        })
    }

    pub fn delete_facility(&self, facility_id: &str) -> Result<Facility, FacilityError> {
        let (_, removed) = self
            .facilities
            .remove(facility_id)
            .ok_or_else(|| FacilityError::FacilityNotFound(facility_id.to_string()))?;
        info!(facility_id, "facility deleted");
        Ok(removed)
    }

    // Rooms

    pub fn add_room(&self, facility_id: &str, new: NewRoom) -> Result<Room, FacilityError> {
        self.with_facility(facility_id, |facility| {
            let room = Room {
                id: crate::generate_id(),
                facility_id: facility.id.clone(),
                name: new.name,
                kind: new.kind,
                capacity: new.capacity,
                floor: new.floor,
                status: new.status,
                equipment: vec![],
                reservations: vec![],
            };
            facility.rooms.push(room.clone());
            info!(facility_id, room_id = %room.id, "room added");
            Ok(room)
        })
    }

    pub fn get_room(&self, facility_id: &str, room_id: &str) -> Result<Room, FacilityError> {
        self.with_room(facility_id, room_id, |room| Ok(room.clone()))
    }

    pub fn update_room(
        &self,
        facility_id: &str,
        room_id: &str,
        update: RoomUpdate,
    ) -> Result<Room, FacilityError> {
        self.with_room(facility_id, room_id, |room| {
            if let Some(name) = update.name {
                room.name = name;
            }
            if let Some(kind) = update.kind {
                room.kind = kind;
            }
            if let Some(capacity) = update.capacity {
                room.capacity = capacity;
            }
            if let Some(floor) = update.floor {
                room.floor = floor;
            }
            if let Some(status) = update.status {
                room.status = status;
            }
            debug!(room_id, status = %room.status, "room updated");
            Ok(room.clone())
        })
    }

    pub fn delete_room(&self, facility_id: &str, room_id: &str) -> Result<Room, FacilityError> {
        self.with_facility(facility_id, |facility| {
            let index = facility
                .rooms
                .iter()
                .position(|r| r.id == room_id)
                .ok_or_else(|| FacilityError::RoomNotFound(room_id.to_string()))?;
            info!(facility_id, room_id, "room deleted");
            Ok(facility.rooms.remove(index))
        })
    }

    /// Rooms currently `available`, optionally narrowed to one kind.
    pub fn available_rooms(
        &self,
        facility_id: &str,
        kind: Option<RoomKind>,
    ) -> Result<Vec<Room>, FacilityError> {
        let facility = self
            .facilities
            .get(facility_id)
            .ok_or_else(|| FacilityError::FacilityNotFound(facility_id.to_string()))?;
        Ok(facility
            .rooms
            .iter()
            .filter(|r| r.status == RoomStatus::Available)
            .filter(|r| kind.map_or(true, |k| r.kind == k))
            .cloned()
            .collect())
    }

    // Equipment

    pub fn add_equipment(
        &self,
        facility_id: &str,
        room_id: &str,
        new: NewEquipment,
    ) -> Result<Equipment, FacilityError> {
        self.with_room(facility_id, room_id, |room| {
            let equipment = Equipment {
                id: crate::generate_id(),
                name: new.name,
                kind: new.kind,
                serial_number: new.serial_number,
                purchase_date: new.purchase_date,
                warranty_expiration: new.warranty_expiration,
                status: new.status,
                last_maintenance_date: None,
                next_maintenance_date: None,
            };
            room.equipment.push(equipment.clone());
            debug!(room_id, equipment_id = %equipment.id, "equipment added");
            Ok(equipment)
        })
    }

    pub fn update_equipment(
        &self,
        facility_id: &str,
        room_id: &str,
        equipment_id: &str,
        update: EquipmentUpdate,
    ) -> Result<Equipment, FacilityError> {
        self.with_room(facility_id, room_id, |room| {
            let equipment = room
                .equipment
                .iter_mut()
                .find(|e| e.id == equipment_id)
                .ok_or_else(|| FacilityError::EquipmentNotFound(equipment_id.to_string()))?;
            if let Some(name) = update.name {
                equipment.name = name;
            }
            if let Some(status) = update.status {
                equipment.status = status;
            }
            if update.warranty_expiration.is_some() {
                equipment.warranty_expiration = update.warranty_expiration;
            }
            if update.last_maintenance_date.is_some() {
                equipment.last_maintenance_date = update.last_maintenance_date;
            }
            if update.next_maintenance_date.is_some() {
                equipment.next_maintenance_date = update.next_maintenance_date;
            }
            Ok(equipment.clone())
        })
    }

    pub fn delete_equipment(
        &self,
        facility_id: &str,
        room_id: &str,
        equipment_id: &str,
    ) -> Result<Equipment, FacilityError> {
        self.with_room(facility_id, room_id, |room| {
            let index = room
                .equipment
                .iter()
                .position(|e| e.id == equipment_id)
                .ok_or_else(|| FacilityError::EquipmentNotFound(equipment_id.to_string()))?;
            Ok(room.equipment.remove(index))
        })
    }

    // Reservations

    pub fn create_reservation(
        &self,
        facility_id: &str,
        room_id: &str,
        request: NewReservation,
    ) -> Result<Reservation, ReservationError> {
        self.with_bookable_room(facility_id, room_id, |scheduler, room, now| {
            scheduler.create_reservation(room, request, now)
        })
    }

    pub fn update_reservation_status(
        &self,
        facility_id: &str,
        room_id: &str,
        reservation_id: &str,
        status: ReservationStatus,
    ) -> Result<Reservation, ReservationError> {
        self.with_bookable_room(facility_id, room_id, |scheduler, room, _| {
            scheduler.update_reservation_status(room, reservation_id, status)
        })
    }

    pub fn update_reservation_details(
        &self,
        facility_id: &str,
        room_id: &str,
        reservation_id: &str,
        update: ReservationUpdate,
    ) -> Result<Reservation, ReservationError> {
        self.with_bookable_room(facility_id, room_id, |scheduler, room, _| {
            scheduler.update_reservation_details(room, reservation_id, update)
        })
    }

    pub fn delete_reservation(
        &self,
        facility_id: &str,
        room_id: &str,
        reservation_id: &str,
    ) -> Result<Reservation, ReservationError> {
        self.with_bookable_room(facility_id, room_id, |scheduler, room, _| {
            scheduler.delete_reservation(room, reservation_id)
        })
    }

    pub fn refresh_room_status(
        &self,
        facility_id: &str,
        room_id: &str,
    ) -> Result<RoomStatus, ReservationError> {
        self.with_bookable_room(facility_id, room_id, |scheduler, room, now| {
            Ok(scheduler.refresh_room_status(room, now))
        })
    }

    // Maintenance records

    pub fn add_maintenance_record(
        &self,
        facility_id: &str,
        new: NewMaintenanceRecord,
    ) -> Result<FacilityMaintenanceRecord, FacilityError> {
        self.with_facility(facility_id, |facility| {
            let record = FacilityMaintenanceRecord {
                id: crate::generate_id(),
                facility_id: facility.id.clone(),
                date: new.date,
                kind: new.kind,
                description: new.description,
                area: new.area,
                cost: new.cost,
                provider: new.provider,
                status: new.status,
                completion_date: None,
                notes: new.notes,
            };
            facility.maintenance_records.push(record.clone());
            info!(facility_id, record_id = %record.id, "maintenance record added");
            Ok(record)
        })
    }

    pub fn update_maintenance_record(
        &self,
        facility_id: &str,
        record_id: &str,
        update: MaintenanceUpdate,
    ) -> Result<FacilityMaintenanceRecord, FacilityError> {
        self.with_facility(facility_id, |facility| {
            let record = facility
                .maintenance_records
                .iter_mut()
                .find(|r| r.id == record_id)
                .ok_or_else(|| FacilityError::MaintenanceRecordNotFound(record_id.to_string()))?;
            if let Some(date) = update.date {
                record.date = date;
            }
            if let Some(description) = update.description {
                record.description = description;
            }
            if let Some(cost) = update.cost {
                record.cost = cost;
            }
            if let Some(provider) = update.provider {
                record.provider = provider;
            }
            if let Some(status) = update.status {
                record.status = status;
            }
            if update.completion_date.is_some() {
                record.completion_date = update.completion_date;
            }
            if update.notes.is_some() {
                record.notes = update.notes;
            }
            Ok(record.clone())
        })
    }

    pub fn delete_maintenance_record(
        &self,
        facility_id: &str,
        record_id: &str,
    ) -> Result<FacilityMaintenanceRecord, FacilityError> {
        self.with_facility(facility_id, |facility| {
            let index = facility
                .maintenance_records
                .iter()
                .position(|r| r.id == record_id)
                .ok_or_else(|| FacilityError::MaintenanceRecordNotFound(record_id.to_string()))?;
            Ok(facility.maintenance_records.remove(index))
        })
    }

    /// Every `scheduled` maintenance record across all facilities, by date.
    pub fn upcoming_maintenances(&self) -> Vec<UpcomingMaintenance> {
        let mut upcoming: Vec<UpcomingMaintenance> = self
            .facilities
            .iter()
            .flat_map(|facility| {
                facility
                    .maintenance_records
                    .iter()
                    .filter(|r| r.status == MaintenanceStatus::Scheduled)
                    .map(|record| UpcomingMaintenance {
                        facility_id: facility.id.clone(),
                        facility_name: facility.name.clone(),
                        record: record.clone(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        upcoming.sort_by(|a, b| a.record.date.cmp(&b.record.date));
        upcoming
    }

    // Utility consumption

    pub fn add_utility_consumption(
        &self,
        facility_id: &str,
        new: NewUtilityConsumption,
    ) -> Result<UtilityConsumption, FacilityError> {
        self.with_facility(facility_id, |facility| {
            let entry = UtilityConsumption {
                id: crate::generate_id(),
                facility_id: facility.id.clone(),
                kind: new.kind,
                year: new.year,
                month: new.month,
                reading: new.reading,
                unit: new.unit,
                cost: new.cost,
                notes: new.notes,
            };
            facility.utilities.push(entry.clone());
            debug!(facility_id, entry_id = %entry.id, "utility consumption recorded");
            Ok(entry)
        })
    }

    pub fn update_utility_consumption(
        &self,
        facility_id: &str,
        entry_id: &str,
        update: UtilityUpdate,
    ) -> Result<UtilityConsumption, FacilityError> {
        self.with_facility(facility_id, |facility| {
            let entry = facility
                .utilities
                .iter_mut()
                .find(|u| u.id == entry_id)
                .ok_or_else(|| FacilityError::UtilityNotFound(entry_id.to_string()))?;
            if let Some(reading) = update.reading {
                entry.reading = reading;
            }
            if let Some(cost) = update.cost {
                entry.cost = cost;
            }
            if update.notes.is_some() {
                entry.notes = update.notes;
            }
            Ok(entry.clone())
        })
    }

    pub fn delete_utility_consumption(
        &self,
        facility_id: &str,
        entry_id: &str,
    ) -> Result<UtilityConsumption, FacilityError> {
        self.with_facility(facility_id, |facility| {
            let index = facility
                .utilities
                .iter()
                .position(|u| u.id == entry_id)
                .ok_or_else(|| FacilityError::UtilityNotFound(entry_id.to_string()))?;
            Ok(facility.utilities.remove(index))
        })
    }

    pub fn utility_consumption_stats(
        &self,
        facility_id: &str,
        kind: UtilityKind,
        year: i32,
    ) -> Result<UtilityStats, FacilityError> {
        let facility = self
            .facilities
            .get(facility_id)
            .ok_or_else(|| FacilityError::FacilityNotFound(facility_id.to_string()))?;

        let mut entries: Vec<&UtilityConsumption> = facility
            .utilities
            .iter()
            .filter(|u| u.kind == kind && u.year == year)
            .collect();
        entries.sort_by_key(|u| u.month);

        Ok(UtilityStats {
            readings: entries.iter().map(|u| u.reading).collect(),
            costs: entries.iter().map(|u| u.cost).collect(),
            months: entries.iter().map(|u| u.month).collect(),
        })
    }
}
