// Process-wide context: built once at start-up and handed to every caller

use std::sync::Arc;

use tracing::info;

use crate::clock::{Clock, SystemClock};
use crate::config::ConsoleConfig;
use crate::facilities::FacilityStore;
use crate::reservations::ReservationScheduler;
use crate::resources::{DriverDirectory, VehicleDirectory};
use crate::routes::RouteCoordinator;

pub struct Console {
    config: ConsoleConfig,
    clock: Arc<dyn Clock>,
    facilities: FacilityStore,
    drivers: Arc<DriverDirectory>,
    vehicles: Arc<VehicleDirectory>,
    routes: RouteCoordinator,
}

impl Console {
    pub fn new(config: ConsoleConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Builds empty stores wired to `clock` and the configured policies.
    pub fn with_clock(config: ConsoleConfig, clock: Arc<dyn Clock>) -> Self {
        let drivers = Arc::new(DriverDirectory::new());
        let vehicles = Arc::new(VehicleDirectory::new());
        let facilities = FacilityStore::new(
            ReservationScheduler::new(config.conflict_policy),
            clock.clone(),
        );
        let routes = RouteCoordinator::new(
            drivers.clone(),
            vehicles.clone(),
            config.assignment_policy,
            clock.clone(),
        );

        info!(
            conflict_policy = ?config.conflict_policy,
            assignment_policy = ?config.assignment_policy,
            "console initialized"
        );

        Self {
            config,
            clock,
            facilities,
            drivers,
            vehicles,
            routes,
        }
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn facilities(&self) -> &FacilityStore {
        &self.facilities
    }

    pub fn drivers(&self) -> &DriverDirectory {
        &self.drivers
    }

    pub fn vehicles(&self) -> &VehicleDirectory {
        &self.vehicles
    }

    pub fn routes(&self) -> &RouteCoordinator {
        &self.routes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::config::ConflictPolicy;
    use crate::facilities::{
        FacilityKind, FacilityStatus, NewFacility, NewRoom, RoomKind, RoomStatus,
    };
    use crate::reservations::{NewReservation, ReservationError, ReservationStatus, TimeWindow};
    use crate::resources::{
        DriverStatus, FuelType, NewDriver, NewVehicle, ResourceDirectory, VehicleKind,
        VehicleStatus,
    };
    use crate::routes::{NewDestination, NewRoute, RouteStatus};
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, hour, minute, 0).unwrap()
    }

    fn console_at(now: DateTime<Utc>, config: ConsoleConfig) -> Console {
        Console::with_clock(config, Arc::new(FixedClock::new(now)))
    }

    fn book(
        console: &Console,
        facility_id: &str,
        room_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<String, ReservationError> {
        console
            .facilities()
            .create_reservation(
                facility_id,
                room_id,
                NewReservation {
                    user_id: "u1".to_string(),
                    user_name: "Joao Silva".to_string(),
                    purpose: "Planning meeting".to_string(),
                    window: TimeWindow::new(from, to)?,
                    attendees: 8,
                    notes: None,
                },
            )
            .map(|r| r.id)
    }

    fn facility_with_room(console: &Console) -> (String, String) {
        let facility = console.facilities().add_facility(NewFacility {
            name: "Headquarters".to_string(),
            address: "1000 Paulista Ave".to_string(),
            kind: FacilityKind::Office,
            size_m2: 1500.0,
            floors: 3,
            status: FacilityStatus::Active,
        });
        let room = console
            .facilities()
            .add_room(
                &facility.id,
                NewRoom {
                    name: "Meeting Room 1".to_string(),
                    kind: RoomKind::Meeting,
                    capacity: 10,
                    floor: 1,
                    status: RoomStatus::Available,
                },
            )
            .unwrap();
        (facility.id, room.id)
    }

    #[test]
    fn test_room_booking_scenario() {
        let console = console_at(at(9, 0), ConsoleConfig::default());
        let (facility_id, room_id) = facility_with_room(&console);

        book(&console, &facility_id, &room_id, at(10, 0), at(11, 0)).unwrap();
        let room = console.facilities().get_room(&facility_id, &room_id).unwrap();
        assert_eq!(room.status, RoomStatus::Reserved);

        let overlapping = book(&console, &facility_id, &room_id, at(10, 30), at(11, 30));
        assert!(matches!(overlapping, Err(ReservationError::TimeConflict { .. })));

        book(&console, &facility_id, &room_id, at(11, 0), at(12, 0)).unwrap();
        let room = console.facilities().get_room(&facility_id, &room_id).unwrap();
        assert_eq!(room.reservations.len(), 2);
    }

    #[test]
    fn test_room_booking_inside_window_occupies() {
        let console = console_at(at(10, 15), ConsoleConfig::default());
        let (facility_id, room_id) = facility_with_room(&console);

        book(&console, &facility_id, &room_id, at(10, 0), at(11, 0)).unwrap();
        let room = console.facilities().get_room(&facility_id, &room_id).unwrap();
        assert_eq!(room.status, RoomStatus::Occupied);
    }

    #[test]
    fn test_conflict_policy_flows_from_config() {
        let config = ConsoleConfig {
            conflict_policy: ConflictPolicy::ActiveOnly,
            ..Default::default()
        };
        let console = console_at(at(9, 0), config);
        let (facility_id, room_id) = facility_with_room(&console);

        let first = book(&console, &facility_id, &room_id, at(10, 0), at(11, 0)).unwrap();
        console
            .facilities()
            .update_reservation_status(&facility_id, &room_id, &first, ReservationStatus::Cancelled)
            .unwrap();
        assert!(book(&console, &facility_id, &room_id, at(10, 0), at(11, 0)).is_ok());
    }

    #[test]
    fn test_route_lifecycle_through_console() {
        let console = console_at(at(8, 0), ConsoleConfig::default());
        let driver = console.drivers().add(NewDriver {
            name: "Maria Oliveira".to_string(),
            email: "maria@example.com".to_string(),
            phone: "(11) 91234-5678".to_string(),
            license_number: "10987654321".to_string(),
            license_type: "B".to_string(),
            license_expiration: NaiveDate::from_ymd_opt(2027, 3, 1).unwrap(),
        });
        let vehicle = console.vehicles().add(NewVehicle {
            plate: "DEF-5678".to_string(),
            brand: "Fiat".to_string(),
            model: "Fiorino".to_string(),
            year: 2021,
            kind: VehicleKind::Van,
            fuel_type: FuelType::Gasoline,
            fuel_efficiency_km_l: 10.2,
            next_maintenance: None,
            odometer_km: 25_000,
        });

        let day = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let route = console
            .routes()
            .create_route(NewRoute {
                name: "East zone".to_string(),
                description: "Morning drops".to_string(),
                start_date: day,
                end_date: day,
                driver_id: driver.id.clone(),
                vehicle_id: vehicle.id.clone(),
                starting_point: "Central depot".to_string(),
                destinations: vec![NewDestination {
                    address: "500 Paulista Ave".to_string(),
                    scheduled_arrival: at(10, 0),
                    notes: None,
                    order: 1,
                }],
                total_distance_km: 18.0,
                estimated_fuel_cost: 90.0,
            })
            .unwrap();
        assert_eq!(console.drivers().status_of(&driver.id), Some(DriverStatus::OnRoute));
        assert_eq!(console.vehicles().status_of(&vehicle.id), Some(VehicleStatus::InUse));

        let stop = console
            .routes()
            .complete_destination(&route.id, &route.destinations[0].id)
            .unwrap();
        assert_eq!(stop.actual_arrival, Some(console.clock().now()));
        assert_eq!(
            console.routes().get_route(&route.id).unwrap().status,
            RouteStatus::Completed
        );
        assert_eq!(console.drivers().by_status(DriverStatus::Available).len(), 1);
        assert_eq!(console.vehicles().by_status(VehicleStatus::Available).len(), 1);
    }
}
