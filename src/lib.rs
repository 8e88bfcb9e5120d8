// Facility and fleet operations core: room reservations and route/resource
// status coordination over in-memory stores

pub mod clock;
pub mod config;
pub mod console;
pub mod facilities;
pub mod reservations;
pub mod resources;
pub mod routes;

// Re-export key types for convenience
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{AssignmentPolicy, ConfigError, ConflictPolicy, ConsoleConfig};
pub use console::Console;
pub use facilities::{FacilityError, FacilityStore, Room, RoomStatus};
pub use reservations::{
    NewReservation, Reservation, ReservationError, ReservationScheduler, ReservationStatus,
    TimeWindow,
};
pub use resources::{
    Driver, DriverDirectory, DriverStatus, ResourceDirectory, ResourceError, ResourceStatus,
    Vehicle, VehicleDirectory, VehicleStatus,
};
pub use routes::{DeliveryRoute, Destination, RouteCoordinator, RouteError, RouteStatus};

// Opaque identifier for every stored entity
pub(crate) fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
