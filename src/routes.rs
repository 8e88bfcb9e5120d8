// Delivery routes and the coordinator that keeps driver/vehicle status in
// step with the routes consuming them

use std::{fmt, sync::Arc};

use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::AssignmentPolicy;
use crate::resources::{
    DriverDirectory, ResourceDirectory, ResourceError, ResourceStatus, VehicleDirectory,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RouteError {
    #[error("Route not found: {0}")]
    RouteNotFound(String),

    #[error("Destination {destination_id} not found on route {route_id}")]
    DestinationNotFound {
        route_id: String,
        destination_id: String,
    },

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error("{} {id} is not available ({status})", .status.kind())]
    ResourceUnavailable { id: String, status: ResourceStatus },

    #[error("Route {route_id} is {status}, destinations complete only while in_progress")]
    RouteNotInProgress { route_id: String, status: RouteStatus },

    #[error("Route {route_id} cannot go from {from} to {to}")]
    InvalidTransition {
        route_id: String,
        from: RouteStatus,
        to: RouteStatus,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteStatus {
    Planned,
    InProgress,
    Completed,
    Cancelled,
}

impl RouteStatus {
    pub fn can_transition_to(self, next: RouteStatus) -> bool {
        matches!(
            (self, next),
            (RouteStatus::Planned, RouteStatus::InProgress)
                | (RouteStatus::Planned, RouteStatus::Cancelled)
                | (RouteStatus::InProgress, RouteStatus::Completed)
                | (RouteStatus::InProgress, RouteStatus::Cancelled)
        )
    }
}

impl fmt::Display for RouteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RouteStatus::Planned => "planned",
            RouteStatus::InProgress => "in_progress",
            RouteStatus::Completed => "completed",
            RouteStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationStatus {
    Pending,
    Arrived,
    Completed,
    Skipped,
    Delayed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    pub id: String,
    pub address: String,
    pub scheduled_arrival: DateTime<Utc>,
    pub actual_arrival: Option<DateTime<Utc>>,
    pub status: DestinationStatus,
    pub notes: Option<String>,
    pub order: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRoute {
    pub id: String,
    pub name: String,
    pub description: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: RouteStatus,
    pub driver_id: String,
    pub vehicle_id: String,
    pub starting_point: String,
    pub destinations: Vec<Destination>,
    pub total_distance_km: f64,
    pub estimated_fuel_cost: f64,
}

impl DeliveryRoute {
    pub fn all_destinations_completed(&self) -> bool {
        self.destinations
            .iter()
            .all(|d| d.status == DestinationStatus::Completed)
    }

    fn insert_destination(&mut self, destination: Destination) {
        let at = self
            .destinations
            .partition_point(|d| d.order <= destination.order);
        self.destinations.insert(at, destination);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDestination {
    pub address: String,
    pub scheduled_arrival: DateTime<Utc>,
    pub notes: Option<String>,
    pub order: u32,
}

impl NewDestination {
    fn into_destination(self) -> Destination {
        Destination {
            id: crate::generate_id(),
            address: self.address,
            scheduled_arrival: self.scheduled_arrival,
            actual_arrival: None,
            status: DestinationStatus::Pending,
            notes: self.notes,
            order: self.order,
        }
    }
}

// Never cascades into route completion, even when status is set to completed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DestinationUpdate {
    pub address: Option<String>,
    pub scheduled_arrival: Option<DateTime<Utc>>,
    pub status: Option<DestinationStatus>,
    pub notes: Option<String>,
    pub order: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRoute {
    pub name: String,
    pub description: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub driver_id: String,
    pub vehicle_id: String,
    pub starting_point: String,
    pub destinations: Vec<NewDestination>,
    pub total_distance_km: f64,
    pub estimated_fuel_cost: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub starting_point: Option<String>,
    pub total_distance_km: Option<f64>,
    pub estimated_fuel_cost: Option<f64>,
}

/// Owns delivery routes and propagates their lifecycle to drivers and
/// vehicles.
///
/// A route holds its driver and vehicle busy exactly while it is
/// `in_progress`. Resources are claimed when the route starts and released
/// once, by whichever of completion, cancellation or deletion ends the
/// in-progress state first.
pub struct RouteCoordinator<D = DriverDirectory, V = VehicleDirectory> {
    routes: DashMap<String, DeliveryRoute>,
    drivers: Arc<D>,
    vehicles: Arc<V>,
    policy: AssignmentPolicy,
    clock: Arc<dyn Clock>,
}

impl<D, V> RouteCoordinator<D, V>
where
    D: ResourceDirectory,
    V: ResourceDirectory,
{
    pub fn new(
        drivers: Arc<D>,
        vehicles: Arc<V>,
        policy: AssignmentPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            routes: DashMap::new(),
            drivers,
            vehicles,
            policy,
            clock,
        }
    }

    fn route_not_found(route_id: &str) -> RouteError {
        RouteError::RouteNotFound(route_id.to_string())
    }

    fn ensure_exists<R: ResourceDirectory>(directory: &R, id: &str) -> Result<(), RouteError> {
        if directory.status_of(id).is_none() {
            return Err(ResourceError::NotFound {
                kind: R::KIND,
                id: id.to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn ensure_claimable<R: ResourceDirectory>(&self, directory: &R, id: &str) -> Result<(), RouteError> {
        let status = directory.status_of(id).ok_or_else(|| ResourceError::NotFound {
            kind: R::KIND,
            id: id.to_string(),
        })?;
        if self.policy == AssignmentPolicy::RequireAvailable && status != R::AVAILABLE {
            let kind = R::KIND;
            warn!(kind = %kind, id, status = %status, "resource already busy");
            return Err(RouteError::ResourceUnavailable {
                id: id.to_string(),
                status: status.into(),
            });
        }
        Ok(())
    }

    // Both resources are checked before either is touched
    fn claim(&self, driver_id: &str, vehicle_id: &str) -> Result<(), RouteError> {
        self.ensure_claimable(self.drivers.as_ref(), driver_id)?;
        self.ensure_claimable(self.vehicles.as_ref(), vehicle_id)?;
        self.drivers.set_status(driver_id, D::BUSY);
        self.vehicles.set_status(vehicle_id, V::BUSY);
        Ok(())
    }

    // A resource deleted while on route is skipped
    fn release(&self, route: &DeliveryRoute) {
        if self.drivers.set_status(&route.driver_id, D::AVAILABLE).is_none() {
            warn!(route_id = %route.id, driver_id = %route.driver_id, "driver vanished before release");
        }
        if self.vehicles.set_status(&route.vehicle_id, V::AVAILABLE).is_none() {
            warn!(route_id = %route.id, vehicle_id = %route.vehicle_id, "vehicle vanished before release");
        }
        info!(
            route_id = %route.id,
            driver_id = %route.driver_id,
            vehicle_id = %route.vehicle_id,
            "route resources released"
        );
    }

    fn build_route(new: NewRoute, status: RouteStatus) -> DeliveryRoute {
        let mut route = DeliveryRoute {
            id: crate::generate_id(),
            name: new.name,
            description: new.description,
            start_date: new.start_date,
            end_date: new.end_date,
            status,
            driver_id: new.driver_id,
            vehicle_id: new.vehicle_id,
            starting_point: new.starting_point,
            destinations: Vec::with_capacity(new.destinations.len()),
            total_distance_km: new.total_distance_km,
            estimated_fuel_cost: new.estimated_fuel_cost,
        };
        for destination in new.destinations {
            route.insert_destination(destination.into_destination());
        }
        route
    }

    /// Registers a `planned` route. Driver and vehicle must exist but are
    /// not claimed.
    pub fn plan_route(&self, new: NewRoute) -> Result<DeliveryRoute, RouteError> {
        Self::ensure_exists(self.drivers.as_ref(), &new.driver_id)?;
        Self::ensure_exists(self.vehicles.as_ref(), &new.vehicle_id)?;

        let route = Self::build_route(new, RouteStatus::Planned);
        self.routes.insert(route.id.clone(), route.clone());
        info!(route_id = %route.id, "route planned");
        Ok(route)
    }

    /// Registers a route that starts immediately, claiming its driver
    /// (`on_route`) and vehicle (`in_use`).
    pub fn create_route(&self, new: NewRoute) -> Result<DeliveryRoute, RouteError> {
        self.claim(&new.driver_id, &new.vehicle_id)?;

        let route = Self::build_route(new, RouteStatus::InProgress);
        self.routes.insert(route.id.clone(), route.clone());
        info!(
            route_id = %route.id,
            driver_id = %route.driver_id,
            vehicle_id = %route.vehicle_id,
            "route started"
        );
        Ok(route)
    }

    /// `planned -> in_progress`, claiming the route's resources.
    pub fn start_route(&self, route_id: &str) -> Result<DeliveryRoute, RouteError> {
        let mut route = self
            .routes
            .get_mut(route_id)
            .ok_or_else(|| Self::route_not_found(route_id))?;
        if !route.status.can_transition_to(RouteStatus::InProgress) {
            return Err(RouteError::InvalidTransition {
                route_id: route_id.to_string(),
                from: route.status,
                to: RouteStatus::InProgress,
            });
        }

        self.claim(&route.driver_id, &route.vehicle_id)?;
        route.status = RouteStatus::InProgress;
        info!(route_id, "route started");
        Ok(route.clone())
    }

    /// `in_progress -> completed`, releasing the route's resources.
    ///
    /// Completing a route that is already completed returns it unchanged and
    /// does not release anything a second time.
    pub fn complete_route(&self, route_id: &str) -> Result<DeliveryRoute, RouteError> {
        let mut route = self
            .routes
            .get_mut(route_id)
            .ok_or_else(|| Self::route_not_found(route_id))?;
        let status = route.status;
        match status {
            RouteStatus::Completed => {
                debug!(route_id, "route already completed");
                Ok(route.clone())
            }
            RouteStatus::InProgress => {
                route.status = RouteStatus::Completed;
                self.release(&route);
                info!(route_id, "route completed");
                Ok(route.clone())
            }
            from => Err(RouteError::InvalidTransition {
                route_id: route_id.to_string(),
                from,
                to: RouteStatus::Completed,
            }),
        }
    }

    /// Cancels a planned or in-progress route; in-progress routes release
    /// their resources.
    pub fn cancel_route(&self, route_id: &str) -> Result<DeliveryRoute, RouteError> {
        let mut route = self
            .routes
            .get_mut(route_id)
            .ok_or_else(|| Self::route_not_found(route_id))?;
        let from = route.status;
        if !from.can_transition_to(RouteStatus::Cancelled) {
            return Err(RouteError::InvalidTransition {
                route_id: route_id.to_string(),
                from,
                to: RouteStatus::Cancelled,
            });
        }

        route.status = RouteStatus::Cancelled;
        if from == RouteStatus::InProgress {
            self.release(&route);
        }
        info!(route_id, from = %from, "route cancelled");
        Ok(route.clone())
    }

    /// Removes the route. Only an in-progress route still holds resources,
    /// so only that case releases them.
    pub fn delete_route(&self, route_id: &str) -> Result<DeliveryRoute, RouteError> {
        let (_, route) = self
            .routes
            .remove(route_id)
            .ok_or_else(|| Self::route_not_found(route_id))?;
        if route.status == RouteStatus::InProgress {
            self.release(&route);
        }
        info!(route_id, status = %route.status, "route deleted");
        Ok(route)
    }

    /// Marks a destination completed and stamps its arrival. When that
    /// leaves every destination completed, the route completes and releases
    /// its resources.
    ///
    /// Only an in-progress route accepts completions, so a route can never
    /// start with all of its destinations already done.
    pub fn complete_destination(
        &self,
        route_id: &str,
        destination_id: &str,
    ) -> Result<Destination, RouteError> {
        let mut route = self
            .routes
            .get_mut(route_id)
            .ok_or_else(|| Self::route_not_found(route_id))?;
        if route.status != RouteStatus::InProgress {
            warn!(route_id, status = %route.status, "destination completion refused");
            return Err(RouteError::RouteNotInProgress {
                route_id: route_id.to_string(),
                status: route.status,
            });
        }
        let destination = route
            .destinations
            .iter_mut()
            .find(|d| d.id == destination_id)
            .ok_or_else(|| RouteError::DestinationNotFound {
                route_id: route_id.to_string(),
                destination_id: destination_id.to_string(),
            })?;
        destination.status = DestinationStatus::Completed;
        destination.actual_arrival = Some(self.clock.now());
        let completed = destination.clone();
        debug!(route_id, destination_id, "destination completed");

        if route.all_destinations_completed() {
            route.status = RouteStatus::Completed;
            self.release(&route);
            info!(route_id, "route completed after last destination");
        }

        Ok(completed)
    }

    pub fn add_destination(
        &self,
        route_id: &str,
        new: NewDestination,
    ) -> Result<Destination, RouteError> {
        let mut route = self
            .routes
            .get_mut(route_id)
            .ok_or_else(|| Self::route_not_found(route_id))?;
        let destination = new.into_destination();
        route.insert_destination(destination.clone());
        debug!(route_id, destination_id = %destination.id, "destination added");
        Ok(destination)
    }

    pub fn update_destination(
        &self,
        route_id: &str,
        destination_id: &str,
        update: DestinationUpdate,
    ) -> Result<Destination, RouteError> {
        let mut route = self
            .routes
            .get_mut(route_id)
            .ok_or_else(|| Self::route_not_found(route_id))?;
        let index = route
            .destinations
            .iter()
            .position(|d| d.id == destination_id)
            .ok_or_else(|| RouteError::DestinationNotFound {
                route_id: route_id.to_string(),
                destination_id: destination_id.to_string(),
            })?;

        let destination = &mut route.destinations[index];
        if let Some(address) = update.address {
            destination.address = address;
        }
        if let Some(scheduled_arrival) = update.scheduled_arrival {
            destination.scheduled_arrival = scheduled_arrival;
        }
        if let Some(status) = update.status {
            destination.status = status;
        }
        if update.notes.is_some() {
            destination.notes = update.notes;
        }
        let updated = destination.clone();

        // Only a rank change moves the stop, ties go behind existing peers
        if let Some(order) = update.order {
            let mut moved = route.destinations.remove(index);
            moved.order = order;
            route.insert_destination(moved.clone());
            return Ok(moved);
        }
        Ok(updated)
    }

    pub fn update_route_details(
        &self,
        route_id: &str,
        update: RouteUpdate,
    ) -> Result<DeliveryRoute, RouteError> {
        let mut route = self
            .routes
            .get_mut(route_id)
            .ok_or_else(|| Self::route_not_found(route_id))?;
        if let Some(name) = update.name {
            route.name = name;
        }
        if let Some(description) = update.description {
            route.description = description;
        }
        if let Some(start_date) = update.start_date {
            route.start_date = start_date;
        }
        if let Some(end_date) = update.end_date {
            route.end_date = end_date;
        }
        if let Some(starting_point) = update.starting_point {
            route.starting_point = starting_point;
        }
        if let Some(distance) = update.total_distance_km {
            route.total_distance_km = distance;
        }
        if let Some(cost) = update.estimated_fuel_cost {
            route.estimated_fuel_cost = cost;
        }
        Ok(route.clone())
    }

    pub fn get_route(&self, route_id: &str) -> Option<DeliveryRoute> {
        self.routes.get(route_id).map(|r| r.value().clone())
    }

    /// All routes, ordered by start date then name.
    pub fn list_routes(&self) -> Vec<DeliveryRoute> {
        self.collect_sorted(|_| true)
    }

    pub fn active_routes(&self) -> Vec<DeliveryRoute> {
        self.collect_sorted(|r| r.status == RouteStatus::InProgress)
    }

    pub fn routes_for_driver(&self, driver_id: &str) -> Vec<DeliveryRoute> {
        self.collect_sorted(|r| r.driver_id == driver_id)
    }

    pub fn routes_for_vehicle(&self, vehicle_id: &str) -> Vec<DeliveryRoute> {
        self.collect_sorted(|r| r.vehicle_id == vehicle_id)
    }

    fn collect_sorted(&self, keep: impl Fn(&DeliveryRoute) -> bool) -> Vec<DeliveryRoute> {
        let mut routes: Vec<DeliveryRoute> = self
            .routes
            .iter()
            .filter(|r| keep(r.value()))
            .map(|r| r.value().clone())
            .collect();
        routes.sort_by(|a, b| a.start_date.cmp(&b.start_date).then_with(|| a.name.cmp(&b.name)));
        routes
    }
}
