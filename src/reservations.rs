// Room reservation scheduling: overlap checks and room occupancy derivation

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::ConflictPolicy;
use crate::facilities::{Room, RoomStatus};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReservationError {
    #[error("Facility not found: {0}")]
    FacilityNotFound(String),

    #[error("Room not found: {0}")]
    RoomNotFound(String),

    #[error("Reservation not found: {0}")]
    ReservationNotFound(String),

    #[error("Room {room_id} is not available for reservation ({status})")]
    RoomUnavailable { room_id: String, status: RoomStatus },

    #[error("Time slot in room {room_id} is already reserved by {conflicting_id}")]
    TimeConflict {
        room_id: String,
        conflicting_id: String,
    },

    #[error("Invalid time window: start {start} is not before end {end}")]
    InvalidWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// Half-open booking interval `[start, end)`.
///
/// Construction guarantees `start < end`, including when deserialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawWindow")]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[derive(Deserialize)]
struct RawWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TryFrom<RawWindow> for TimeWindow {
    type Error = ReservationError;

    fn try_from(raw: RawWindow) -> Result<Self, Self::Error> {
        TimeWindow::new(raw.start, raw.end)
    }
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ReservationError> {
        if start >= end {
            return Err(ReservationError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && self.end > other.start
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl ReservationStatus {
    /// Neither cancelled nor completed.
    pub fn is_active(self) -> bool {
        !matches!(self, ReservationStatus::Cancelled | ReservationStatus::Completed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReservationStatus::Scheduled => "scheduled",
            ReservationStatus::InProgress => "in_progress",
            ReservationStatus::Completed => "completed",
            ReservationStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: String,
    pub room_id: String,
    pub user_id: String,
    pub user_name: String,
    pub purpose: String,
    pub window: TimeWindow,
    pub status: ReservationStatus,
    pub attendees: u32,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReservation {
    pub user_id: String,
    pub user_name: String,
    pub purpose: String,
    pub window: TimeWindow,
    pub attendees: u32,
    pub notes: Option<String>,
}

// Fields a caller may change after booking; window and status have their own paths
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReservationUpdate {
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub purpose: Option<String>,
    pub attendees: Option<u32>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReservationScheduler {
    policy: ConflictPolicy,
}

impl ReservationScheduler {
    pub fn new(policy: ConflictPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    fn blocks(&self, reservation: &Reservation) -> bool {
        match self.policy {
            ConflictPolicy::AllReservations => true,
            ConflictPolicy::ActiveOnly => reservation.status.is_active(),
        }
    }

    /// First existing reservation that would block `window`, if any.
    pub fn find_conflict<'a>(&self, room: &'a Room, window: &TimeWindow) -> Option<&'a Reservation> {
        room.reservations
            .iter()
            .find(|r| self.blocks(r) && r.window.overlaps(window))
    }

    /// Books `request` into `room`.
    ///
    /// The room must be `available` or `reserved`, and the window must not
    /// overlap a blocking reservation. On success the room becomes
    /// `occupied` when `now` falls inside the window, `reserved` when the
    /// window is still ahead, and keeps its status otherwise.
    pub fn create_reservation(
        &self,
        room: &mut Room,
        request: NewReservation,
        now: DateTime<Utc>,
    ) -> Result<Reservation, ReservationError> {
        if !matches!(room.status, RoomStatus::Available | RoomStatus::Reserved) {
            warn!(room_id = %room.id, status = %room.status, "room not bookable");
            return Err(ReservationError::RoomUnavailable {
                room_id: room.id.clone(),
                status: room.status,
            });
        }

        if let Some(existing) = self.find_conflict(room, &request.window) {
            warn!(
                room_id = %room.id,
                conflicting_id = %existing.id,
                "reservation window overlaps an existing booking"
            );
            return Err(ReservationError::TimeConflict {
                room_id: room.id.clone(),
                conflicting_id: existing.id.clone(),
            });
        }

        let reservation = Reservation {
            id: crate::generate_id(),
            room_id: room.id.clone(),
            user_id: request.user_id,
            user_name: request.user_name,
            purpose: request.purpose,
            window: request.window,
            status: ReservationStatus::Scheduled,
            attendees: request.attendees,
            notes: request.notes,
        };
        room.reservations.push(reservation.clone());

        if reservation.window.contains(now) {
            room.status = RoomStatus::Occupied;
        } else if now < reservation.window.start() {
            room.status = RoomStatus::Reserved;
        }

        info!(
            room_id = %room.id,
            reservation_id = %reservation.id,
            room_status = %room.status,
            "reservation created"
        );
        Ok(reservation)
    }

    pub fn update_reservation_status(
        &self,
        room: &mut Room,
        reservation_id: &str,
        status: ReservationStatus,
    ) -> Result<Reservation, ReservationError> {
        let reservation = room
            .reservations
            .iter_mut()
            .find(|r| r.id == reservation_id)
            .ok_or_else(|| ReservationError::ReservationNotFound(reservation_id.to_string()))?;
        reservation.status = status;
        let updated = reservation.clone();

        if status == ReservationStatus::Cancelled {
            let others_active = room
                .reservations
                .iter()
                .any(|r| r.id != reservation_id && r.status.is_active());
            if !others_active {
                room.status = RoomStatus::Available;
            }
        }

        info!(
            room_id = %room.id,
            reservation_id,
            status = %status,
            room_status = %room.status,
            "reservation status updated"
        );
        Ok(updated)
    }

    pub fn update_reservation_details(
        &self,
        room: &mut Room,
        reservation_id: &str,
        update: ReservationUpdate,
    ) -> Result<Reservation, ReservationError> {
        let reservation = room
            .reservations
            .iter_mut()
            .find(|r| r.id == reservation_id)
            .ok_or_else(|| ReservationError::ReservationNotFound(reservation_id.to_string()))?;

        if let Some(user_id) = update.user_id {
            reservation.user_id = user_id;
        }
        if let Some(user_name) = update.user_name {
            reservation.user_name = user_name;
        }
        if let Some(purpose) = update.purpose {
            reservation.purpose = purpose;
        }
        if let Some(attendees) = update.attendees {
            reservation.attendees = attendees;
        }
        if update.notes.is_some() {
            reservation.notes = update.notes;
        }

        debug!(room_id = %room.id, reservation_id, "reservation details updated");
        Ok(reservation.clone())
    }

    /// Removes the reservation whatever its status, then frees the room if
    /// nothing active is left on it.
    pub fn delete_reservation(
        &self,
        room: &mut Room,
        reservation_id: &str,
    ) -> Result<Reservation, ReservationError> {
        let index = room
            .reservations
            .iter()
            .position(|r| r.id == reservation_id)
            .ok_or_else(|| ReservationError::ReservationNotFound(reservation_id.to_string()))?;
        let removed = room.reservations.remove(index);

        if !room.reservations.iter().any(|r| r.status.is_active()) {
            room.status = RoomStatus::Available;
        }

        info!(
            room_id = %room.id,
            reservation_id,
            room_status = %room.status,
            "reservation deleted"
        );
        Ok(removed)
    }

    /// Recomputes the room status from its active reservations at `now`.
    /// Rooms under maintenance keep their status.
    pub fn refresh_room_status(&self, room: &mut Room, now: DateTime<Utc>) -> RoomStatus {
        if room.status == RoomStatus::Maintenance {
            return room.status;
        }

        let mut active = room.reservations.iter().filter(|r| r.status.is_active());
        room.status = if active.clone().any(|r| r.window.contains(now)) {
            RoomStatus::Occupied
        } else if active.any(|r| r.window.start() > now) {
            RoomStatus::Reserved
        } else {
            RoomStatus::Available
        };

        debug!(room_id = %room.id, room_status = %room.status, "room status refreshed");
        room.status
    }
}
