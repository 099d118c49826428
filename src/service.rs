use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::{parse_instant, utc_day};
use crate::config::{Room, RoomCatalog};
use crate::limits::*;
use crate::model::*;
use crate::observability;
use crate::store::{Store, StoreError};

pub const CONFLICT_MESSAGE: &str = "This room is already booked for the selected time period";

/// Body of a create request, in the field names the web client sends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateBookingRequest {
    pub user: String,
    pub email: String,
    pub phone: String,
    pub start_time: String,
    pub end_time: String,
    pub room: String,
}

/// Body of an update request. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateBookingRequest {
    pub user: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub room: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// What kind of failure a caller is looking at. Callers branch on this, never
/// on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    InvalidInterval,
    Conflict,
    NotFound,
    Persistence,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    Validation(Vec<FieldError>),
    /// Start falls on a UTC day before today.
    PastDate,
    /// Start is earlier today (UTC) than now.
    PastTime,
    InvalidInterval,
    Conflict(BookingId),
    NotFound(String),
    Persistence(String),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Validation(_) | ServiceError::PastDate | ServiceError::PastTime => {
                ErrorKind::Validation
            }
            ServiceError::InvalidInterval => ErrorKind::InvalidInterval,
            ServiceError::Conflict(_) => ErrorKind::Conflict,
            ServiceError::NotFound(_) => ErrorKind::NotFound,
            ServiceError::Persistence(_) => ErrorKind::Persistence,
        }
    }

    /// Text to show the person who made the request.
    pub fn user_message(&self) -> String {
        match self {
            ServiceError::Validation(errors) => {
                let details: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
                format!("Validation failed: {}", details.join("; "))
            }
            ServiceError::PastDate => "You cannot book rooms before current date".into(),
            ServiceError::PastTime => "You cannot book rooms before the current time".into(),
            ServiceError::InvalidInterval => "End time must be after start time".into(),
            ServiceError::Conflict(_) => CONFLICT_MESSAGE.into(),
            ServiceError::NotFound(_) => "Booking not found".into(),
            ServiceError::Persistence(_) => "Failed to save booking".into(),
        }
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::Conflict(id) => write!(f, "{CONFLICT_MESSAGE} (booking {id})"),
            ServiceError::NotFound(id) => write!(f, "booking not found: {id}"),
            ServiceError::Persistence(e) => write!(f, "failed to save booking: {e}"),
            other => f.write_str(&other.user_message()),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InvalidInterval { .. } => ServiceError::InvalidInterval,
            StoreError::Conflict(id) => ServiceError::Conflict(id),
            StoreError::NotFound(id) => ServiceError::NotFound(id.to_string()),
            StoreError::Persistence(msg) => ServiceError::Persistence(msg),
        }
    }
}

// ── Field validation ─────────────────────────────────────────

fn is_valid_email(s: &str) -> bool {
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}

/// Collects every problem with a request instead of stopping at the first.
#[derive(Default)]
struct Checker {
    errors: Vec<FieldError>,
}

impl Checker {
    fn fail(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    fn required(&mut self, field: &'static str, value: &str, message: &str) -> String {
        let value = value.trim();
        if value.is_empty() {
            self.fail(field, message);
        } else if value.len() > MAX_OWNER_FIELD_LEN {
            self.fail(field, format!("{field} is too long"));
        }
        value.to_string()
    }

    fn email(&mut self, value: &str) -> String {
        let value = value.trim();
        if !is_valid_email(value) || value.len() > MAX_OWNER_FIELD_LEN {
            self.fail("email", "Invalid email address");
        }
        value.to_string()
    }

    fn instant(&mut self, field: &'static str, value: &str, label: &str) -> Option<Ms> {
        match parse_instant(value) {
            Some(ms) if (MIN_VALID_TIMESTAMP_MS..MAX_VALID_TIMESTAMP_MS).contains(&ms) => Some(ms),
            Some(_) => {
                self.fail(field, format!("{label} date/time is out of range"));
                None
            }
            None => {
                self.fail(field, format!("Invalid {label} date/time format"));
                None
            }
        }
    }

    fn room(&mut self, value: &str, rooms: &RoomCatalog) -> String {
        let value = value.trim();
        if value.is_empty() {
            self.fail("room", "Room is required");
        } else if value.len() > MAX_ROOM_LEN {
            self.fail("room", "Room is too long");
        } else if !rooms.contains(value) {
            self.fail("room", format!("Unknown room: {value}"));
        }
        value.to_string()
    }

    fn finish(self) -> Result<(), ServiceError> {
        if self.errors.is_empty() {
            return Ok(());
        }
        Err(self.reject())
    }

    fn reject(self) -> ServiceError {
        metrics::counter!(observability::VALIDATION_FAILURES_TOTAL, "reason" => "fields")
            .increment(1);
        ServiceError::Validation(self.errors)
    }
}

/// Ids are opaque, so only an empty one is rejected up front.
fn parse_id(id: &str) -> Result<BookingId, ServiceError> {
    id.parse().map_err(|_| ServiceError::NotFound(id.to_string()))
}

/// Caller-facing booking operations over one [`Store`].
pub struct BookingService {
    store: Arc<Store>,
    rooms: RoomCatalog,
}

impl BookingService {
    pub fn new(store: Arc<Store>, rooms: RoomCatalog) -> Self {
        Self { store, rooms }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn rooms(&self) -> &[Room] {
        self.rooms.rooms()
    }

    /// Past-date and past-time rejection, both judged in UTC.
    fn check_not_past(&self, start: Ms) -> Result<(), ServiceError> {
        let now = self.store.clock().now_ms();
        let (Some(start_day), Some(today)) = (utc_day(start), utc_day(now)) else {
            return Err(ServiceError::PastDate);
        };
        let result = if start_day < today {
            Err(ServiceError::PastDate)
        } else if start_day == today && start < now {
            Err(ServiceError::PastTime)
        } else {
            Ok(())
        };
        if result.is_err() {
            metrics::counter!(observability::VALIDATION_FAILURES_TOTAL, "reason" => "past")
                .increment(1);
        }
        result
    }

    pub async fn create(&self, req: &CreateBookingRequest) -> Result<Booking, ServiceError> {
        let mut check = Checker::default();
        let name = check.required("user", &req.user, "User name is required");
        let email = check.email(&req.email);
        let phone = check.required("phone", &req.phone, "Phone number is required");
        let start = check.instant("startTime", &req.start_time, "start");
        let end = check.instant("endTime", &req.end_time, "end");
        let room = check.room(&req.room, &self.rooms);
        // `instant` records a field error for every `None`
        let (start, end) = match (start, end) {
            (Some(start), Some(end)) => {
                check.finish()?;
                (start, end)
            }
            _ => return Err(check.reject()),
        };
        if start >= end {
            return Err(ServiceError::InvalidInterval);
        }
        self.check_not_past(start)?;

        let owner = Owner { name, email, phone };
        let booking = self.store.create(room, start, end, owner).await?;
        debug!("booked {} for {}", booking.room, booking.owner_email);
        Ok(booking)
    }

    pub async fn get(&self, id: &str) -> Result<Booking, ServiceError> {
        let booking_id = parse_id(id)?;
        self.store
            .get(&booking_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))
    }

    /// All bookings ordered by start time, then room.
    pub async fn list(&self) -> Result<Vec<Booking>, ServiceError> {
        let mut bookings = self.store.list().await?;
        bookings.sort_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then_with(|| a.room.cmp(&b.room))
        });
        Ok(bookings)
    }

    pub async fn list_room(&self, room: &str) -> Result<Vec<Booking>, ServiceError> {
        Ok(self.store.list_room(room.trim()).await?)
    }

    pub async fn update(
        &self,
        id: &str,
        req: &UpdateBookingRequest,
    ) -> Result<Booking, ServiceError> {
        let booking_id = parse_id(id)?;

        let mut check = Checker::default();
        let mut patch = BookingPatch::default();
        if let Some(user) = &req.user {
            patch.owner_name = Some(check.required("user", user, "User name is required"));
        }
        if let Some(email) = &req.email {
            patch.owner_email = Some(check.email(email));
        }
        if let Some(phone) = &req.phone {
            patch.owner_phone = Some(check.required("phone", phone, "Phone number is required"));
        }
        if let Some(start) = &req.start_time {
            patch.start_time = check.instant("startTime", start, "start");
        }
        if let Some(end) = &req.end_time {
            patch.end_time = check.instant("endTime", end, "end");
        }
        if let Some(room) = &req.room {
            patch.room = Some(check.room(room, &self.rooms));
        }
        check.finish()?;

        if let (Some(start), Some(end)) = (patch.start_time, patch.end_time) {
            if start >= end {
                return Err(ServiceError::InvalidInterval);
            }
        }
        if let Some(start) = patch.start_time {
            self.check_not_past(start)?;
        }

        Ok(self.store.update(&booking_id, patch).await?)
    }

    /// Remove a booking. A missing booking is `NotFound` here, unlike the
    /// store's idempotent delete.
    pub async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        let booking_id = parse_id(id)?;
        if self.store.delete(&booking_id).await? {
            Ok(())
        } else {
            Err(ServiceError::NotFound(id.to_string()))
        }
    }

    /// Administrative reset of the whole store.
    pub async fn clear(&self) -> Result<(), ServiceError> {
        Ok(self.store.clear().await?)
    }
}
