//! Database row types. These map directly to SQLite rows and stay
//! independent of the locals-types wire models.

use chrono::{DateTime, Utc};
use locals_discovery::{Discoverable, GeoPoint};
use locals_types::models::{AuthProvider, EventId, UserId};

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub password: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub bio: Option<String>,
    pub profile_pic: Option<String>,
    pub is_traveler: bool,
    pub is_host: bool,
    pub auth_provider: AuthProvider,
    pub created_at: String,
}

pub struct NewUser<'a> {
    pub username: &'a str,
    pub password_hash: Option<&'a str>,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub is_traveler: bool,
    pub is_host: bool,
    pub auth_provider: AuthProvider,
}

#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub profile_pic: Option<String>,
    pub is_host: Option<bool>,
    pub is_traveler: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct TagRow {
    pub id: i64,
    pub tag_name: String,
    pub description: String,
}

/// An event joined with its host's display fields and tag names.
#[derive(Debug, Clone)]
pub struct EventRow {
    pub id: EventId,
    pub title: String,
    pub description: String,
    pub unique_aspect: String,
    pub host_id: Option<UserId>,
    pub host_username: Option<String>,
    pub host_first_name: Option<String>,
    pub host_last_name: Option<String>,
    pub host_profile_pic: Option<String>,
    pub created_at: DateTime<Utc>,
    pub number_of_guests: Option<i64>,
    pub number_of_bookings: i64,
    pub occurence_date: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub price_cents: i64,
    pub photos: Vec<String>,
    pub tags: Vec<String>,
}

impl Discoverable for EventRow {
    fn tag_names(&self) -> &[String] {
        &self.tags
    }

    fn coordinates(&self) -> Option<GeoPoint> {
        GeoPoint::from_parts(self.latitude, self.longitude)
    }
}

pub struct NewEvent<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub unique_aspect: &'a str,
    pub host_id: UserId,
    pub number_of_guests: Option<i64>,
    pub occurence_date: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
    pub location: &'a str,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub price_cents: i64,
    pub photos: &'a [String],
    pub tags: &'a [String],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingOutcome {
    Created(i64),
    AlreadyExists(i64),
}

impl BookingOutcome {
    pub fn id(&self) -> i64 {
        match self {
            Self::Created(id) | Self::AlreadyExists(id) => *id,
        }
    }
}

/// A guest's booking with the event fields shown in their account page.
#[derive(Debug, Clone)]
pub struct GuestBookingRow {
    pub id: i64,
    pub event_id: EventId,
    pub event_title: String,
    pub event_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ReviewRow {
    pub id: i64,
    pub event_id: EventId,
    pub text: String,
    pub rating: i64,
    pub created_at: String,
}
