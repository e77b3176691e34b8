use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{AuthProvider, EventId, UserId};

// -- JWT Claims --

/// Token claims issued on signup/login and checked by the auth middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub is_host: bool,
    #[serde(default)]
    pub is_traveler: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub message: String,
    pub user_id: UserId,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OAuthLoginRequest {
    pub provider: String,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct OAuthLoginResponse {
    pub message: String,
    pub user_id: UserId,
    pub token: String,
    pub created: bool,
}

#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct EmailExistsResponse {
    pub exists: bool,
    pub auth_provider: Option<AuthProvider>,
}

// -- Users --

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: Option<String>,
    pub profile_pic: Option<String>,
    pub is_host: bool,
    pub is_traveler: bool,
    pub auth_provider: AuthProvider,
}

#[derive(Debug, Serialize)]
pub struct PublicProfileResponse {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub bio: Option<String>,
    pub profile_pic: Option<String>,
    pub is_host: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub profile_pic: Option<String>,
    pub is_host: Option<bool>,
    pub is_traveler: Option<bool>,
}

// -- Events --

/// Raw discovery parameters. Every field stays a string so that one
/// unparsable value only disables its own filter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventListParams {
    pub date: Option<String>,
    pub date_after: Option<String>,
    pub date_before: Option<String>,
    pub location: Option<String>,
    pub radius: Option<String>,
    pub tags_include: Option<String>,
    pub tags_exclude: Option<String>,
    pub available_only: Option<String>,
    pub sort_by_date: Option<String>,
    pub user_lat: Option<String>,
    pub user_lon: Option<String>,
    pub show_old: Option<String>,
}

impl EventListParams {
    /// Builds the parameters from raw query pairs. A repeated key keeps its
    /// first value, except the tag lists, whose values are joined into one
    /// comma list. Unknown keys are ignored.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "date" => &mut params.date,
                "date_after" => &mut params.date_after,
                "date_before" => &mut params.date_before,
                "location" => &mut params.location,
                "radius" => &mut params.radius,
                "available_only" => &mut params.available_only,
                "sort_by_date" => &mut params.sort_by_date,
                "user_lat" => &mut params.user_lat,
                "user_lon" => &mut params.user_lon,
                "show_old" => &mut params.show_old,
                "tags_include" => {
                    append_tags(&mut params.tags_include, value);
                    continue;
                }
                "tags_exclude" => {
                    append_tags(&mut params.tags_exclude, value);
                    continue;
                }
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        params
    }
}

fn append_tags(list: &mut Option<String>, value: String) {
    match list {
        Some(existing) => {
            existing.push(',');
            existing.push_str(&value);
        }
        None => *list = Some(value),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub unique_aspect: String,
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub occurence_date: Option<String>,
    pub duration_minutes: Option<i64>,
    pub price: Option<f64>,
    pub number_of_guests: Option<i64>,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateEventResponse {
    pub message: String,
    pub event_id: EventId,
}

#[derive(Debug, Serialize)]
pub struct EventSummary {
    pub id: EventId,
    pub title: String,
    pub description: String,
    pub unique_aspect: String,
    pub occurence_date: Option<DateTime<Utc>>,
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub price: f64,
    pub photos: Vec<String>,
    pub number_of_guests: Option<i64>,
    pub number_of_bookings: i64,
    pub tags: Vec<String>,
    pub host_username: String,
    pub host_first_name: String,
}

#[derive(Debug, Serialize)]
pub struct EventDetail {
    #[serde(flatten)]
    pub summary: EventSummary,
    pub host_id: Option<UserId>,
    pub host_last_name: String,
    pub host_profile_pic: Option<String>,
    pub duration_minutes: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

// -- Tags --

#[derive(Debug, Serialize)]
pub struct TagResponse {
    pub id: i64,
    pub tag_name: String,
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct TagListResponse {
    pub tags: Vec<TagResponse>,
}

// -- Bookings --

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub id: i64,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct UserBooking {
    pub id: i64,
    pub event_id: EventId,
    pub event_title: String,
    pub event_date: Option<DateTime<Utc>>,
}

// -- Reviews --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateReviewRequest {
    pub event_id: EventId,
    pub text: String,
    pub rating: i64,
}

#[derive(Debug, Serialize)]
pub struct CreateReviewResponse {
    pub message: String,
    pub review_id: i64,
}

#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub text: String,
    pub rating: i64,
}

// -- Messaging --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StartDmRequest {
    pub target_user_id: UserId,
}

#[derive(Debug, Serialize)]
pub struct StartDmResponse {
    pub message: String,
    pub created: bool,
}

// -- Uploads --

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    #[serde(rename = "fileUrl")]
    pub file_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn repeated_keys_keep_first_value() {
        let params = EventListParams::from_pairs(pairs(&[
            ("date", "2025-01-01"),
            ("date", "oops"),
            ("radius", "5"),
            ("nonsense", "x"),
        ]));
        assert_eq!(params.date.as_deref(), Some("2025-01-01"));
        assert_eq!(params.radius.as_deref(), Some("5"));
        assert_eq!(params.show_old, None);
    }

    #[test]
    fn repeated_tag_keys_are_joined() {
        let params = EventListParams::from_pairs(pairs(&[
            ("tags_include", "music"),
            ("tags_include", "dance"),
            ("tags_exclude", "comedy"),
        ]));
        assert_eq!(params.tags_include.as_deref(), Some("music,dance"));
        assert_eq!(params.tags_exclude.as_deref(), Some("comedy"));
    }
}
