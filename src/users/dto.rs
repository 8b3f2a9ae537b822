use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::{NearbyUser, User};
use crate::geo::round2;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    #[serde(rename = "nombre")]
    pub first_name: Option<String>,
    #[serde(rename = "apellidos")]
    pub last_name: Option<String>,
    #[serde(rename = "telefono")]
    pub phone: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub is_online: bool,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub last_activity: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default, deserialize_with = "crate::geo::deserialize_degrees")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "crate::geo::deserialize_degrees")]
    pub longitude: Option<f64>,
    #[serde(rename = "nombre")]
    pub first_name: Option<String>,
    #[serde(rename = "apellidos")]
    pub last_name: Option<String>,
    #[serde(rename = "telefono")]
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedProfileResponse {
    pub id: Uuid,
    pub username: String,
    pub latitude: f64,
    pub longitude: f64,
    pub is_online: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub last_activity: OffsetDateTime,
    pub message: &'static str,
}

/// Full view of a nearby user, used by the location and home screens.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyUserView {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    #[serde(rename = "nombre")]
    pub first_name: Option<String>,
    #[serde(rename = "apellidos")]
    pub last_name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub distance: f64,
    pub is_online: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub last_activity: OffsetDateTime,
}

impl From<NearbyUser> for NearbyUserView {
    fn from(u: NearbyUser) -> Self {
        Self {
            id: u.id,
            email: u.email,
            username: u.username,
            first_name: u.first_name,
            last_name: u.last_name,
            latitude: u.latitude,
            longitude: u.longitude,
            distance: round2(u.distance_km),
            is_online: u.is_online,
            last_activity: u.last_activity,
        }
    }
}

/// Compact view used next to chat messages and in update polls.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveUserView {
    pub id: Uuid,
    pub username: String,
    #[serde(rename = "nombre")]
    pub first_name: Option<String>,
    #[serde(rename = "apellidos")]
    pub last_name: Option<String>,
    pub distance: f64,
    pub is_online: bool,
}

impl From<NearbyUser> for ActiveUserView {
    fn from(u: NearbyUser) -> Self {
        Self {
            id: u.id,
            username: u.username,
            first_name: u.first_name,
            last_name: u.last_name,
            distance: round2(u.distance_km),
            is_online: u.is_online,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NearbyListResponse {
    pub users: Vec<NearbyUserView>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct SelfSummary {
    pub id: Uuid,
    pub username: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl From<&User> for SelfSummary {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            username: u.username.clone(),
            latitude: u.latitude,
            longitude: u.longitude,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeResponse {
    pub current_user: SelfSummary,
    pub nearby_users: Vec<NearbyUserView>,
    pub total_users_nearby: usize,
    pub radius_km: f64,
}
