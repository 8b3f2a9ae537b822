use time::OffsetDateTime;

use super::{
    dto::UpdateProfileRequest,
    presence,
    repo::{self, NearbyQuery, NearbyUser, ProfileUpdate, User},
};
use crate::{error::ApiError, geo::Coordinates, state::AppState};

/// Active users around `user` using the configured radius and window.
pub async fn nearby_for(
    state: &AppState,
    user: &User,
    limit: Option<i64>,
) -> anyhow::Result<Vec<NearbyUser>> {
    let cfg = &state.config.proximity;
    let q = NearbyQuery {
        origin: user.position(),
        radius_km: cfg.radius_km,
        active_since: presence::activity_cutoff(OffsetDateTime::now_utc(), cfg.activity_window_secs),
        limit,
    };
    repo::find_nearby(&state.db, user.id, &q).await
}

fn check_len(value: Option<&str>, max: usize, field: &str) -> Result<(), ApiError> {
    match value {
        Some(v) if v.chars().count() > max => Err(ApiError::validation(format!(
            "El campo {field} no puede exceder {max} caracteres"
        ))),
        _ => Ok(()),
    }
}

pub fn check_profile_fields(
    first_name: Option<&str>,
    last_name: Option<&str>,
    phone: Option<&str>,
) -> Result<(), ApiError> {
    check_len(first_name, 50, "nombre")?;
    check_len(last_name, 100, "apellidos")?;
    check_len(phone, 9, "telefono")
}

/// Turns a raw update request into a validated [`ProfileUpdate`].
pub fn profile_update(req: UpdateProfileRequest) -> Result<ProfileUpdate, ApiError> {
    let position = match (req.latitude, req.longitude) {
        (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)?),
        (None, None) => None,
        _ => {
            return Err(ApiError::validation(
                "La latitud y la longitud deben enviarse juntas",
            ))
        }
    };
    check_profile_fields(
        req.first_name.as_deref(),
        req.last_name.as_deref(),
        req.phone.as_deref(),
    )?;
    Ok(ProfileUpdate {
        position,
        first_name: req.first_name,
        last_name: req.last_name,
        phone: req.phone,
    })
}
