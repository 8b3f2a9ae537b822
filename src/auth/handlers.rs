use axum::{
    extract::{FromRef, State},
    routing::post,
    Router,
};
use tracing::{info, instrument, warn};

use super::{
    credentials::{check_email, check_password, hash_password, verify_password},
    dto::{LoginRequest, LoginResponse, LogoutResponse, PublicUser, RegisterRequest, RegisteredUser},
    extractors::AuthUser,
    jwt::JwtKeys,
};
use crate::{
    error::{ApiError, ApiResponse, ApiResult},
    extract::ApiJson,
    geo::Coordinates,
    state::AppState,
    users::{
        repo::{NewUser, User},
        services::check_profile_fields,
    },
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
}

/// Registration input after presence, format and range checks.
#[derive(Debug)]
struct Registration {
    email: String,
    password: String,
    username: String,
    position: Coordinates,
    first_name: Option<String>,
    last_name: Option<String>,
    phone: Option<String>,
}

fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ApiError::validation(format!("El campo {field} es requerido"))),
    }
}

fn validate_registration(payload: RegisterRequest) -> Result<Registration, ApiError> {
    let email = required(payload.email, "email")?.trim().to_string();
    let password = required(payload.password, "password")?;
    let username = required(payload.username, "username")?.trim().to_string();
    let latitude = payload
        .latitude
        .ok_or_else(|| ApiError::validation("El campo latitude es requerido"))?;
    let longitude = payload
        .longitude
        .ok_or_else(|| ApiError::validation("El campo longitude es requerido"))?;

    let position = Coordinates::new(latitude, longitude)?;
    check_email(&email)?;
    check_password(&password)?;
    if username.chars().count() > 50 {
        return Err(ApiError::validation(
            "El campo username no puede exceder 50 caracteres",
        ));
    }
    check_profile_fields(
        payload.first_name.as_deref(),
        payload.last_name.as_deref(),
        payload.phone.as_deref(),
    )?;

    Ok(Registration {
        email,
        password,
        username,
        position,
        first_name: payload.first_name,
        last_name: payload.last_name,
        phone: payload.phone,
    })
}

fn email_taken() -> ApiError {
    ApiError::conflict("El email ya está registrado")
}

/// A unique violation here means another request registered the email
/// between the lookup and the insert.
fn insert_error(e: sqlx::Error) -> ApiError {
    match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            warn!("email registered concurrently");
            email_taken()
        }
        e => e.into(),
    }
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> ApiResult<RegisteredUser> {
    let reg = validate_registration(payload)?;

    if User::find_by_email(&state.db, &reg.email).await?.is_some() {
        warn!(email = %reg.email, "email already registered");
        return Err(email_taken());
    }

    let hash = hash_password(&reg.password)?;
    let new_user = NewUser {
        email: &reg.email,
        username: &reg.username,
        password_hash: &hash,
        position: reg.position,
        first_name: reg.first_name.as_deref(),
        last_name: reg.last_name.as_deref(),
        phone: reg.phone.as_deref(),
    };
    let user = User::create(&state.db, &new_user).await.map_err(insert_error)?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(ApiResponse::created(RegisteredUser {
        id: user.id,
        email: user.email,
        username: user.username,
        message: "Usuario registrado exitosamente. Ahora puedes iniciar sesión.",
    }))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let (Some(email), Some(password)) = (payload.email, payload.password) else {
        return Err(ApiError::validation("Email y password son requeridos"));
    };
    let invalid = || ApiError::unauthenticated("Credenciales inválidas");

    let Some(user) = User::find_by_email(&state.db, email.trim()).await? else {
        warn!(email = %email, "login unknown email");
        return Err(invalid());
    };
    if !verify_password(&password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(invalid());
    }

    let keys = JwtKeys::from_ref(&state);
    let (token, expires_at) = keys.sign(user.id)?;
    User::touch(&state.db, user.id).await?;

    info!(user_id = %user.id, "user logged in");
    Ok(ApiResponse::ok(LoginResponse {
        token,
        expires_at,
        user: PublicUser {
            id: user.id,
            email: user.email,
            username: user.username,
        },
    }))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<LogoutResponse> {
    User::set_offline(&state.db, user.id).await?;
    info!("user logged out");
    Ok(ApiResponse::ok(LogoutResponse {
        message: "Sesión cerrada exitosamente",
    }))
}
