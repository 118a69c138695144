use crate::db::DbConn;
use crate::models::{LoginDto, RegisterDto, Role, User, UserResponse};
use crate::services::JwtService;
use crate::utils::{validate_email, ApiError, ApiResponse};
use mongodb::bson::{doc, oid::ObjectId, DateTime};
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

const LOGIN_WINDOW_MS: i64 = 10 * 60 * 1000;
const LOGIN_LIMIT: i32 = 10;
const REGISTER_WINDOW_MS: i64 = 10 * 60 * 1000;
const REGISTER_LIMIT: i32 = 5;
const REFRESH_LIMIT: i32 = 10;
const REFRESH_WINDOW_MS: i64 = 60 * 1000;

#[derive(Debug, PartialEq, Eq)]
enum WindowAction {
    Start,
    Reset,
    Deny,
    Count,
}

/// Fixed-window decision: `existing` is the stored (count, window expired)
/// pair for the key, or None on the first request.
fn window_action(existing: Option<(i32, bool)>, limit: i32) -> WindowAction {
    match existing {
        None => WindowAction::Start,
        Some((_, true)) => WindowAction::Reset,
        Some((count, false)) if count >= limit => WindowAction::Deny,
        Some(_) => WindowAction::Count,
    }
}

/// --------------------
/// Rate limiter helper
/// --------------------
async fn rate_limit(db: &DbConn, key: &str, limit: i32, window_ms: i64) -> Result<(), ApiError> {
    let now = chrono::Utc::now().timestamp_millis();
    let window_expires = DateTime::from_millis(now + window_ms);

    let collection = db.collection::<mongodb::bson::Document>("rate_limits");

    let doc = collection
        .find_one(doc! { "key": key }, None)
        .await
        .map_err(|_| ApiError::internal_error("Rate limiter lookup failed"))?;

    let existing = doc.map(|d| {
        let count = d.get_i32("count").unwrap_or(0);
        let expired = d
            .get_datetime("expires_at")
            .map(|e| *e < DateTime::now())
            .unwrap_or(true);
        (count, expired)
    });

    match window_action(existing, limit) {
        WindowAction::Start => {
            collection
                .insert_one(
                    doc! {
                        "key": key,
                        "count": 1,
                        "expires_at": window_expires
                    },
                    None,
                )
                .await
                .map_err(|_| ApiError::internal_error("Rate limiter insert failed"))?;
            Ok(())
        }

        WindowAction::Reset => {
            collection
                .update_one(
                    doc! { "key": key },
                    doc! {
                        "$set": {
                            "count": 1,
                            "expires_at": window_expires
                        }
                    },
                    None,
                )
                .await
                .map_err(|_| ApiError::internal_error("Rate limiter reset failed"))?;
            Ok(())
        }

        WindowAction::Deny => Err(ApiError::too_many_requests(
            "Too many requests. Please try later.",
        )),

        WindowAction::Count => {
            collection
                .update_one(doc! { "key": key }, doc! { "$inc": { "count": 1 } }, None)
                .await
                .map_err(|_| ApiError::internal_error("Rate limiter increment failed"))?;
            Ok(())
        }
    }
}

/// --------------------
/// Register
/// --------------------
#[openapi(tag = "Auth")]
#[post("/auth/register", data = "<dto>")]
pub async fn register(
    db: &State<DbConn>,
    dto: Json<RegisterDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let username = dto.username.trim();

    rate_limit(
        db,
        &format!("register:{}", username),
        REGISTER_LIMIT,
        REGISTER_WINDOW_MS,
    )
    .await?;

    if username.len() < 3 {
        return Err(ApiError::bad_request(
            "Username must be at least 3 characters",
        ));
    }
    if !validate_email(&dto.email) {
        return Err(ApiError::bad_request("Invalid email"));
    }
    if dto.password.len() < 8 {
        return Err(ApiError::bad_request(
            "Password must be at least 8 characters",
        ));
    }

    let users = db.collection::<User>("users");

    let existing = users
        .find_one(
            doc! { "$or": [ { "username": username }, { "email": &dto.email } ] },
            None,
        )
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?;

    if existing.is_some() {
        return Err(ApiError::bad_request("Username or email already taken"));
    }

    let password_hash = bcrypt::hash(&dto.password, bcrypt::DEFAULT_COST)
        .map_err(|e| ApiError::internal_error(format!("Password hashing failed: {}", e)))?;

    let user = User {
        id: None,
        username: username.to_string(),
        email: dto.email.clone(),
        password_hash,
        role: Role::User,
        is_active: true,
        last_login_at: DateTime::now(),
        created_at: DateTime::now(),
        updated_at: DateTime::now(),
    };

    let result = users
        .insert_one(&user, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to create user: {}", e)))?;

    let user_id = result
        .inserted_id
        .as_object_id()
        .ok_or_else(|| ApiError::internal_error("Failed to read inserted user id"))?;

    let access_token = JwtService::generate_access_token(&user_id, &user.username, user.role.as_str())
        .map_err(|e| ApiError::internal_error(e.to_string()))?;
    let refresh_token =
        JwtService::generate_refresh_token(&user_id, &user.username, user.role.as_str())
            .map_err(|e| ApiError::internal_error(e.to_string()))?;

    let mut user = user;
    user.id = Some(user_id);

    Ok(Json(ApiResponse::success_with_message(
        "Registration successful".to_string(),
        serde_json::json!({
            "user": UserResponse::from(user),
            "accessToken": access_token,
            "refreshToken": refresh_token
        }),
    )))
}

/// --------------------
/// Login
/// --------------------
#[openapi(tag = "Auth")]
#[post("/auth/login", data = "<dto>")]
pub async fn login(
    db: &State<DbConn>,
    dto: Json<LoginDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    rate_limit(
        db,
        &format!("login:{}", dto.username),
        LOGIN_LIMIT,
        LOGIN_WINDOW_MS,
    )
    .await?;

    let user = db
        .collection::<User>("users")
        .find_one(doc! { "username": &dto.username }, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    if !user.is_active {
        return Err(ApiError::unauthorized("Account is deactivated"));
    }

    let password_ok = bcrypt::verify(&dto.password, &user.password_hash)
        .map_err(|e| ApiError::internal_error(format!("Password check failed: {}", e)))?;
    if !password_ok {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let user_id = user
        .id
        .ok_or_else(|| ApiError::internal_error("User document missing id"))?;

    db.collection::<User>("users")
        .update_one(
            doc! { "_id": user_id },
            doc! { "$set": { "last_login_at": DateTime::now() } },
            None,
        )
        .await
        .ok();

    let access_token = JwtService::generate_access_token(&user_id, &user.username, user.role.as_str())
        .map_err(|e| ApiError::internal_error(e.to_string()))?;
    let refresh_token =
        JwtService::generate_refresh_token(&user_id, &user.username, user.role.as_str())
            .map_err(|e| ApiError::internal_error(e.to_string()))?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "message": "Login successful",
        "user": UserResponse::from(user),
        "accessToken": access_token,
        "refreshToken": refresh_token
    }))))
}

/// --------------------
/// Silent Refresh Token
/// --------------------
#[derive(serde::Deserialize, rocket_okapi::okapi::schemars::JsonSchema)]
pub struct RefreshTokenDto {
    pub refresh_token: String,
}

#[openapi(tag = "Auth")]
#[post("/auth/refresh", data = "<dto>")]
pub async fn refresh_token(
    db: &State<DbConn>,
    dto: Json<RefreshTokenDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    rate_limit(db, "refresh_token", REFRESH_LIMIT, REFRESH_WINDOW_MS).await?;

    let claims = JwtService::verify_token(&dto.refresh_token, true)
        .map_err(|_| ApiError::unauthorized("Invalid refresh token"))?;

    let user_id = ObjectId::parse_str(&claims.sub)
        .map_err(|_| ApiError::unauthorized("Invalid user id in token"))?;

    let access = JwtService::generate_access_token(&user_id, &claims.username, &claims.role)
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "accessToken": access
    }))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_window_starts_resets_and_denies() {
        assert_eq!(window_action(None, 5), WindowAction::Start);
        assert_eq!(window_action(Some((5, true)), 5), WindowAction::Reset);
        assert_eq!(window_action(Some((5, false)), 5), WindowAction::Deny);
        assert_eq!(window_action(Some((7, false)), 5), WindowAction::Deny);
        assert_eq!(window_action(Some((4, false)), 5), WindowAction::Count);
    }

    #[test]
    fn registration_window_denies_at_its_own_limit() {
        assert_eq!(
            window_action(Some((REGISTER_LIMIT, false)), REGISTER_LIMIT),
            WindowAction::Deny
        );
        assert_eq!(
            window_action(Some((REGISTER_LIMIT - 1, false)), REGISTER_LIMIT),
            WindowAction::Count
        );
    }
}
