use crate::db::DbConn;
use crate::guards::AuthGuard;
use crate::models::{
    CreateSubmissionDto, DriverEntry, DriverEntryDto, Submission, SubmissionStatus,
};
use crate::utils::{validate_phone, ApiError, ApiResponse};
use mongodb::bson::{doc, DateTime};
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;
use uuid::Uuid;

const MAX_LICENSE_IMAGE_BYTES: usize = 10 * 1024 * 1024;

fn validate_entry(entry: &DriverEntryDto) -> Result<(), String> {
    if entry.name.trim().is_empty() {
        return Err("Driver name is required".to_string());
    }
    if !validate_phone(&entry.phone) {
        return Err(format!("Invalid phone number: {}", entry.phone));
    }
    if entry.license_number.trim().is_empty() {
        return Err("License number is required".to_string());
    }
    let has_inline = entry
        .license_image_base64
        .as_deref()
        .map(|s| !s.is_empty())
        .unwrap_or(false);
    let has_url = entry
        .license_image_url
        .as_deref()
        .map(|s| !s.is_empty())
        .unwrap_or(false);
    if !has_inline && !has_url {
        return Err("Each driver must have a license image".to_string());
    }
    if let Some(data) = entry.license_image_base64.as_deref() {
        if !data.is_empty() {
            let decoded = data_encoding::BASE64
                .decode(data.as_bytes())
                .map_err(|_| "License image is not valid base64".to_string())?;
            if decoded.len() > MAX_LICENSE_IMAGE_BYTES {
                return Err("License image exceeds 10MB limit".to_string());
            }
        }
    }
    if entry.price_list.is_empty() {
        return Err("Each driver needs at least one price entry".to_string());
    }
    if entry
        .price_list
        .iter()
        .any(|p| p.location.trim().is_empty() || p.price.trim().is_empty())
    {
        return Err("Price entries must have a location and a price".to_string());
    }
    Ok(())
}

fn validate_submission(dto: &CreateSubmissionDto) -> Result<(), String> {
    if dto.service.trim().is_empty() {
        return Err("Service name is required".to_string());
    }
    if dto.drivers.is_empty() {
        return Err("At least one driver is required".to_string());
    }
    for entry in &dto.drivers {
        validate_entry(entry)?;
    }
    Ok(())
}

/// Submission intake: validated server-side, written with status "pending".
#[openapi(tag = "Submission")]
#[post("/submission", data = "<dto>")]
pub async fn create_submission(
    db: &State<DbConn>,
    auth: AuthGuard,
    dto: Json<CreateSubmissionDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    validate_submission(&dto).map_err(ApiError::bad_request)?;

    let user = db
        .collection::<crate::models::User>("users")
        .find_one(doc! { "_id": auth.user_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .ok_or_else(|| ApiError::unauthorized("User not found"))?;

    let drivers: Vec<DriverEntry> = dto
        .drivers
        .iter()
        .map(|d| DriverEntry {
            key: Uuid::new_v4().to_string(),
            name: d.name.trim().to_string(),
            phone: d.phone.trim().to_string(),
            license_number: d.license_number.trim().to_string(),
            license_image_base64: d.license_image_base64.clone(),
            license_image_url: d.license_image_url.clone(),
            price_list: d.price_list.clone(),
        })
        .collect();

    let submission = Submission {
        id: None,
        service: dto.service.trim().to_string(),
        drivers,
        owner_id: auth.user_id,
        owner_email: user.email,
        status: SubmissionStatus::Pending,
        rejection_reason: None,
        submitted_at: DateTime::now(),
        updated_at: DateTime::now(),
    };

    let result = db
        .collection::<Submission>("submissions")
        .insert_one(&submission, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to create submission: {}", e)))?;

    let submission_id = result
        .inserted_id
        .as_object_id()
        .ok_or_else(|| ApiError::internal_error("Failed to read inserted submission id"))?;

    info!(
        "Submission {} created for service '{}' with {} driver(s)",
        submission_id.to_hex(),
        submission.service,
        submission.drivers.len()
    );

    Ok(Json(ApiResponse::success_with_message(
        "Service and drivers submitted for admin approval".to_string(),
        serde_json::json!({
            "submission_id": submission_id.to_hex()
        }),
    )))
}

/// The caller's own submissions, pending and rejected alike.
#[openapi(tag = "Submission")]
#[get("/submission/mine")]
pub async fn get_my_submissions(
    db: &State<DbConn>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let mut cursor = db
        .collection::<Submission>("submissions")
        .find(doc! { "owner_id": auth.user_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?;

    let mut submissions = Vec::new();
    while cursor
        .advance()
        .await
        .map_err(|e| ApiError::internal_error(format!("Cursor error: {}", e)))?
    {
        let submission: Submission = cursor
            .deserialize_current()
            .map_err(|e| ApiError::internal_error(format!("Deserialization error: {}", e)))?;
        submissions.push(submission);
    }

    Ok(Json(ApiResponse::success(serde_json::json!({
        "submissions": submissions
    }))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PriceEntry;

    fn entry() -> DriverEntryDto {
        DriverEntryDto {
            name: "Avinash".to_string(),
            phone: "+23051234567".to_string(),
            license_number: "DL-4421".to_string(),
            license_image_base64: Some("aGVsbG8=".to_string()),
            license_image_url: None,
            price_list: vec![PriceEntry {
                location: "Moka".to_string(),
                price: "600".to_string(),
            }],
        }
    }

    fn dto() -> CreateSubmissionDto {
        CreateSubmissionDto {
            service: "Airport runs".to_string(),
            drivers: vec![entry()],
        }
    }

    #[test]
    fn valid_submission_passes() {
        assert!(validate_submission(&dto()).is_ok());
    }

    #[test]
    fn invalid_phone_is_rejected() {
        let mut dto = dto();
        dto.drivers[0].phone = "12345".to_string();
        assert!(validate_submission(&dto).is_err());
    }

    #[test]
    fn missing_license_image_is_rejected() {
        let mut dto = dto();
        dto.drivers[0].license_image_base64 = None;
        assert!(validate_submission(&dto).is_err());

        // An uploaded-file URL is the other accepted scheme
        dto.drivers[0].license_image_url = Some("/uploads/licenses/x.png".to_string());
        assert!(validate_submission(&dto).is_ok());
    }

    #[test]
    fn empty_price_list_is_rejected() {
        let mut dto = dto();
        dto.drivers[0].price_list.clear();
        assert!(validate_submission(&dto).is_err());
    }

    #[test]
    fn blank_service_is_rejected() {
        let mut sub = dto();
        sub.service = "  ".to_string();
        assert!(validate_submission(&sub).is_err());
    }

    #[test]
    fn empty_driver_list_is_rejected() {
        let mut sub = dto();
        sub.drivers.clear();
        assert!(validate_submission(&sub).is_err());
    }

    #[test]
    fn malformed_base64_image_is_rejected() {
        let mut sub = dto();
        sub.drivers[0].license_image_base64 = Some("not base64!!".to_string());
        assert!(validate_submission(&sub).is_err());
    }
}
