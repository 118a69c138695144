use crate::db::DbConn;
use crate::guards::AdminGuard;
use crate::models::{Availability, Driver, DriverEntry, Submission, SubmissionStatus};
use crate::utils::{ApiError, ApiResponse};
use mongodb::bson::{doc, oid::ObjectId, DateTime};
use mongodb::options::FindOptions;
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

/// Copy-on-approve: a fresh registry document from a pending entry. New
/// drivers start Free with zero reviews.
fn driver_from_entry(submission: &Submission, entry: &DriverEntry) -> Driver {
    Driver {
        id: None,
        name: entry.name.clone(),
        phone: entry.phone.clone(),
        service: submission.service.clone(),
        license_number: entry.license_number.clone(),
        license_image_url: entry.license_image_url.clone(),
        price_list: entry.price_list.clone(),
        availability: Availability::Free,
        rating: 0.0,
        total_reviews: 0,
        owner_id: Some(submission.owner_id),
        owner_email: Some(submission.owner_email.clone()),
        created_at: DateTime::now(),
        updated_at: DateTime::now(),
    }
}

async fn find_pending_submission(
    db: &DbConn,
    submission_id: &str,
) -> Result<(ObjectId, Submission), ApiError> {
    let object_id = ObjectId::parse_str(submission_id)
        .map_err(|_| ApiError::bad_request("Invalid submission ID"))?;

    let submission = db
        .collection::<Submission>("submissions")
        .find_one(doc! { "_id": object_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .ok_or_else(|| ApiError::not_found("Submission not found"))?;

    if submission.status != SubmissionStatus::Pending {
        return Err(ApiError::bad_request("Submission is not pending"));
    }

    Ok((object_id, submission))
}

/// Remove one entry from a submission, deleting the whole document when
/// the entry list empties.
async fn remove_entry(
    db: &DbConn,
    submission_id: ObjectId,
    submission: &Submission,
    key: &str,
) -> Result<(), mongodb::error::Error> {
    let submissions = db.collection::<Submission>("submissions");

    if submission.drivers.len() <= 1 {
        submissions
            .delete_one(doc! { "_id": submission_id }, None)
            .await?;
    } else {
        submissions
            .update_one(
                doc! { "_id": submission_id },
                doc! {
                    "$pull": { "drivers": { "key": key } },
                    "$set": { "updated_at": DateTime::now() }
                },
                None,
            )
            .await?;
    }
    Ok(())
}

#[derive(FromForm, serde::Deserialize, rocket_okapi::okapi::schemars::JsonSchema)]
pub struct SubmissionListQuery {
    pub status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[openapi(tag = "Admin")]
#[get("/admin/submissions?<query..>")]
pub async fn get_all_submissions(
    db: &State<DbConn>,
    _admin: AdminGuard,
    query: SubmissionListQuery,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).min(100);
    let skip = (page - 1) * limit;

    let mut filter = doc! {};
    if let Some(status) = query.status {
        filter.insert("status", status);
    }

    let find_options = FindOptions::builder()
        .skip(skip as u64)
        .limit(limit)
        .sort(doc! { "submitted_at": -1 })
        .build();

    let mut cursor = db
        .collection::<Submission>("submissions")
        .find(filter.clone(), find_options)
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

    let total = db
        .collection::<Submission>("submissions")
        .count_documents(filter, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Count error: {}", e)))?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "submissions": submissions,
        "pagination": {
            "page": page,
            "limit": limit,
            "total": total,
            "pages": (total as f64 / limit as f64).ceil() as i64,
        }
    }))))
}

#[openapi(tag = "Admin")]
#[get("/admin/submissions/<submission_id>")]
pub async fn get_submission_by_id(
    db: &State<DbConn>,
    _admin: AdminGuard,
    submission_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let object_id = ObjectId::parse_str(&submission_id)
        .map_err(|_| ApiError::bad_request("Invalid submission ID"))?;

    let submission = db
        .collection::<Submission>("submissions")
        .find_one(doc! { "_id": object_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .ok_or_else(|| ApiError::not_found("Submission not found"))?;

    Ok(Json(ApiResponse::success(serde_json::json!(submission))))
}

/// Approve one driver entry: exactly one new registry document, and the
/// approved entry leaves the submission. If the submission cleanup fails
/// after the insert, the new driver is removed again so a retry cannot
/// produce a duplicate.
#[openapi(tag = "Admin")]
#[post("/admin/submissions/<submission_id>/drivers/<driver_key>/approve")]
pub async fn approve_driver(
    db: &State<DbConn>,
    _admin: AdminGuard,
    submission_id: String,
    driver_key: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let (object_id, submission) = find_pending_submission(db, &submission_id).await?;

    let entry = submission
        .drivers
        .iter()
        .find(|d| d.key == driver_key)
        .ok_or_else(|| ApiError::not_found("Driver entry not found in submission"))?;

    let driver = driver_from_entry(&submission, entry);

    let insert_result = db
        .collection::<Driver>("drivers")
        .insert_one(&driver, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to create driver: {}", e)))?;

    let driver_id = insert_result
        .inserted_id
        .as_object_id()
        .ok_or_else(|| ApiError::internal_error("Failed to read inserted driver id"))?;

    if let Err(e) = remove_entry(db, object_id, &submission, &driver_key).await {
        // Roll the insert back before reporting failure
        db.collection::<Driver>("drivers")
            .delete_one(doc! { "_id": driver_id }, None)
            .await
            .ok();
        return Err(ApiError::internal_error(format!(
            "Failed to update submission: {}",
            e
        )));
    }

    info!(
        "Approved driver '{}' from submission {} as {}",
        driver.name,
        object_id.to_hex(),
        driver_id.to_hex()
    );

    Ok(Json(ApiResponse::success_with_message(
        format!("Approved {}", driver.name),
        serde_json::json!({
            "driver_id": driver_id.to_hex()
        }),
    )))
}

/// Reject one driver entry: the entry is removed, the submission is
/// deleted once its list empties. No registry document is created.
#[openapi(tag = "Admin")]
#[post("/admin/submissions/<submission_id>/drivers/<driver_key>/reject")]
pub async fn reject_driver(
    db: &State<DbConn>,
    _admin: AdminGuard,
    submission_id: String,
    driver_key: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let (object_id, submission) = find_pending_submission(db, &submission_id).await?;

    let entry = submission
        .drivers
        .iter()
        .find(|d| d.key == driver_key)
        .ok_or_else(|| ApiError::not_found("Driver entry not found in submission"))?;
    let name = entry.name.clone();

    remove_entry(db, object_id, &submission, &driver_key)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to update submission: {}", e)))?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "message": format!("Rejected {}", name)
    }))))
}

#[derive(serde::Deserialize, rocket_okapi::okapi::schemars::JsonSchema)]
pub struct RejectSubmissionDto {
    pub reason: String,
}

/// A whole-submission rejection must carry a reason the submitter can read.
fn normalized_reason(reason: &str) -> Option<&str> {
    let trimmed = reason.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Reject a whole submission: kept in place with status "rejected" and the
/// reason, so the submitter can see why.
#[openapi(tag = "Admin")]
#[post("/admin/submissions/<submission_id>/reject", data = "<dto>")]
pub async fn reject_submission(
    db: &State<DbConn>,
    _admin: AdminGuard,
    submission_id: String,
    dto: Json<RejectSubmissionDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let reason = normalized_reason(&dto.reason)
        .ok_or_else(|| ApiError::bad_request("Please enter a reason for rejection"))?;

    let (object_id, _submission) = find_pending_submission(db, &submission_id).await?;

    db.collection::<Submission>("submissions")
        .update_one(
            doc! { "_id": object_id },
            doc! {
                "$set": {
                    "status": "rejected",
                    "rejection_reason": reason,
                    "updated_at": DateTime::now()
                }
            },
            None,
        )
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to reject submission: {}", e)))?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "message": "Submission rejected"
    }))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PriceEntry;

    fn sample_submission() -> Submission {
        Submission {
            id: Some(ObjectId::new()),
            service: "Airport runs".to_string(),
            drivers: vec![DriverEntry {
                key: "k1".to_string(),
                name: "Avinash".to_string(),
                phone: "+23051234567".to_string(),
                license_number: "DL-4421".to_string(),
                license_image_base64: None,
                license_image_url: Some("/uploads/licenses/a.png".to_string()),
                price_list: vec![PriceEntry {
                    location: "Moka".to_string(),
                    price: "600".to_string(),
                }],
            }],
            owner_id: ObjectId::new(),
            owner_email: "owner@example.com".to_string(),
            status: SubmissionStatus::Pending,
            rejection_reason: None,
            submitted_at: DateTime::now(),
            updated_at: DateTime::now(),
        }
    }

    #[test]
    fn approved_driver_starts_free_with_no_reviews() {
        let submission = sample_submission();
        let driver = driver_from_entry(&submission, &submission.drivers[0]);

        assert_eq!(driver.availability, Availability::Free);
        assert_eq!(driver.rating, 0.0);
        assert_eq!(driver.total_reviews, 0);
        assert_eq!(driver.service, "Airport runs");
        assert_eq!(driver.owner_id, Some(submission.owner_id));
        assert!(driver.id.is_none());
    }

    #[test]
    fn approved_driver_carries_entry_fields() {
        let submission = sample_submission();
        let driver = driver_from_entry(&submission, &submission.drivers[0]);

        assert_eq!(driver.name, "Avinash");
        assert_eq!(driver.phone, "+23051234567");
        assert_eq!(driver.license_number, "DL-4421");
        assert_eq!(driver.price_list.len(), 1);
        assert_eq!(driver.price_list[0].location, "Moka");
        assert_eq!(driver.price_list[0].price, "600");
    }

    #[test]
    fn rejection_requires_a_nonempty_reason() {
        assert_eq!(normalized_reason(""), None);
        assert_eq!(normalized_reason("   "), None);
        assert_eq!(
            normalized_reason(" licence photo unreadable "),
            Some("licence photo unreadable")
        );
    }

    #[test]
    fn availability_serializes_as_plain_variant_names() {
        let free = mongodb::bson::to_bson(&Availability::Free).unwrap();
        let busy = mongodb::bson::to_bson(&Availability::Busy).unwrap();
        assert_eq!(free, mongodb::bson::Bson::String("Free".to_string()));
        assert_eq!(busy, mongodb::bson::Bson::String("Busy".to_string()));
    }
}
