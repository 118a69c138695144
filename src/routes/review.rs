use crate::db::DbConn;
use crate::guards::AuthGuard;
use crate::models::{CreateReviewDto, Driver, Review};
use crate::utils::{display_rating, ApiError, ApiResponse};
use mongodb::bson::{doc, oid::ObjectId, DateTime};
use mongodb::options::FindOptions;
use rocket::futures::TryStreamExt;
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

fn valid_rating(rating: i32) -> bool {
    (1..=5).contains(&rating)
}

/// The denormalized pair stored on the driver document: displayed average
/// and review count, both derived from the review ratings alone.
fn rating_update(ratings: &[i32]) -> (f64, i32) {
    (display_rating(ratings), ratings.len() as i32)
}

/// Recompute the denormalized rating pair from the reviews collection.
/// Keeping the aggregate derived (instead of patching an array in place)
/// is what keeps it consistent with the set of non-deleted reviews.
async fn recompute_driver_rating(db: &DbConn, driver_id: ObjectId) -> Result<(), ApiError> {
    let all_reviews: Vec<Review> = db
        .collection::<Review>("reviews")
        .find(doc! { "driver_id": driver_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .try_collect()
        .await
        .map_err(|e| ApiError::internal_error(format!("Collection error: {}", e)))?;

    let ratings: Vec<i32> = all_reviews.iter().map(|r| r.rating).collect();
    let (avg, total) = rating_update(&ratings);

    db.collection::<Driver>("drivers")
        .update_one(
            doc! { "_id": driver_id },
            doc! {
                "$set": {
                    "rating": avg,
                    "total_reviews": total,
                    "updated_at": DateTime::now()
                }
            },
            None,
        )
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to update driver rating: {}", e)))?;

    Ok(())
}

#[openapi(tag = "Review")]
#[post("/review", data = "<dto>")]
pub async fn create_review(
    db: &State<DbConn>,
    auth: AuthGuard,
    dto: Json<CreateReviewDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    if !valid_rating(dto.rating) {
        return Err(ApiError::bad_request("Rating must be between 1 and 5"));
    }

    let driver_id = ObjectId::parse_str(&dto.driver_id)
        .map_err(|_| ApiError::bad_request("Invalid driver ID"))?;

    db.collection::<Driver>("drivers")
        .find_one(doc! { "_id": driver_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .ok_or_else(|| ApiError::not_found("Driver not found"))?;

    let existing_review = db
        .collection::<Review>("reviews")
        .find_one(
            doc! {
                "driver_id": driver_id,
                "user_id": auth.user_id
            },
            None,
        )
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?;

    if existing_review.is_some() {
        return Err(ApiError::bad_request("You have already reviewed this driver"));
    }

    let review = Review {
        id: None,
        driver_id,
        user_id: auth.user_id,
        reviewer_name: auth.username.clone(),
        rating: dto.rating,
        text: dto
            .text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string),
        created_at: DateTime::now(),
    };

    let result = db
        .collection::<Review>("reviews")
        .insert_one(&review, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to create review: {}", e)))?;

    let review_id = result
        .inserted_id
        .as_object_id()
        .ok_or_else(|| ApiError::internal_error("Failed to read inserted review id"))?;

    if let Err(e) = recompute_driver_rating(db, driver_id).await {
        // Roll the insert back so the aggregate and the collection stay in step
        db.collection::<Review>("reviews")
            .delete_one(doc! { "_id": review_id }, None)
            .await
            .ok();
        return Err(e);
    }

    Ok(Json(ApiResponse::success_with_message(
        "Review submitted successfully".to_string(),
        serde_json::json!({
            "review_id": review_id.to_hex()
        }),
    )))
}

#[derive(FromForm, serde::Deserialize, rocket_okapi::okapi::schemars::JsonSchema)]
pub struct DriverReviewsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[openapi(tag = "Review")]
#[get("/review/driver/<driver_id>?<query..>")]
pub async fn get_driver_reviews(
    db: &State<DbConn>,
    driver_id: String,
    query: DriverReviewsQuery,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).min(100);
    let skip = (page - 1) * limit;

    let object_id = ObjectId::parse_str(&driver_id)
        .map_err(|_| ApiError::bad_request("Invalid driver ID"))?;

    let filter = doc! { "driver_id": object_id };

    let find_options = FindOptions::builder()
        .skip(skip as u64)
        .limit(limit)
        .sort(doc! { "created_at": -1 })
        .build();

    let mut cursor = db
        .collection::<Review>("reviews")
        .find(filter.clone(), find_options)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?;

    let mut reviews = Vec::new();
    while cursor
        .advance()
        .await
        .map_err(|e| ApiError::internal_error(format!("Cursor error: {}", e)))?
    {
        let review = cursor
            .deserialize_current()
            .map_err(|e| ApiError::internal_error(format!("Deserialization error: {}", e)))?;
        reviews.push(review);
    }

    let total = db
        .collection::<Review>("reviews")
        .count_documents(filter, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Count error: {}", e)))?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "reviews": reviews,
        "pagination": {
            "page": page,
            "limit": limit,
            "total": total,
            "pages": (total as f64 / limit as f64).ceil() as i64,
        }
    }))))
}

#[openapi(tag = "Review")]
#[delete("/review/<review_id>")]
pub async fn delete_review(
    db: &State<DbConn>,
    auth: AuthGuard,
    review_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let object_id = ObjectId::parse_str(&review_id)
        .map_err(|_| ApiError::bad_request("Invalid review ID"))?;

    // Verify ownership
    let review = db
        .collection::<Review>("reviews")
        .find_one(doc! { "_id": object_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .ok_or_else(|| ApiError::not_found("Review not found"))?;

    if review.user_id != auth.user_id {
        return Err(ApiError::forbidden("Not authorized to delete this review"));
    }

    db.collection::<Review>("reviews")
        .delete_one(doc! { "_id": object_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to delete review: {}", e)))?;

    if let Err(e) = recompute_driver_rating(db, review.driver_id).await {
        // Put the review back; it still carries its original _id
        db.collection::<Review>("reviews")
            .insert_one(&review, None)
            .await
            .ok();
        return Err(e);
    }

    Ok(Json(ApiResponse::success(serde_json::json!({
        "message": "Review deleted successfully"
    }))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratings_outside_one_to_five_are_rejected() {
        assert!(!valid_rating(0));
        assert!(!valid_rating(6));
        assert!(!valid_rating(-3));
        for rating in 1..=5 {
            assert!(valid_rating(rating));
        }
    }

    #[test]
    fn aggregate_derives_from_review_ratings_alone() {
        assert_eq!(rating_update(&[]), (0.0, 0));
        assert_eq!(rating_update(&[4]), (4.0, 1));
        assert_eq!(rating_update(&[4, 5]), (4.5, 2));
        assert_eq!(rating_update(&[3, 4, 4]), (3.7, 3));
    }
}
