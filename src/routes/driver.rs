use crate::db::DbConn;
use crate::guards::AuthGuard;
use crate::models::{Driver, DriverResponse, Review, UpdateDriverDto};
use crate::utils::{validate_phone, ApiError, ApiResponse};
use mongodb::bson::{doc, oid::ObjectId, Bson, DateTime};
use mongodb::options::FindOptions;
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

#[derive(FromForm, serde::Deserialize, rocket_okapi::okapi::schemars::JsonSchema)]
pub struct SearchDriversQuery {
    /// Case-insensitive substring match on name or service.
    pub q: Option<String>,
    /// "recent" (default), "alphabetical" or "rating".
    pub sort: Option<String>,
    pub service: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

fn sort_doc(sort: Option<&str>) -> Result<mongodb::bson::Document, ApiError> {
    match sort.unwrap_or("recent") {
        "alphabetical" => Ok(doc! { "name": 1 }),
        "rating" => Ok(doc! { "rating": -1, "total_reviews": -1 }),
        "recent" => Ok(doc! { "created_at": -1 }),
        other => Err(ApiError::bad_request(format!("Unknown sort: {}", other))),
    }
}

/// Search filter: `q` matches name or service as a case-insensitive
/// substring (metacharacters escaped), `service` narrows to one service.
fn search_filter(q: Option<&str>, service: Option<&str>) -> mongodb::bson::Document {
    let mut filter = doc! {};

    if let Some(q) = q {
        let pattern = regex::escape(q.trim());
        let re = doc! { "$regex": &pattern, "$options": "i" };
        filter.insert(
            "$or",
            vec![doc! { "name": re.clone() }, doc! { "service": re }],
        );
    }

    if let Some(service) = service {
        filter.insert(
            "service",
            doc! { "$regex": regex::escape(service.trim()), "$options": "i" },
        );
    }

    filter
}

#[openapi(tag = "Driver")]
#[get("/driver/search?<query..>")]
pub async fn search_drivers(
    db: &State<DbConn>,
    query: SearchDriversQuery,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).min(100);
    let skip = (page - 1) * limit;

    let filter = search_filter(query.q.as_deref(), query.service.as_deref());

    let find_options = FindOptions::builder()
        .skip(skip as u64)
        .limit(limit)
        .sort(sort_doc(query.sort.as_deref())?)
        .build();

    let mut cursor = db
        .collection::<Driver>("drivers")
        .find(filter.clone(), find_options)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?;

    let mut drivers: Vec<DriverResponse> = Vec::new();
    while cursor
        .advance()
        .await
        .map_err(|e| ApiError::internal_error(format!("Cursor error: {}", e)))?
    {
        let driver = cursor
            .deserialize_current()
            .map_err(|e| ApiError::internal_error(format!("Deserialization error: {}", e)))?;
        drivers.push(driver.into());
    }

    let total = db
        .collection::<Driver>("drivers")
        .count_documents(filter, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Count error: {}", e)))?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "drivers": drivers,
        "pagination": {
            "page": page,
            "limit": limit,
            "total": total,
            "pages": (total as f64 / limit as f64).ceil() as i64,
        }
    }))))
}

#[openapi(tag = "Driver")]
#[get("/driver/<driver_id>")]
pub async fn get_driver(
    db: &State<DbConn>,
    driver_id: String,
) -> Result<Json<ApiResponse<DriverResponse>>, ApiError> {
    let object_id =
        ObjectId::parse_str(&driver_id).map_err(|_| ApiError::bad_request("Invalid driver ID"))?;

    let driver = db
        .collection::<Driver>("drivers")
        .find_one(doc! { "_id": object_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .ok_or_else(|| ApiError::not_found("Driver not found"))?;

    Ok(Json(ApiResponse::success(driver.into())))
}

/// Owner dashboard: every approved driver submitted by the caller.
#[openapi(tag = "Driver")]
#[get("/driver/mine")]
pub async fn get_my_drivers(
    db: &State<DbConn>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<Vec<DriverResponse>>>, ApiError> {
    let mut cursor = db
        .collection::<Driver>("drivers")
        .find(doc! { "owner_id": auth.user_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?;

    let mut drivers = Vec::new();
    while cursor
        .advance()
        .await
        .map_err(|e| ApiError::internal_error(format!("Cursor error: {}", e)))?
    {
        let driver: Driver = cursor
            .deserialize_current()
            .map_err(|e| ApiError::internal_error(format!("Deserialization error: {}", e)))?;
        drivers.push(driver.into());
    }

    Ok(Json(ApiResponse::success(drivers)))
}

#[openapi(tag = "Driver")]
#[put("/driver/<driver_id>", data = "<dto>")]
pub async fn update_driver(
    db: &State<DbConn>,
    auth: AuthGuard,
    driver_id: String,
    dto: Json<UpdateDriverDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let object_id =
        ObjectId::parse_str(&driver_id).map_err(|_| ApiError::bad_request("Invalid driver ID"))?;

    let driver = db
        .collection::<Driver>("drivers")
        .find_one(doc! { "_id": object_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .ok_or_else(|| ApiError::not_found("Driver not found"))?;

    if driver.owner_id != Some(auth.user_id) {
        return Err(ApiError::forbidden("Not authorized to edit this driver"));
    }

    if let Some(ref phone) = dto.phone {
        if !validate_phone(phone) {
            return Err(ApiError::bad_request("Invalid phone number"));
        }
    }
    if let Some(ref price_list) = dto.price_list {
        if price_list.is_empty() {
            return Err(ApiError::bad_request("Price list cannot be empty"));
        }
    }

    let mut update_doc = doc! {
        "updated_at": DateTime::now()
    };

    if let Some(ref name) = dto.name {
        update_doc.insert("name", name);
    }
    if let Some(ref phone) = dto.phone {
        update_doc.insert("phone", phone.trim());
    }
    if let Some(availability) = dto.availability {
        update_doc.insert(
            "availability",
            mongodb::bson::to_bson(&availability)
                .map_err(|e| ApiError::internal_error(format!("Serialization error: {}", e)))?,
        );
    }
    if let Some(ref price_list) = dto.price_list {
        let entries: Vec<Bson> = price_list
            .iter()
            .map(|p| Bson::Document(doc! { "location": &p.location, "price": &p.price }))
            .collect();
        update_doc.insert("price_list", entries);
    }

    db.collection::<Driver>("drivers")
        .update_one(doc! { "_id": object_id }, doc! { "$set": update_doc }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to update driver: {}", e)))?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "message": "Driver updated successfully"
    }))))
}

#[openapi(tag = "Driver")]
#[delete("/driver/<driver_id>")]
pub async fn delete_driver(
    db: &State<DbConn>,
    auth: AuthGuard,
    driver_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let object_id =
        ObjectId::parse_str(&driver_id).map_err(|_| ApiError::bad_request("Invalid driver ID"))?;

    let driver = db
        .collection::<Driver>("drivers")
        .find_one(doc! { "_id": object_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .ok_or_else(|| ApiError::not_found("Driver not found"))?;

    if driver.owner_id != Some(auth.user_id) {
        return Err(ApiError::forbidden("Not authorized to delete this driver"));
    }

    db.collection::<Review>("reviews")
        .delete_many(doc! { "driver_id": object_id }, None)
        .await
        .ok();

    db.collection::<Driver>("drivers")
        .delete_one(doc! { "_id": object_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to delete driver: {}", e)))?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "message": "Driver deleted successfully"
    }))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_options_map_to_expected_fields() {
        assert_eq!(sort_doc(None).unwrap(), doc! { "created_at": -1 });
        assert_eq!(sort_doc(Some("recent")).unwrap(), doc! { "created_at": -1 });
        assert_eq!(sort_doc(Some("alphabetical")).unwrap(), doc! { "name": 1 });
        assert_eq!(
            sort_doc(Some("rating")).unwrap(),
            doc! { "rating": -1, "total_reviews": -1 }
        );
        assert!(sort_doc(Some("bogus")).is_err());
    }

    #[test]
    fn search_matches_name_and_service_case_insensitively() {
        let filter = search_filter(Some("flic"), None);

        let clauses = filter.get_array("$or").unwrap();
        assert_eq!(clauses.len(), 2);

        let name_clause = clauses[0]
            .as_document()
            .unwrap()
            .get_document("name")
            .unwrap();
        assert_eq!(name_clause.get_str("$regex").unwrap(), "flic");
        assert_eq!(name_clause.get_str("$options").unwrap(), "i");

        // The same regex semantics the server applies: "flic" finds a
        // driver serving "Flic en Flac" regardless of case
        let re = regex::RegexBuilder::new(name_clause.get_str("$regex").unwrap())
            .case_insensitive(true)
            .build()
            .unwrap();
        assert!(re.is_match("Flic en Flac"));
        assert!(!re.is_match("Grand Baie"));
    }

    #[test]
    fn search_escapes_regex_metacharacters() {
        let filter = search_filter(Some("a+b"), None);
        let clauses = filter.get_array("$or").unwrap();
        let name_clause = clauses[0]
            .as_document()
            .unwrap()
            .get_document("name")
            .unwrap();
        assert_eq!(name_clause.get_str("$regex").unwrap(), "a\\+b");
    }

    #[test]
    fn empty_search_yields_unfiltered_query() {
        assert!(search_filter(None, None).is_empty());
    }

    #[test]
    fn service_filter_is_applied_alongside_query() {
        let filter = search_filter(Some("taxi"), Some("Airport runs"));
        assert!(filter.contains_key("$or"));
        let service = filter.get_document("service").unwrap();
        assert_eq!(service.get_str("$regex").unwrap(), "Airport runs");
        assert_eq!(service.get_str("$options").unwrap(), "i");
    }
}
