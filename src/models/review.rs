use mongodb::bson::{oid::ObjectId, DateTime};
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Review {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub driver_id: ObjectId,
    pub user_id: ObjectId,
    pub reviewer_name: String,
    pub rating: i32, // 1-5
    pub text: Option<String>,
    pub created_at: DateTime,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateReviewDto {
    pub driver_id: String,
    pub rating: i32,
    pub text: Option<String>,
}
