use mongodb::bson::{oid::ObjectId, DateTime};
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
pub enum Availability {
    Free,
    Busy,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema)]
pub struct PriceEntry {
    pub location: String,
    pub price: String,
}

/// An approved, publicly listable driver. Created only by the approval
/// workflow; `rating`/`total_reviews` are recomputed from the reviews
/// collection after every review write.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Driver {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub phone: String,
    pub service: String,
    pub license_number: String,
    pub license_image_url: Option<String>,
    pub price_list: Vec<PriceEntry>,
    pub availability: Availability,
    pub rating: f64,
    pub total_reviews: i32,
    pub owner_id: Option<ObjectId>,
    pub owner_email: Option<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateDriverDto {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub availability: Option<Availability>,
    pub price_list: Option<Vec<PriceEntry>>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct DriverResponse {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub service: String,
    pub price_list: Vec<PriceEntry>,
    pub availability: Availability,
    pub rating: f64,
    pub total_reviews: i32,
}

impl From<Driver> for DriverResponse {
    fn from(driver: Driver) -> Self {
        DriverResponse {
            id: driver.id.map(|id| id.to_hex()).unwrap_or_default(),
            name: driver.name,
            phone: driver.phone,
            service: driver.service,
            price_list: driver.price_list,
            availability: driver.availability,
            rating: driver.rating,
            total_reviews: driver.total_reviews,
        }
    }
}
