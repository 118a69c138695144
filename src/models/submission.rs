use mongodb::bson::{oid::ObjectId, DateTime};
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::driver::PriceEntry;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Pending,
    Rejected,
}

/// One driver inside a pending submission. `key` is generated server-side
/// on intake so approve/reject can target an exact entry instead of an
/// array index.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DriverEntry {
    pub key: String,
    pub name: String,
    pub phone: String,
    pub license_number: String,
    pub license_image_base64: Option<String>,
    pub license_image_url: Option<String>,
    pub price_list: Vec<PriceEntry>,
}

/// A service/driver registration awaiting admin decision. Approval is not
/// a stored state: approved entries leave the `drivers` list, and the
/// document is deleted once the list is empty.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Submission {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub service: String,
    pub drivers: Vec<DriverEntry>,
    pub owner_id: ObjectId,
    pub owner_email: String,
    pub status: SubmissionStatus,
    pub rejection_reason: Option<String>,
    pub submitted_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DriverEntryDto {
    pub name: String,
    pub phone: String,
    pub license_number: String,
    pub license_image_base64: Option<String>,
    pub license_image_url: Option<String>,
    pub price_list: Vec<PriceEntry>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateSubmissionDto {
    pub service: String,
    pub drivers: Vec<DriverEntryDto>,
}
