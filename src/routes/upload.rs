use crate::guards::AuthGuard;
use crate::services::IdAnalyzerService;
use crate::utils::{ApiError, ApiResponse};
use rocket::fs::TempFile;
use rocket::serde::json::Json;
use rocket_okapi::openapi;
use std::path::Path;
use tokio::fs;
use uuid::Uuid;

fn get_extension_from_filename(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_lowercase())
}

fn is_valid_image_extension(ext: &str) -> bool {
    matches!(ext, "jpg" | "jpeg" | "png" | "webp")
}

fn extension_from_content_type(content_type: &str) -> Option<String> {
    match content_type {
        "image/jpeg" | "image/jpg" => Some("jpg".to_string()),
        "image/png" => Some("png".to_string()),
        "image/webp" => Some("webp".to_string()),
        _ => None,
    }
}

fn resolve_image_extension(file: &TempFile<'_>) -> Result<String, ApiError> {
    if let Some(ext) = file.name().and_then(get_extension_from_filename) {
        return Ok(ext);
    }
    if let Some(ct) = file.content_type() {
        if let Some(ext) = extension_from_content_type(&ct.to_string()) {
            return Ok(ext);
        }
        if let Some(ext) = ct.extension() {
            return Ok(ext.as_str().to_lowercase());
        }
    }
    Err(ApiError::bad_request(
        "Cannot determine file type from filename or content type",
    ))
}

/// License image upload. Files land under uploads/licenses and are served
/// back by the static file mount; the returned URL goes onto the driver
/// entry at submission time.
#[openapi(tag = "Upload")]
#[post("/upload/licence", data = "<file>")]
pub async fn upload_licence(
    mut file: TempFile<'_>,
    _auth: AuthGuard,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let extension = resolve_image_extension(&file)?;

    if !is_valid_image_extension(&extension) {
        return Err(ApiError::bad_request(format!(
            "Only image files (JPEG, PNG, WebP) are allowed. Received: '{}'",
            extension
        )));
    }

    let upload_dir = "uploads/licenses";
    fs::create_dir_all(upload_dir)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to create directory: {}", e)))?;

    let filename = format!(
        "{}_{}.{}",
        Uuid::new_v4(),
        chrono::Utc::now().timestamp(),
        extension
    );
    let filepath = format!("{}/{}", upload_dir, filename);

    file.persist_to(&filepath)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to save file: {}", e)))?;

    let file_url = format!("/{}", filepath);

    info!("License image saved to {}", filepath);

    Ok(Json(ApiResponse::success(serde_json::json!({
        "url": file_url,
        "filename": filename,
        "message": "License image uploaded successfully"
    }))))
}

/// Passthrough to the IDAnalyzer core API: the third-party JSON comes back
/// verbatim. Auth and image-type checks gate the call; the body size cap
/// comes from the Rocket file limit.
#[openapi(tag = "Upload")]
#[post("/licence/verify", data = "<file>")]
pub async fn verify_licence(
    mut file: TempFile<'_>,
    _auth: AuthGuard,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let extension = resolve_image_extension(&file)?;

    if !is_valid_image_extension(&extension) {
        return Err(ApiError::bad_request(format!(
            "Only image files (JPEG, PNG, WebP) are allowed. Received: '{}'",
            extension
        )));
    }

    if !crate::config::Config::is_idanalyzer_enabled() {
        return Err(ApiError::internal_error(
            "License verification is not configured",
        ));
    }

    let tmp_dir = "uploads/tmp";
    fs::create_dir_all(tmp_dir)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to create directory: {}", e)))?;

    let file_name = format!("{}.{}", Uuid::new_v4(), extension);
    let tmp_path = format!("{}/{}", tmp_dir, file_name);

    file.persist_to(&tmp_path)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to save file: {}", e)))?;

    let bytes = fs::read(&tmp_path)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to read file: {}", e)))?;

    let result = IdAnalyzerService::verify_licence(bytes, &file_name).await;

    fs::remove_file(&tmp_path).await.ok();

    let verification = result.map_err(|e| {
        error!("IDAnalyzer error: {}", e);
        ApiError::internal_error("Verification failed")
    })?;

    Ok(Json(ApiResponse::success(verification)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_resolution_from_filename() {
        assert_eq!(
            get_extension_from_filename("licence.PNG"),
            Some("png".to_string())
        );
        assert_eq!(
            get_extension_from_filename("photo.jpeg"),
            Some("jpeg".to_string())
        );
        assert_eq!(get_extension_from_filename("noext"), None);
    }

    #[test]
    fn only_image_extensions_accepted() {
        assert!(is_valid_image_extension("jpg"));
        assert!(is_valid_image_extension("webp"));
        assert!(!is_valid_image_extension("pdf"));
        assert!(!is_valid_image_extension("exe"));
    }

    #[test]
    fn content_type_mapping() {
        assert_eq!(
            extension_from_content_type("image/jpeg"),
            Some("jpg".to_string())
        );
        assert_eq!(
            extension_from_content_type("image/png"),
            Some("png".to_string())
        );
        assert_eq!(extension_from_content_type("application/pdf"), None);
    }
}
