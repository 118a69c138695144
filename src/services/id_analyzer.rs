use crate::config::Config;

/// Thin client for the IDAnalyzer core API. The response JSON is handed
/// back verbatim; interpreting the verification result is left to the
/// caller.
pub struct IdAnalyzerService;

impl IdAnalyzerService {
    pub async fn verify_licence(
        file_bytes: Vec<u8>,
        file_name: &str,
    ) -> Result<serde_json::Value, String> {
        let api_key = Config::idanalyzer_api_key()
            .ok_or_else(|| "IDAnalyzer API key not configured".to_string())?;

        let part = reqwest::multipart::Part::bytes(file_bytes)
            .file_name(file_name.to_string())
            .mime_str("application/octet-stream")
            .map_err(|e| format!("Invalid multipart body: {}", e))?;

        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("apikey", api_key)
            .text("outputformat", "json");

        let client = reqwest::Client::new();
        let response = client
            .post(Config::idanalyzer_url())
            .multipart(form)
            .send()
            .await
            .map_err(|e| format!("IDAnalyzer request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("IDAnalyzer returned status {}", response.status()));
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| format!("IDAnalyzer returned invalid JSON: {}", e))
    }
}
