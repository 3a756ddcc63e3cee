//! Gemini (Google) room designer.

use crate::design::designer::RoomDesigner;
use crate::design::estimate::{CostEstimate, CostEstimateRequest};
use crate::design::types::{GeneratedImage, GenerationMetadata, ImageFormat, RedesignRequest};
use crate::error::{parse_retry_after, sanitize_error_message, MonospaceError, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Public Gemini REST endpoint.
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini image model variants used for redesigns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GeminiImageModel {
    /// Nano Banana - Gemini 2.5 Flash Image (fast, economical).
    #[default]
    NanoBanana,
    /// Nano Banana Pro - Gemini 3 Pro Image (highest quality).
    NanoBananaPro,
}

impl GeminiImageModel {
    /// Returns the API model identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NanoBanana => "gemini-2.5-flash-image",
            Self::NanoBananaPro => "nano-banana-pro-preview",
        }
    }
}

/// Gemini text model variants used for cost estimates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GeminiTextModel {
    /// Gemini 2.5 Flash.
    #[default]
    Flash,
    /// Gemini 2.5 Pro.
    Pro,
}

impl GeminiTextModel {
    /// Returns the API model identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flash => "gemini-2.5-flash",
            Self::Pro => "gemini-2.5-pro",
        }
    }
}

/// Builder for GeminiProvider.
#[derive(Debug, Clone, Default)]
pub struct GeminiProviderBuilder {
    api_key: Option<String>,
    model: GeminiImageModel,
    text_model: GeminiTextModel,
    base_url: Option<String>,
}

impl GeminiProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `GOOGLE_API_KEY` env var.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the image model used for redesigns.
    pub fn image_model(mut self, model: GeminiImageModel) -> Self {
        self.model = model;
        self
    }

    /// Sets the text model used for cost estimates.
    pub fn text_model(mut self, model: GeminiTextModel) -> Self {
        self.text_model = model;
        self
    }

    /// Overrides the API root (proxies, tests).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Builds the provider, resolving the API key.
    pub fn build(self) -> Result<GeminiProvider> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var("GOOGLE_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                MonospaceError::Auth("GOOGLE_API_KEY not set and no API key provided".into())
            })?;

        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(GeminiProvider {
            client: reqwest::Client::new(),
            api_key,
            model: self.model,
            text_model: self.text_model,
            base_url,
        })
    }
}

/// Gemini-backed room designer.
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    model: GeminiImageModel,
    text_model: GeminiTextModel,
    base_url: String,
}

impl GeminiProvider {
    /// Creates a new `GeminiProviderBuilder`.
    pub fn builder() -> GeminiProviderBuilder {
        GeminiProviderBuilder::new()
    }

    /// Sends one `generateContent` call and returns the parts of the first
    /// candidate, after turning safety blocks into errors.
    async fn generate_content(
        &self,
        model: &str,
        body: &GeminiRequest,
    ) -> Result<Vec<GeminiPartResponse>> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(self.parse_error(status.as_u16(), &text, &headers));
        }

        let gemini_response: GeminiResponse = response.json().await?;

        // Blocked prompts come back as HTTP 200 with prompt feedback
        if let Some(ref feedback) = gemini_response.prompt_feedback {
            if let Some(ref reason) = feedback.block_reason {
                let msg = feedback
                    .block_reason_message
                    .clone()
                    .unwrap_or_else(|| format!("Prompt blocked: {}", reason));
                return Err(MonospaceError::ContentBlocked(msg));
            }
        }

        let candidate = gemini_response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| {
                MonospaceError::UnexpectedResponse("No content received from Gemini.".into())
            })?;

        if let Some(ref finish_reason) = candidate.finish_reason {
            match finish_reason.as_str() {
                "SAFETY"
                | "IMAGE_SAFETY"
                | "IMAGE_PROHIBITED_CONTENT"
                | "IMAGE_RECITATION"
                | "RECITATION"
                | "PROHIBITED_CONTENT"
                | "BLOCKLIST" => {
                    return Err(MonospaceError::ContentBlocked(format!(
                        "Content blocked by Gemini safety filter: {}",
                        finish_reason
                    )));
                }
                "IMAGE_OTHER" | "NO_IMAGE" => {
                    return Err(MonospaceError::UnexpectedResponse(format!(
                        "Generation failed: {}. Try a different photo or prompt.",
                        finish_reason
                    )));
                }
                _ => {} // STOP, MAX_TOKENS, etc. are normal
            }
        }

        candidate
            .content
            .map(|c| c.parts)
            .filter(|parts| !parts.is_empty())
            .ok_or_else(|| {
                MonospaceError::UnexpectedResponse("No content received from Gemini.".into())
            })
    }

    async fn redesign_impl(&self, request: &RedesignRequest) -> Result<GeneratedImage> {
        request.validate()?;
        let start = Instant::now();

        let body = GeminiRequest::redesign(request);
        tracing::debug!(
            model = self.model.as_str(),
            style = request.style.slug(),
            image_bytes = request.image.len(),
            "requesting room redesign"
        );
        let parts = self.generate_content(self.model.as_str(), &body).await?;

        let inline_data = image_from_parts(parts)?;

        let data = base64::engine::general_purpose::STANDARD
            .decode(&inline_data.data)
            .map_err(|e| MonospaceError::Decode(e.to_string()))?;

        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(duration_ms, bytes = data.len(), "room redesign complete");

        let format = ImageFormat::from_mime_type(&inline_data.mime_type)
            .or_else(|| ImageFormat::from_magic_bytes(&data))
            .unwrap_or_default();

        Ok(GeneratedImage::new(
            data,
            format,
            GenerationMetadata {
                model: Some(self.model.as_str().to_string()),
                style: Some(request.style.label().to_string()),
                duration_ms: Some(duration_ms),
            },
        ))
    }

    async fn estimate_impl(&self, request: &CostEstimateRequest) -> Result<CostEstimate> {
        request.validate()?;

        let body = GeminiRequest::cost_estimate(request);
        tracing::debug!(
            model = self.text_model.as_str(),
            location = %request.location,
            currency = %request.currency,
            "requesting cost estimate"
        );
        let parts = self.generate_content(self.text_model.as_str(), &body).await?;

        let text = parts
            .into_iter()
            .find_map(|p| p.text)
            .ok_or_else(|| {
                MonospaceError::UnexpectedResponse("Could not generate cost estimation.".into())
            })?;

        CostEstimate::from_model_text(&text)
    }

    fn parse_error(
        &self,
        status: u16,
        text: &str,
        headers: &reqwest::header::HeaderMap,
    ) -> MonospaceError {
        let text = sanitize_error_message(text);
        if status == 402 {
            return MonospaceError::Billing(
                "Gemini billing issue: enable billing at https://aistudio.google.com".into(),
            );
        }
        if status == 404 {
            return MonospaceError::InvalidRequest(
                "Model not found. Verify the model name is correct.".into(),
            );
        }
        if status == 429 {
            let retry_after = parse_retry_after(headers).map(std::time::Duration::from_secs);
            return MonospaceError::RateLimited { retry_after };
        }
        if status == 401 || status == 403 {
            return MonospaceError::Auth(text);
        }
        let lower = text.to_lowercase();
        if lower.contains("safety")
            || lower.contains("blocked")
            || lower.contains("content_policy")
            || lower.contains("prohibited")
        {
            return MonospaceError::ContentBlocked(text);
        }
        MonospaceError::Api {
            status,
            message: text,
        }
    }
}

/// Picks the first image out of a response. A text-only answer means the
/// model ignored the instruction to draw.
fn image_from_parts(parts: Vec<GeminiPartResponse>) -> Result<InlineData> {
    let mut saw_text = false;
    for part in parts {
        if let Some(inline) = part.inline_data.filter(|d| !d.data.is_empty()) {
            return Ok(inline);
        }
        saw_text |= part.text.is_some();
    }
    if saw_text {
        Err(MonospaceError::UnexpectedResponse(
            "Model returned text instead of image. Please try again or simplify the prompt."
                .into(),
        ))
    } else {
        Err(MonospaceError::UnexpectedResponse(
            "No image data found in response.".into(),
        ))
    }
}

#[async_trait]
impl RoomDesigner for GeminiProvider {
    async fn redesign(&self, request: &RedesignRequest) -> Result<GeneratedImage> {
        self.redesign_impl(request).await
    }

    async fn estimate_cost(&self, request: &CostEstimateRequest) -> Result<CostEstimate> {
        self.estimate_impl(request).await
    }

    fn name(&self) -> &str {
        "Gemini (Google)"
    }

    async fn health_check(&self) -> Result<()> {
        let url = format!("{}/models/{}", self.base_url, self.model.as_str());

        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;

        match response.status().as_u16() {
            401 | 403 => Err(MonospaceError::Auth("Invalid API key".into())),
            404 => Err(MonospaceError::InvalidRequest(
                "Model not found. Verify the model name is correct.".into(),
            )),
            s if !(200..300).contains(&s) => Err(MonospaceError::Api {
                status: s,
                message: "Health check failed".into(),
            }),
            _ => Ok(()),
        }
    }
}

// Request/Response types
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiRequestPart>,
}

/// A part in a Gemini request - can be text or inline image data.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiRequestPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
}

impl GeminiRequestPart {
    fn image(mime_type: &str, data: &[u8]) -> Self {
        Self::InlineData {
            inline_data: GeminiInlineData {
                mime_type: mime_type.to_string(),
                data: base64::engine::general_purpose::STANDARD.encode(data),
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

impl GeminiRequest {
    /// Photo first, then the instruction; image output only.
    fn redesign(req: &RedesignRequest) -> Self {
        let parts = vec![
            GeminiRequestPart::image(req.image_mime_type(), &req.image),
            GeminiRequestPart::Text { text: req.prompt() },
        ];

        Self {
            contents: vec![GeminiContent { parts }],
            generation_config: GeminiConfig {
                response_modalities: Some(vec!["IMAGE".to_string()]),
                response_mime_type: None,
            },
        }
    }

    /// Instruction first, then the image; JSON output.
    fn cost_estimate(req: &CostEstimateRequest) -> Self {
        let mime_type = ImageFormat::from_magic_bytes(&req.image)
            .unwrap_or_default()
            .mime_type();
        let parts = vec![
            GeminiRequestPart::Text { text: req.prompt() },
            GeminiRequestPart::image(mime_type, &req.image),
        ];

        Self {
            contents: vec![GeminiContent { parts }],
            generation_config: GeminiConfig {
                response_modalities: None,
                response_mime_type: Some("application/json".to_string()),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContentResponse>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
    #[serde(default)]
    block_reason_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPartResponse {
    #[serde(default)]
    inline_data: Option<InlineData>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: String,
    data: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::estimate::Currency;
    use crate::design::types::RoomStyle;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const JPEG: [u8; 12] = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0, 0, 0, 0, 0];

    fn provider_for(server: &MockServer) -> GeminiProvider {
        GeminiProvider::builder()
            .api_key("test-key")
            .base_url(server.uri())
            .build()
            .unwrap()
    }

    fn image_response(bytes: &[u8]) -> serde_json::Value {
        json!({
            "candidates": [{
                "content": {
                    "parts": [{
                        "inlineData": {
                            "mimeType": "image/png",
                            "data": base64::engine::general_purpose::STANDARD.encode(bytes)
                        }
                    }]
                },
                "finishReason": "STOP"
            }]
        })
    }

    #[test]
    fn test_gemini_model_as_str() {
        assert_eq!(GeminiImageModel::NanoBanana.as_str(), "gemini-2.5-flash-image");
        assert_eq!(
            GeminiImageModel::NanoBananaPro.as_str(),
            "nano-banana-pro-preview"
        );
        assert_eq!(GeminiTextModel::default().as_str(), "gemini-2.5-flash");
    }

    #[test]
    fn test_gemini_model_default() {
        assert_eq!(GeminiImageModel::default(), GeminiImageModel::NanoBanana);
    }

    #[test]
    fn test_builder_with_explicit_key() {
        let provider = GeminiProviderBuilder::new()
            .api_key("test-key")
            .image_model(GeminiImageModel::NanoBananaPro)
            .base_url("http://localhost:1234/")
            .build()
            .unwrap();
        assert_eq!(provider.base_url, "http://localhost:1234");
        assert_eq!(provider.model, GeminiImageModel::NanoBananaPro);
    }

    #[test]
    fn test_redesign_request_layout() {
        let req = RedesignRequest::new(JPEG.to_vec(), RoomStyle::Bohemian).with_prompt("more plants");
        let json = serde_json::to_value(GeminiRequest::redesign(&req)).unwrap();

        let parts = json["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/jpeg");
        assert!(parts[1]["text"].as_str().unwrap().contains("Bohemian"));
        assert_eq!(json["generationConfig"]["responseModalities"], json!(["IMAGE"]));
        assert!(json["generationConfig"].get("responseMimeType").is_none());
        assert!(json.get("generation_config").is_none());
    }

    #[test]
    fn test_cost_estimate_request_layout() {
        let req = CostEstimateRequest::new(JPEG.to_vec(), "Tokyo").with_currency(Currency::Jpy);
        let json = serde_json::to_value(GeminiRequest::cost_estimate(&req)).unwrap();

        let parts = json["contents"][0]["parts"].as_array().unwrap();
        assert!(parts[0]["text"].as_str().unwrap().contains("Currency: JPY"));
        assert!(parts[1]["inlineData"]["data"].is_string());
        assert_eq!(
            json["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert!(json["generationConfig"].get("responseModalities").is_none());
    }

    #[test]
    fn test_response_with_prompt_feedback_block() {
        let json = r#"{
            "candidates": [],
            "promptFeedback": {
                "blockReason": "SAFETY",
                "blockReasonMessage": "Prompt was blocked due to safety"
            }
        }"#;
        let resp: GeminiResponse = serde_json::from_str(json).unwrap();
        assert!(resp.candidates.is_empty());
        let feedback = resp.prompt_feedback.unwrap();
        assert_eq!(feedback.block_reason.as_deref(), Some("SAFETY"));
    }

    #[test]
    fn test_image_from_parts_text_only() {
        let parts: Vec<GeminiPartResponse> =
            serde_json::from_str(r#"[{"text": "Here is a lovely room description."}]"#).unwrap();
        let err = image_from_parts(parts).unwrap_err();
        assert!(err.to_string().contains("text instead of image"));

        let parts: Vec<GeminiPartResponse> = serde_json::from_str(r#"[{}]"#).unwrap();
        let err = image_from_parts(parts).unwrap_err();
        assert!(err.to_string().contains("No image data"));
    }

    #[test]
    fn test_image_from_parts_skips_leading_text() {
        let parts: Vec<GeminiPartResponse> = serde_json::from_str(
            r#"[{"text": "Sure!"}, {"inlineData": {"mimeType": "image/png", "data": "aGVsbG8="}}]"#,
        )
        .unwrap();
        let inline = image_from_parts(parts).unwrap();
        assert_eq!(inline.data, "aGVsbG8=");
    }

    #[tokio::test]
    async fn test_redesign_roundtrip() {
        let server = MockServer::start().await;
        let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 1, 2, 3, 4];
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.5-flash-image:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(image_response(&png)))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let request = RedesignRequest::new(JPEG.to_vec(), RoomStyle::Luxury);
        let image = provider.redesign(&request).await.unwrap();

        assert_eq!(image.data, png);
        assert_eq!(image.format, ImageFormat::Png);
        assert_eq!(image.metadata.style.as_deref(), Some("Luxury"));
        assert_eq!(image.metadata.model.as_deref(), Some("gemini-2.5-flash-image"));
    }

    #[tokio::test]
    async fn test_redesign_safety_finish_reason() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "finishReason": "IMAGE_SAFETY" }]
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let request = RedesignRequest::new(JPEG.to_vec(), RoomStyle::Dark);
        let err = provider.redesign(&request).await.unwrap_err();
        assert!(matches!(err, MonospaceError::ContentBlocked(_)));
    }

    #[tokio::test]
    async fn test_http_errors_are_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("retry-after", "12")
                    .set_body_string("quota"),
            )
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let request = RedesignRequest::new(JPEG.to_vec(), RoomStyle::Dark);
        let err = provider.redesign(&request).await.unwrap_err();
        assert!(matches!(
            &err,
            MonospaceError::RateLimited { retry_after: Some(d) } if d.as_secs() == 12
        ));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let request = CostEstimateRequest::new(JPEG.to_vec(), "Lisbon");
        let err = provider.estimate_cost(&request).await.unwrap_err();
        assert!(matches!(err, MonospaceError::Auth(msg) if msg == "API key not valid"));
    }

    #[tokio::test]
    async fn test_estimate_roundtrip() {
        let server = MockServer::start().await;
        let estimate_json = r#"```json
{"luxury":{"tierName":"High Quality / Luxury","description":"Marble.","items":[{"item":"Sofa","cost":"3000"}],"total":"3000"},
 "affordable":{"tierName":"Low Cost / Affordable","description":"Pine.","items":[{"item":"Sofa","cost":"400"}],"total":"400"}}
```"#;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": { "parts": [{ "text": estimate_json }] },
                    "finishReason": "STOP"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let request = CostEstimateRequest::new(JPEG.to_vec(), "Lisbon").with_currency(Currency::Eur);
        let estimate = provider.estimate_cost(&request).await.unwrap();

        assert_eq!(estimate.luxury.total_amount(), Some(3000.0));
        assert_eq!(estimate.affordable.description, "Pine.");
    }

    #[tokio::test]
    async fn test_estimate_requires_location() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let request = CostEstimateRequest::new(JPEG.to_vec(), "");
        let err = provider.estimate_cost(&request).await.unwrap_err();
        assert!(matches!(err, MonospaceError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models/gemini-2.5-flash-image"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "models/gemini-2.5-flash-image"})))
            .mount(&server)
            .await;

        assert!(provider_for(&server).health_check().await.is_ok());
    }
}
