// src/generation.rs - External generation collaborator boundary

//! Boundary to the external generative service that supplies product
//! images, market analysis text, and campaign price suggestions. Calls are
//! opaque, latent, and fallible; a failure surfaces as a generation error
//! and leaves every store untouched. Nothing here retries, and responses
//! that do not parse as the expected shape are failures, not partial
//! results.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::{OfferSuggestion, Product, ProductCategory};
use crate::config::GenerationConfig;
use crate::error::{Error, GenerationOperation, Result};
use crate::event::{Event, EventBusManager, EventPriority};
use crate::manager::{ManagedState, Manager, ManagerState, ManagerStatus};
use crate::types::Metadata;

/// Output resolution tiers offered by the image model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageResolution {
    #[serde(rename = "1K")]
    OneK,
    #[serde(rename = "2K")]
    TwoK,
    #[serde(rename = "4K")]
    FourK,
}

impl ImageResolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneK => "1K",
            Self::TwoK => "2K",
            Self::FourK => "4K",
        }
    }
}

impl Default for ImageResolution {
    fn default() -> Self {
        Self::OneK
    }
}

impl fmt::Display for ImageResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Contract with the external generation service
#[async_trait]
pub trait GenerationProvider: Send + Sync + fmt::Debug {
    /// Generates a product image, returned as a data URI
    async fn generate_image(&self, prompt: &str, resolution: ImageResolution) -> Result<String>;

    /// Generates free-text market analysis for the given categories
    async fn generate_market_analysis(&self, categories: &[ProductCategory]) -> Result<String>;

    /// Generates campaign price suggestions over a catalog snapshot
    async fn generate_campaign_offers(
        &self,
        catalog: &[Product],
        theme: &str,
    ) -> Result<Vec<OfferSuggestion>>;
}

// Wire shapes for the generateContent endpoint

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<RequestContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<RequestGenerationConfig>,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
struct RequestPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestGenerationConfig {
    image_config: ImageRequestConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageRequestConfig {
    aspect_ratio: String,
    image_size: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

#[derive(Debug, Deserialize)]
struct ResponseCandidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct SnapshotEntry<'a> {
    id: &'a str,
    name: &'a str,
    price: f64,
    category: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sales: Option<u32>,
}

impl GenerateContentResponse {
    fn first_text(&self) -> Option<&str> {
        self.candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|content| content.parts.iter())
            .find_map(|part| part.text.as_deref())
    }

    fn first_inline_image(&self) -> Option<&InlineData> {
        self.candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|content| content.parts.iter())
            .find_map(|part| part.inline_data.as_ref())
    }
}

/// Strips a Markdown code fence when the model wraps its JSON reply in one
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Parses a campaign-offer reply; anything that is not a suggestion list is
/// a failure
fn parse_offer_batch(text: &str) -> Result<Vec<OfferSuggestion>> {
    serde_json::from_str(strip_code_fences(text)).map_err(|e| {
        Error::generation(
            GenerationOperation::CampaignOffers,
            "Response is not a price-suggestion list",
        )
        .caused_by(e)
    })
}

/// HTTP client for a Gemini-style generateContent API
pub struct HttpGenerationProvider {
    client: reqwest::Client,
    config: GenerationConfig,
    api_key: String,
}

impl fmt::Debug for HttpGenerationProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpGenerationProvider")
            .field("endpoint", &self.config.endpoint)
            .field("image_model", &self.config.image_model)
            .field("text_model", &self.config.text_model)
            .finish()
    }
}

impl HttpGenerationProvider {
    /// Builds the client, reading the API key from the environment variable
    /// named in configuration. The key never appears in config files.
    pub fn from_config(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            Error::config_key(
                "generation.api_key_env",
                format!(
                    "Environment variable '{}' holding the generation API key is not set",
                    config.api_key_env
                ),
            )
        })?;

        Ok(Self {
            client: reqwest::Client::new(),
            config: config.clone(),
            api_key,
        })
    }

    fn url(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            model
        )
    }

    fn text_request(prompt: String) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: None,
        }
    }

    async fn invoke(
        &self,
        operation: GenerationOperation,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        let url = self.url(model);

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(request)
            .send()
            .await
            .map_err(|e| {
                Error::generation(operation, "Generation service unreachable")
                    .metadata("endpoint", serde_json::Value::String(url.clone()))
                    .caused_by(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::generation(
                operation,
                format!("Generation service returned {}", status),
            )
            .metadata("endpoint", serde_json::Value::String(url)));
        }

        response.json::<GenerateContentResponse>().await.map_err(|e| {
            Error::generation(operation, "Malformed generation response").caused_by(e)
        })
    }
}

#[async_trait]
impl GenerationProvider for HttpGenerationProvider {
    async fn generate_image(&self, prompt: &str, resolution: ImageResolution) -> Result<String> {
        let framed = format!(
            "A professional, high-quality product photography shot of a sneaker. {}. \
             Clean white background, studio lighting.",
            prompt
        );
        let request = GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: framed }],
            }],
            generation_config: Some(RequestGenerationConfig {
                image_config: ImageRequestConfig {
                    aspect_ratio: self.config.image_aspect_ratio.clone(),
                    image_size: resolution.as_str().to_string(),
                },
            }),
        };

        let response = self
            .invoke(GenerationOperation::Image, &self.config.image_model, &request)
            .await?;

        let image = response.first_inline_image().ok_or_else(|| {
            Error::generation(
                GenerationOperation::Image,
                "No image payload found in response",
            )
        })?;
        Ok(format!("data:{};base64,{}", image.mime_type, image.data))
    }

    async fn generate_market_analysis(&self, categories: &[ProductCategory]) -> Result<String> {
        let listed = categories
            .iter()
            .map(ProductCategory::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        let prompt = format!(
            "You are a footwear retail analyst. Write a concise market analysis for an \
             online sneaker store covering these categories: {}. Cover demand trends, \
             pricing pressure, and one actionable recommendation per category.",
            listed
        );

        let request = Self::text_request(prompt);
        let response = self
            .invoke(
                GenerationOperation::MarketAnalysis,
                &self.config.text_model,
                &request,
            )
            .await?;

        response
            .first_text()
            .map(str::to_string)
            .ok_or_else(|| {
                Error::generation(
                    GenerationOperation::MarketAnalysis,
                    "No text payload found in response",
                )
            })
    }

    async fn generate_campaign_offers(
        &self,
        catalog: &[Product],
        theme: &str,
    ) -> Result<Vec<OfferSuggestion>> {
        let snapshot: Vec<SnapshotEntry<'_>> = catalog
            .iter()
            .map(|p| SnapshotEntry {
                id: &p.id,
                name: &p.name,
                price: p.price,
                category: p.category.as_str(),
                sales: p.sales,
            })
            .collect();
        let snapshot_json = serde_json::to_string(&snapshot)?;

        let prompt = format!(
            "You are pricing a '{}' campaign for an online sneaker store. Given this \
             catalog snapshot as JSON: {} \
             Propose discounted prices for the products that should join the campaign. \
             Reply with ONLY a JSON array of objects shaped as \
             {{\"productId\": string, \"suggestedPrice\": number, \"reasoning\": string}}.",
            theme, snapshot_json
        );

        let request = Self::text_request(prompt);
        let response = self
            .invoke(
                GenerationOperation::CampaignOffers,
                &self.config.text_model,
                &request,
            )
            .await?;

        let text = response.first_text().ok_or_else(|| {
            Error::generation(
                GenerationOperation::CampaignOffers,
                "No text payload found in response",
            )
        })?;
        parse_offer_batch(text)
    }
}

/// Event published after each generation call completes or fails
#[derive(Debug, Clone)]
pub struct GenerationEvent {
    success: bool,
    source: String,
    metadata: Metadata,
    timestamp: DateTime<Utc>,
}

impl GenerationEvent {
    fn new(operation: GenerationOperation, success: bool) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert(
            "operation".to_string(),
            serde_json::Value::String(operation.to_string()),
        );
        metadata.insert("success".to_string(), serde_json::Value::from(success));

        Self {
            success,
            source: "generation_manager".to_string(),
            metadata,
            timestamp: Utc::now(),
        }
    }
}

impl Event for GenerationEvent {
    fn event_type(&self) -> &'static str {
        if self.success {
            "generation.completed"
        } else {
            "generation.failed"
        }
    }

    fn source(&self) -> &str {
        &self.source
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn priority(&self) -> EventPriority {
        EventPriority::Low
    }
}

/// Wraps the configured provider and reports call outcomes on the event bus
pub struct GenerationManager {
    state: ManagedState,
    provider: Box<dyn GenerationProvider>,
    event_bus: Option<Arc<EventBusManager>>,
}

impl fmt::Debug for GenerationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationManager")
            .field("provider", &self.provider)
            .finish()
    }
}

impl GenerationManager {
    pub fn new(provider: Box<dyn GenerationProvider>) -> Self {
        Self {
            state: ManagedState::new(Uuid::new_v4(), "generation_manager"),
            provider,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBusManager>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    async fn report(&self, operation: GenerationOperation, success: bool) {
        if let Some(event_bus) = &self.event_bus {
            if let Err(e) = event_bus.publish(GenerationEvent::new(operation, success)).await {
                tracing::warn!("Failed to publish generation event: {}", e);
            }
        }
    }

    pub async fn generate_image(
        &self,
        prompt: &str,
        resolution: ImageResolution,
    ) -> Result<String> {
        let result = self.provider.generate_image(prompt, resolution).await;
        self.report(GenerationOperation::Image, result.is_ok()).await;
        result
    }

    pub async fn generate_market_analysis(
        &self,
        categories: &[ProductCategory],
    ) -> Result<String> {
        let result = self.provider.generate_market_analysis(categories).await;
        self.report(GenerationOperation::MarketAnalysis, result.is_ok())
            .await;
        result
    }

    pub async fn generate_campaign_offers(
        &self,
        catalog: &[Product],
        theme: &str,
    ) -> Result<Vec<OfferSuggestion>> {
        let result = self.provider.generate_campaign_offers(catalog, theme).await;
        self.report(GenerationOperation::CampaignOffers, result.is_ok())
            .await;
        result
    }
}

#[async_trait]
impl Manager for GenerationManager {
    fn name(&self) -> &str {
        "generation_manager"
    }

    fn id(&self) -> Uuid {
        self.state.id()
    }

    async fn initialize(&mut self) -> Result<()> {
        self.state.set_state(ManagerState::Initializing).await;
        self.state
            .add_metadata(
                "provider",
                serde_json::Value::String(format!("{:?}", self.provider)),
            )
            .await;
        self.state.set_state(ManagerState::Running).await;
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.state.set_state(ManagerState::ShuttingDown).await;
        self.state.set_state(ManagerState::Shutdown).await;
        Ok(())
    }

    async fn status(&self) -> ManagerStatus {
        self.state.status().await
    }

    fn description(&self) -> Option<String> {
        Some("Boundary to the external generative service".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::demo_catalog;
    use crate::event::EventFilter;
    use futures::StreamExt;

    #[derive(Debug)]
    struct ScriptedProvider {
        image: Result<String>,
        offers: Result<Vec<OfferSuggestion>>,
    }

    #[async_trait]
    impl GenerationProvider for ScriptedProvider {
        async fn generate_image(
            &self,
            _prompt: &str,
            _resolution: ImageResolution,
        ) -> Result<String> {
            self.image.clone()
        }

        async fn generate_market_analysis(
            &self,
            _categories: &[ProductCategory],
        ) -> Result<String> {
            Ok("Demand for running shoes keeps climbing.".to_string())
        }

        async fn generate_campaign_offers(
            &self,
            _catalog: &[Product],
            _theme: &str,
        ) -> Result<Vec<OfferSuggestion>> {
            self.offers.clone()
        }
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("[1, 2]"), "[1, 2]");
        assert_eq!(strip_code_fences("```json\n[1, 2]\n```"), "[1, 2]");
        assert_eq!(strip_code_fences("```\n[1, 2]\n```"), "[1, 2]");
        assert_eq!(strip_code_fences("  [1, 2]  "), "[1, 2]");
    }

    #[test]
    fn test_parse_offer_batch() {
        let text = r#"```json
        [{"productId": "1", "suggestedPrice": 100.0, "reasoning": "sale"}]
        ```"#;
        let offers = parse_offer_batch(text).unwrap();
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].product_id, "1");

        // Malformed replies are failures, not partial results
        let err = parse_offer_batch("sorry, I cannot help with that").unwrap_err();
        assert!(err.is_generation());
    }

    #[test]
    fn test_response_payload_extraction() {
        let raw = serde_json::json!({
            "candidates": [{
                "content": {
                    "parts": [
                        {"text": "analysis text"},
                        {"inlineData": {"mimeType": "image/png", "data": "QUJD"}}
                    ]
                }
            }]
        });
        let response: GenerateContentResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(response.first_text(), Some("analysis text"));
        assert_eq!(
            response.first_inline_image().map(|i| i.mime_type.as_str()),
            Some("image/png")
        );

        let empty: GenerateContentResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(empty.first_text().is_none());
        assert!(empty.first_inline_image().is_none());
    }

    #[test]
    fn test_resolution_serde_shape() {
        assert_eq!(serde_json::to_value(ImageResolution::OneK).unwrap(), "1K");
        assert_eq!(serde_json::to_value(ImageResolution::FourK).unwrap(), "4K");
    }

    #[tokio::test]
    async fn test_manager_reports_success_and_failure() {
        let event_bus = Arc::new(EventBusManager::new());
        let manager = GenerationManager::new(Box::new(ScriptedProvider {
            image: Ok("data:image/png;base64,QUJD".to_string()),
            offers: Err(Error::generation(
                GenerationOperation::CampaignOffers,
                "Response is not a price-suggestion list",
            )),
        }))
        .with_event_bus(Arc::clone(&event_bus));

        let (_id, mut rx) = event_bus.subscribe("test", EventFilter::new());

        let image = manager
            .generate_image("Neon green colorway", ImageResolution::TwoK)
            .await
            .unwrap();
        assert!(image.starts_with("data:image/png;base64,"));

        let err = manager
            .generate_campaign_offers(&demo_catalog(), "Back to school")
            .await
            .unwrap_err();
        assert!(err.is_generation());

        let first = rx.next().await.unwrap();
        assert_eq!(first.event_type(), "generation.completed");
        let second = rx.next().await.unwrap();
        assert_eq!(second.event_type(), "generation.failed");
    }
}
