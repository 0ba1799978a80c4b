//! Client for the hosted Gemini endpoints. Calls run as spawned tasks on the
//! shared runtime; outcomes come back to the UI thread as `AppEvent`s.

use std::sync::mpsc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;

use crate::config::{
    CHAT_MODEL_ENDPOINT, IMAGE_MODEL_ENDPOINT, PREVIEW_WIDTH, SPOT_EDIT_WIDTH,
    TEXT_MODEL_ENDPOINT,
};
use crate::error::ApiError;
use crate::event::{ApiStatus, AppEvent};
use crate::imaging;
use crate::studio::SpotPoint;

pub mod wire;

use wire::{GenerateContentRequest, GenerationConfig, Part};

/// How many times a rate-limited chat request is retried before giving up.
const CHAT_RETRIES: u32 = 2;
/// Replies longer than this past the `Prompt:` marker get truncated.
const PROMPT_SECTION_LIMIT: usize = 450;
const PROMPT_SECTION_TRUNCATE_AT: usize = 430;

const CHAT_SYSTEM_PROMPT: &str = "You are an interior designer. Give a brief 2-line answer \
to the user's question. Then add \"\n\nPrompt: \" followed by a complete, detailed room \
modification description under 450 characters that can be used directly for AI image \
generation. Include specific colors, materials, furniture styles, lighting, and spatial \
arrangements. Be comprehensive but concise.";

/// Structured result of a mood analysis, sectioned out of the raw reply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MoodReport {
    pub current_mood: String,
    pub suggestions: String,
    pub color_palette: String,
    pub lighting: String,
    pub furniture: String,
    pub full_analysis: String,
}

#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: Option<String>,
    tx: mpsc::Sender<AppEvent>,
    runtime_handle: Handle,
}

impl GeminiClient {
    pub fn new(runtime_handle: Handle, tx: mpsc::Sender<AppEvent>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: crate::config::api_key_from_env(),
            tx,
            runtime_handle,
        }
    }

    /// Reports initial API status. There is no connection to establish; the
    /// only startup failure mode is a missing key.
    pub fn start(&self) {
        let status = if self.api_key.is_some() {
            ApiStatus::Ready
        } else {
            ApiStatus::Unconfigured
        };
        let _ = self.tx.send(AppEvent::StatusChanged(status));
    }

    fn key(&self) -> Result<String, ApiError> {
        self.api_key.clone().ok_or(ApiError::MissingApiKey)
    }

    /// A denied key means every further request will fail the same way;
    /// reflect that in the status chip.
    fn note_failure(&self, err: &ApiError) {
        if matches!(err, ApiError::AccessDenied) {
            let _ = self.tx.send(AppEvent::StatusChanged(ApiStatus::Erroring));
        }
    }

    /// Full-image design generation: enhance the prompt with the text model
    /// (falling back to the raw prompt), then regenerate the room with the
    /// image model under a layout-preserving instruction.
    pub fn generate_design(&self, image_base64: String, prompt: String) {
        let this = self.clone();
        self.runtime_handle.spawn(async move {
            let key = match this.key() {
                Ok(key) => key,
                Err(err) => {
                    let _ = this.tx.send(AppEvent::DesignFailed(err.to_string()));
                    return;
                }
            };

            this.progress("Analyzing your room with AI...");
            let enhanced = match this
                .enhance_prompt(&key, &prompt, &image_base64)
                .await
            {
                Ok(text) => text,
                Err(err) => {
                    log::warn!("prompt enhancement failed, using original: {err}");
                    prompt.clone()
                }
            };

            this.progress("Generating your room design...");
            match this.render_design(&key, &enhanced, &image_base64).await {
                Ok(data_url) => {
                    this.progress("Design complete!");
                    let _ = this.tx.send(AppEvent::DesignReady { data_url, prompt });
                }
                Err(err) => {
                    log::error!("design generation failed: {err}");
                    this.note_failure(&err);
                    let _ = this.tx.send(AppEvent::DesignFailed(err.to_string()));
                }
            }
        });
    }

    async fn enhance_prompt(
        &self,
        key: &str,
        prompt: &str,
        image_base64: &str,
    ) -> Result<String, ApiError> {
        let instruction = format!(
            "Analyze this room image and enhance this interior design request: \"{prompt}\". \
             Create a detailed, professional interior design prompt that includes specific \
             details about colors, materials, lighting, furniture styles, and spatial \
             arrangements. Make it suitable for AI image generation. Keep it under 200 words \
             but very descriptive."
        );
        let request = GenerateContentRequest::new(
            vec![Part::jpeg(image_base64), Part::text(instruction)],
            GenerationConfig {
                temperature: 0.8,
                top_k: 40,
                top_p: 0.95,
                max_output_tokens: Some(300),
            },
        );
        let response = self.post(TEXT_MODEL_ENDPOINT, key, &request).await?;
        Ok(response
            .first_text()
            .unwrap_or(prompt)
            .to_string())
    }

    async fn render_design(
        &self,
        key: &str,
        enhanced_prompt: &str,
        image_base64: &str,
    ) -> Result<String, ApiError> {
        let instruction = format!(
            "Looking at this room image, please generate a modified version where: \
             {enhanced_prompt}. IMPORTANT: Keep the exact same room layout, walls, windows, \
             and overall architecture. Only modify the specific elements mentioned in the \
             request. Maintain the same perspective, lighting, and room structure. The result \
             should look like the same room with only the requested changes applied."
        );
        let request = GenerateContentRequest::new(
            vec![Part::jpeg(image_base64), Part::text(instruction)],
            GenerationConfig {
                temperature: 0.4,
                top_k: 32,
                top_p: 0.8,
                max_output_tokens: Some(8192),
            },
        );
        let response = self.post(IMAGE_MODEL_ENDPOINT, key, &request).await?;
        response
            .first_inline_image()
            .map(|data| format!("data:image/png;base64,{data}"))
            .ok_or_else(|| ApiError::EmptyResponse("No image generated".to_string()))
    }

    /// Designer-persona chat. The room image, when present, is recompressed
    /// small before attaching. Rate-limited requests get a fixed exponential
    /// backoff; transport hiccups a single short retry.
    pub fn chat(&self, message: String, room_image: Option<String>) {
        let this = self.clone();
        self.runtime_handle.spawn(async move {
            let result = this.chat_inner(&message, room_image.as_deref()).await;
            let _ = match result {
                Ok(reply) => this.tx.send(AppEvent::ChatReply(reply)),
                Err(err) => {
                    log::error!("chat request failed: {err}");
                    this.note_failure(&err);
                    this.tx.send(AppEvent::ChatFailed(err.to_string()))
                }
            };
        });
    }

    async fn chat_inner(
        &self,
        message: &str,
        room_image: Option<&str>,
    ) -> Result<String, ApiError> {
        let key = self.key()?;
        let mut parts = vec![Part::text(format!(
            "{CHAT_SYSTEM_PROMPT}\n\nUser: {message}"
        ))];
        if let Some(image) = room_image {
            match imaging::compress_payload(image, PREVIEW_WIDTH, 20) {
                Ok(payload) => parts.push(Part::jpeg(payload)),
                Err(err) => log::warn!("chat image attach skipped: {err}"),
            }
        }
        let request = GenerateContentRequest::new(
            parts,
            GenerationConfig {
                temperature: 0.7,
                top_k: 20,
                top_p: 0.8,
                max_output_tokens: Some(400),
            },
        );
        let response = self
            .post_with_retry(CHAT_MODEL_ENDPOINT, &key, &request, CHAT_RETRIES)
            .await?;
        let reply = response
            .first_text()
            .ok_or_else(|| ApiError::EmptyResponse("No response from AI chat".to_string()))?;
        Ok(clamp_prompt_section(reply))
    }

    /// Mood critique of the current room against a desired ambiance.
    pub fn analyze_mood(&self, image: String, desired_mood: String) {
        let this = self.clone();
        self.runtime_handle.spawn(async move {
            let result = this.analyze_mood_inner(&image, &desired_mood).await;
            let _ = match result {
                Ok(report) => this.tx.send(AppEvent::MoodReady(report)),
                Err(err) => {
                    log::error!("mood analysis failed: {err}");
                    this.note_failure(&err);
                    this.tx.send(AppEvent::MoodFailed(err.to_string()))
                }
            };
        });
    }

    async fn analyze_mood_inner(
        &self,
        image: &str,
        desired_mood: &str,
    ) -> Result<MoodReport, ApiError> {
        let key = self.key()?;
        let payload = imaging::compress_payload(image, PREVIEW_WIDTH, 20)
            .map_err(|err| ApiError::EmptyResponse(err.to_string()))?;
        let instruction = format!(
            "Analyze this room and suggest specific interior design changes to create a \
             \"{desired_mood}\" ambiance. Consider:\n\
             1. Current mood/atmosphere of the room\n\
             2. Color palette changes needed\n\
             3. Lighting adjustments\n\
             4. Furniture modifications\n\
             5. Decor additions/removals\n\
             6. Texture and material suggestions\n\n\
             Provide actionable, specific recommendations in a structured format."
        );
        let request = GenerateContentRequest::new(
            vec![Part::jpeg(payload), Part::text(instruction)],
            GenerationConfig {
                temperature: 0.7,
                top_k: 40,
                top_p: 0.9,
                max_output_tokens: Some(1500),
            },
        );
        let response = self.post(TEXT_MODEL_ENDPOINT, &key, &request).await?;
        let analysis = response.first_text().ok_or_else(|| {
            ApiError::EmptyResponse("No mood analysis generated".to_string())
        })?;
        Ok(build_mood_report(analysis))
    }

    /// Localized edit anchored at `spot`, expressed to the model as
    /// percentage coordinates inside the prompt.
    pub fn spot_edit(&self, image: String, spot: SpotPoint, prompt: String) {
        let this = self.clone();
        self.runtime_handle.spawn(async move {
            this.progress(format!(
                "Editing spot at ({:.1}%, {:.1}%)...",
                spot.x, spot.y
            ));
            let result = this.spot_edit_inner(&image, spot, &prompt).await;
            let _ = match result {
                Ok(data_url) => this.tx.send(AppEvent::SpotEditReady {
                    data_url,
                    prompt,
                    spot,
                }),
                Err(err) => {
                    log::error!("spot edit failed: {err}");
                    this.note_failure(&err);
                    this.tx.send(AppEvent::SpotEditFailed(err.to_string()))
                }
            };
        });
    }

    async fn spot_edit_inner(
        &self,
        image: &str,
        spot: SpotPoint,
        prompt: &str,
    ) -> Result<String, ApiError> {
        let key = self.key()?;
        let payload = imaging::compress_payload(image, SPOT_EDIT_WIDTH, 80)
            .map_err(|err| ApiError::EmptyResponse(err.to_string()))?;
        let instruction = format!(
            "Edit this room image by focusing on the area at coordinates ({:.1}%, {:.1}%). \
             Apply this change: \"{prompt}\". Keep the edit natural and maintain the room's \
             style.",
            spot.x, spot.y
        );
        let request = GenerateContentRequest::new(
            vec![Part::text(instruction), Part::jpeg(payload)],
            GenerationConfig {
                temperature: 0.7,
                top_k: 20,
                top_p: 0.8,
                max_output_tokens: None,
            },
        );
        let response = self.post(IMAGE_MODEL_ENDPOINT, &key, &request).await?;
        response
            .first_inline_image()
            .map(|data| format!("data:image/jpeg;base64,{data}"))
            .ok_or_else(|| {
                ApiError::EmptyResponse("No spot edit result generated".to_string())
            })
    }

    fn progress(&self, message: impl Into<String>) {
        let _ = self.tx.send(AppEvent::Progress(message.into()));
    }

    async fn post(
        &self,
        endpoint: &str,
        key: &str,
        request: &GenerateContentRequest,
    ) -> Result<wire::GenerateContentResponse, ApiError> {
        let response = self
            .http
            .post(endpoint)
            .query(&[("key", key)])
            .json(request)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ApiError::from_status(response.status()));
        }
        Ok(response.json().await?)
    }

    async fn post_with_retry(
        &self,
        endpoint: &str,
        key: &str,
        request: &GenerateContentRequest,
        retries: u32,
    ) -> Result<wire::GenerateContentResponse, ApiError> {
        let mut attempt = 0;
        loop {
            match self.post(endpoint, key, request).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_retryable() && attempt < retries => {
                    let delay = match err {
                        ApiError::RateLimited => {
                            Duration::from_secs(2u64.pow(attempt + 1))
                        }
                        _ => Duration::from_secs(1),
                    };
                    log::warn!(
                        "chat request attempt {} failed ({err}), retrying in {:?}",
                        attempt + 1,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Keeps the reply's trailing `Prompt:` section within the length the
/// composer accepts, truncating on a char boundary.
pub fn clamp_prompt_section(reply: &str) -> String {
    let Some((answer, prompt)) = reply.split_once("Prompt:") else {
        return reply.to_string();
    };
    let mut prompt = prompt.trim().to_string();
    if prompt.chars().count() > PROMPT_SECTION_LIMIT {
        prompt = prompt
            .chars()
            .take(PROMPT_SECTION_TRUNCATE_AT)
            .collect::<String>()
            .trim_end()
            .to_string()
            + "...";
    }
    format!("{}\n\nPrompt: {prompt}", answer.trim())
}

/// Pulls the reusable design prompt out of a chat reply, if it carries one.
pub fn extract_prompt_section(reply: &str) -> Option<String> {
    reply
        .split_once("Prompt:")
        .map(|(_, prompt)| prompt.trim().to_string())
        .filter(|p| !p.is_empty())
}

fn build_mood_report(analysis: &str) -> MoodReport {
    MoodReport {
        current_mood: extract_section(analysis, "current"),
        suggestions: extract_section(analysis, "suggestions"),
        color_palette: extract_section(analysis, "color"),
        lighting: extract_section(analysis, "lighting"),
        furniture: extract_section(analysis, "furniture"),
        full_analysis: analysis.to_string(),
    }
}

/// First three lines mentioning the keyword or shaped like bullets.
fn extract_section(text: &str, keyword: &str) -> String {
    text.lines()
        .filter(|line| {
            line.to_lowercase().contains(keyword) || line.contains('•') || line.contains('-')
        })
        .take(3)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_leaves_short_replies_alone() {
        let reply = "Try warmer light.\n\nPrompt: Add brass floor lamps with warm bulbs.";
        assert_eq!(
            clamp_prompt_section(reply),
            "Try warmer light.\n\nPrompt: Add brass floor lamps with warm bulbs."
        );
    }

    #[test]
    fn clamp_truncates_oversized_prompt_sections() {
        let long_prompt = "x".repeat(600);
        let reply = format!("Short answer.\n\nPrompt: {long_prompt}");
        let clamped = clamp_prompt_section(&reply);
        let (_, section) = clamped.split_once("Prompt:").expect("prompt section");
        assert!(section.trim().chars().count() <= PROMPT_SECTION_LIMIT);
        assert!(section.trim_end().ends_with("..."));
    }

    #[test]
    fn clamp_passes_through_replies_without_marker() {
        assert_eq!(clamp_prompt_section("Just advice."), "Just advice.");
    }

    #[test]
    fn extract_prompt_section_finds_reusable_prompt() {
        let reply = "Answer.\n\nPrompt: Sage green walls with rattan accents.";
        assert_eq!(
            extract_prompt_section(reply).as_deref(),
            Some("Sage green walls with rattan accents.")
        );
        assert!(extract_prompt_section("No marker here").is_none());
        assert!(extract_prompt_section("Trailing marker. Prompt:   ").is_none());
    }

    #[test]
    fn mood_report_sections_by_keyword_lines() {
        let analysis = "The current mood is stark.\n\
                        - Swap cool bulbs for warm lighting\n\
                        Color palette: terracotta and cream\n\
                        Furniture: add a low walnut table\n\
                        Unrelated closing line";
        let report = build_mood_report(analysis);
        assert!(report.current_mood.contains("current mood"));
        assert!(report.lighting.contains("warm lighting"));
        assert!(report.color_palette.contains("terracotta"));
        assert!(report.furniture.contains("walnut"));
        assert_eq!(report.full_analysis, analysis);
    }

    #[test]
    fn extract_section_caps_at_three_lines() {
        let text = "- one\n- two\n- three\n- four";
        assert_eq!(extract_section(text, "zzz").lines().count(), 3);
    }
}
