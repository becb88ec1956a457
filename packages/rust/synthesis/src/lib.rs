//! Generative synthesis of enhanced articles.
//!
//! [`LlmClient`] talks to an OpenAI-compatible chat-completions API. It
//! treats the model as an opaque, possibly-unreliable transformer: a
//! generation error or sub-threshold output yields `ok == false` and the
//! caller decides whether to retry with different references or give up.
//! A single synthesis failure is never retried here.

pub mod prompt;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use postforge_shared::{
    ExtractedContent, FORMAT_MIN_CHARS, PostforgeError, REFERENCE_MIN_CHARS, Result,
    SYNTHESIS_MIN_CHARS,
};

/// Timeout for one generation call. Generation is slow; scraping is not.
const GENERATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Token budget for one generation.
const MAX_TOKENS: u32 = 4_000;

/// Temperature for synthesis (creative restructuring).
const SYNTHESIS_TEMPERATURE: f32 = 0.7;

/// Temperature for formatting (consistency over creativity).
const FORMAT_TEMPERATURE: f32 = 0.3;

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Outcome of one synthesis call.
///
/// `ok == false` means the enhanced document is unusable; `updated_content`
/// and `sources` are empty in that case.
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub updated_content: String,
    /// URLs of exactly the qualifying references used, in supplied order.
    pub sources: Vec<String>,
    pub ok: bool,
}

impl Synthesis {
    fn failed() -> Self {
        Self {
            updated_content: String::new(),
            sources: Vec::new(),
            ok: false,
        }
    }
}

/// Outcome of one formatting call.
#[derive(Debug, Clone)]
pub struct Formatted {
    pub content: String,
    pub ok: bool,
}

impl Formatted {
    fn failed() -> Self {
        Self {
            content: String::new(),
            ok: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types (chat-completions API)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

// ---------------------------------------------------------------------------
// LlmClient
// ---------------------------------------------------------------------------

/// Client for an OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct LlmClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl LlmClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(GENERATION_TIMEOUT)
            .build()
            .map_err(|e| PostforgeError::Synthesis(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    /// Model identifier recorded on enriched documents.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Synthesize an enhanced document from the original and its references.
    ///
    /// References with text of [`REFERENCE_MIN_CHARS`] characters or fewer
    /// are dropped; with no qualifying reference the call returns a failed
    /// outcome immediately, without spending a generation call on empty
    /// context.
    #[instrument(skip_all, fields(title = %title, references = references.len()))]
    pub async fn synthesize(
        &self,
        title: &str,
        original: &str,
        references: &[ExtractedContent],
    ) -> Synthesis {
        let qualifying: Vec<&ExtractedContent> = references
            .iter()
            .filter(|r| r.text.chars().count() > REFERENCE_MIN_CHARS)
            .collect();

        if qualifying.is_empty() {
            debug!("no qualifying references, skipping generation");
            return Synthesis::failed();
        }

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: prompt::SYNTHESIS_SYSTEM_PROMPT.into(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt::synthesis_user_prompt(title, original, &qualifying),
                },
            ],
            max_tokens: MAX_TOKENS,
            temperature: SYNTHESIS_TEMPERATURE,
        };

        let content = match self.complete(&request).await {
            Ok(content) => content,
            Err(e) => {
                warn!(error = %e, "generation call failed");
                return Synthesis::failed();
            }
        };

        if content.chars().count() < SYNTHESIS_MIN_CHARS {
            warn!(
                chars = content.chars().count(),
                "generation output below minimum length"
            );
            return Synthesis::failed();
        }

        Synthesis {
            updated_content: ensure_references_section(content, &qualifying),
            sources: qualifying.iter().map(|r| r.url.clone()).collect(),
            ok: true,
        }
    }

    /// Produce a cleaned restatement of the original content. Adds structure,
    /// never facts. Input under [`postforge_shared::REFERENCE_MIN_CHARS`]
    /// characters is rejected without an API call.
    #[instrument(skip_all, fields(title = %title))]
    pub async fn format_original(&self, title: &str, original: &str) -> Formatted {
        if original.chars().count() < REFERENCE_MIN_CHARS {
            debug!("content too short to format");
            return Formatted::failed();
        }

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: prompt::FORMAT_SYSTEM_PROMPT.into(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt::format_user_prompt(title, original),
                },
            ],
            max_tokens: MAX_TOKENS,
            temperature: FORMAT_TEMPERATURE,
        };

        let content = match self.complete(&request).await {
            Ok(content) => content,
            Err(e) => {
                warn!(error = %e, "formatting call failed");
                return Formatted::failed();
            }
        };

        if content.chars().count() < FORMAT_MIN_CHARS {
            return Formatted::failed();
        }

        Formatted { content, ok: true }
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| PostforgeError::Synthesis(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PostforgeError::Synthesis(format!(
                "API returned HTTP {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| PostforgeError::Synthesis(format!("invalid API response: {e}")))?;

        Ok(parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Post-processing
// ---------------------------------------------------------------------------

/// Every enhanced document must end with a references section. When the
/// model omits one (case-insensitive heading check), append it: each
/// qualifying reference as a numbered `[title](url)` line, in supplied order.
fn ensure_references_section(content: String, references: &[&ExtractedContent]) -> String {
    let lower = content.to_lowercase();
    if lower.contains("## references") || lower.contains("### references") {
        return content;
    }

    let mut out = content;
    out.push_str("\n\n## References\n\n");
    for (idx, r) in references.iter().enumerate() {
        out.push_str(&format!("{}. [{}]({})\n", idx + 1, r.title, r.url));
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn reference(url: &str, chars: usize) -> ExtractedContent {
        ExtractedContent {
            url: url.into(),
            title: format!("Ref at {url}"),
            text: "r".repeat(chars),
            ok: true,
        }
    }

    fn chat_body(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })
    }

    fn client(server: &MockServer) -> LlmClient {
        LlmClient::new(server.uri(), "test-key", "gpt-4o-mini-2024-07-18").expect("build client")
    }

    #[test]
    fn references_section_appended_when_missing() {
        let a = reference("https://a.test/1", 200);
        let b = reference("https://b.test/2", 200);
        let out = ensure_references_section("# Enhanced\n\nBody text.".into(), &[&a, &b]);

        let tail = &out[out.find("## References").expect("heading appended")..];
        let pos_a = tail.find("https://a.test/1").expect("first url listed");
        let pos_b = tail.find("https://b.test/2").expect("second url listed");
        assert!(pos_a < pos_b);
        assert!(tail.contains("1. ["));
        assert!(tail.contains("2. ["));
    }

    #[test]
    fn existing_references_section_is_kept() {
        let a = reference("https://a.test/1", 200);
        let content = "# Enhanced\n\nBody.\n\n### REFERENCES\n\n- existing".to_string();
        let out = ensure_references_section(content.clone(), &[&a]);
        assert_eq!(out, content);
    }

    #[tokio::test]
    async fn no_qualifying_references_skips_api_call() {
        // No mock mounted: any request would fail the test via ok=true path.
        let server = MockServer::start().await;
        let refs = vec![reference("https://a.test", REFERENCE_MIN_CHARS)]; // exactly at threshold: not qualifying
        let result = client(&server).synthesize("T", "original", &refs).await;
        assert!(!result.ok);
        assert!(result.sources.is_empty());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn successful_synthesis_returns_qualifying_sources() {
        let server = MockServer::start().await;
        let output = format!("# Enhanced Post\n\n{}\n\n## References\n\n1. x", "b".repeat(200));
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_string_contains("ORIGINAL ARTICLE"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(&output)))
            .mount(&server)
            .await;

        let refs = vec![
            reference("https://a.test/1", 500),
            reference("https://b.test/2", 50), // not qualifying
            reference("https://c.test/3", 500),
        ];
        let result = client(&server).synthesize("T", "original", &refs).await;
        assert!(result.ok);
        assert_eq!(result.sources, vec!["https://a.test/1", "https://c.test/3"]);
        assert!(result.updated_content.starts_with("# Enhanced Post"));
    }

    #[tokio::test]
    async fn short_output_fails_synthesis() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("too short")))
            .mount(&server)
            .await;

        let refs = vec![reference("https://a.test/1", 500)];
        let result = client(&server).synthesize("T", "original", &refs).await;
        assert!(!result.ok);
        assert!(result.updated_content.is_empty());
        assert!(result.sources.is_empty());
    }

    #[tokio::test]
    async fn api_error_fails_synthesis_without_panic() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let refs = vec![reference("https://a.test/1", 500)];
        let result = client(&server).synthesize("T", "original", &refs).await;
        assert!(!result.ok);
    }

    #[tokio::test]
    async fn references_appended_to_model_output_lacking_them() {
        let server = MockServer::start().await;
        let output = format!("# Enhanced\n\n{}", "b".repeat(300));
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(&output)))
            .mount(&server)
            .await;

        let refs = vec![
            reference("https://a.test/1", 500),
            reference("https://b.test/2", 500),
        ];
        let result = client(&server).synthesize("T", "original", &refs).await;
        assert!(result.ok);
        let tail = &result.updated_content[result.updated_content.len() / 2..];
        assert!(tail.contains("## References"));
        let pos_a = tail.find("https://a.test/1").expect("first url");
        let pos_b = tail.find("https://b.test/2").expect("second url");
        assert!(pos_a < pos_b);
    }

    #[tokio::test]
    async fn format_original_skips_short_input() {
        let server = MockServer::start().await;
        let result = client(&server).format_original("T", "tiny").await;
        assert!(!result.ok);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn format_original_rejects_short_output() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("ok")))
            .mount(&server)
            .await;

        let original = "o".repeat(300);
        let result = client(&server).format_original("T", &original).await;
        assert!(!result.ok);
    }

    #[tokio::test]
    async fn format_original_returns_cleaned_content() {
        let server = MockServer::start().await;
        let cleaned = format!("# T\n\n{}", "c".repeat(100));
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_string_contains("RAW ORIGINAL CONTENT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(&cleaned)))
            .mount(&server)
            .await;

        let original = "o".repeat(300);
        let result = client(&server).format_original("T", &original).await;
        assert!(result.ok);
        assert_eq!(result.content, cleaned);
    }
}
