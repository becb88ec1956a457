//! Best-effort main-content extraction for arbitrary article pages.
//!
//! [`Extractor::extract`] fetches a URL and locates its main text using an
//! ordered chain of content locators, most-specific first. Extraction
//! failure is an expected, recoverable outcome: it is logged and reported
//! through the `ok` flag, never raised to the caller. Retry and
//! alternate-URL policy belong to the pipeline, not here.

pub mod seed;

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use postforge_shared::{
    EXTRACT_CAP_CHARS, EXTRACT_OK_MIN_CHARS, ExtractedContent, LOCATOR_ACCEPT_MIN_CHARS,
    PostforgeError, Result, truncate_chars,
};

/// Browser-like User-Agent; many blogs refuse obvious bot agents.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.5";

/// Per-request timeout.
const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Non-content elements whose subtrees are skipped during text collection.
const CHROME_SELECTOR: &str = "script, style, nav, footer, header, aside, .sidebar, .comments, \
                               .advertisement, .ad, .social-share, .related-posts, .newsletter";

/// Content locators tried in order of specificity. A match is accepted once
/// its text clears [`LOCATOR_ACCEPT_MIN_CHARS`]; otherwise the next locator
/// is tried. The whole-document body is the last resort.
const CONTENT_LOCATORS: &[&str] = &[
    "article .content",
    "article .post-content",
    "article .entry-content",
    ".blog-content",
    ".post-body",
    ".article-body",
    ".entry-content",
    ".post-content",
    "article",
    "main .content",
    "main",
    ".content",
];

static SPACE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\r\f]+").expect("valid regex"));
static BLANK_LINE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("valid regex"));

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

/// Fetches pages and extracts their title and main-body text.
#[derive(Debug, Clone)]
pub struct Extractor {
    client: reqwest::Client,
}

impl Extractor {
    /// Create an extractor with browser-like headers and a bounded timeout.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| {
                PostforgeError::extraction("-", format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self { client })
    }

    /// Fetch `url` and return its best-effort title and main text.
    ///
    /// Network or non-2xx failures yield `ok == false`; no retries here.
    pub async fn extract(&self, url: &str) -> ExtractedContent {
        let html = match self.fetch(url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(%url, error = %e, "page fetch failed");
                return ExtractedContent {
                    url: url.to_string(),
                    title: String::new(),
                    text: String::new(),
                    ok: false,
                };
            }
        };

        extract_from_html(url, &html)
    }

    /// Fetch a URL's raw HTML. Used directly for seed index pages, where the
    /// caller parses the markup itself.
    pub async fn fetch_html(&self, url: &str) -> Result<String> {
        self.fetch(url).await
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, ACCEPT)
            .header(reqwest::header::ACCEPT_LANGUAGE, ACCEPT_LANGUAGE)
            .send()
            .await
            .map_err(|e| PostforgeError::extraction(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PostforgeError::extraction(url, format!("HTTP {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| PostforgeError::extraction(url, e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// HTML processing
// ---------------------------------------------------------------------------

/// Extract title and main text from already-fetched HTML.
pub fn extract_from_html(url: &str, html: &str) -> ExtractedContent {
    let doc = Html::parse_document(html);

    let mut text = String::new();
    for locator in CONTENT_LOCATORS {
        let sel = Selector::parse(locator).expect("valid locator selector");
        let candidate = collect_text(&doc, &sel);
        if candidate.is_empty() {
            continue;
        }
        text = candidate;
        if text.chars().count() > LOCATOR_ACCEPT_MIN_CHARS {
            debug!(%url, locator, "content locator accepted");
            break;
        }
    }

    // Fall back to the whole body regardless of length.
    if text.chars().count() <= LOCATOR_ACCEPT_MIN_CHARS {
        let body_sel = Selector::parse("body").expect("valid selector");
        let body_text = collect_text(&doc, &body_sel);
        if !body_text.is_empty() {
            text = body_text;
        }
    }

    let text = truncate_chars(&text, EXTRACT_CAP_CHARS).to_string();
    let ok = text.chars().count() > EXTRACT_OK_MIN_CHARS;

    ExtractedContent {
        url: url.to_string(),
        title: resolve_title(&doc),
        text,
        ok,
    }
}

/// Concatenate the normalized text of every node matching `sel`, leaving
/// out anything inside a chrome element. Working on the parsed tree keeps
/// the skip reliable regardless of how the source markup was written.
fn collect_text(doc: &Html, sel: &Selector) -> String {
    let chrome = Selector::parse(CHROME_SELECTOR).expect("valid chrome selector");

    let mut parts = Vec::new();
    for el in doc.select(sel) {
        if is_chrome(el, &chrome) {
            continue;
        }
        let mut text = String::new();
        append_text(el, &chrome, &mut text);
        parts.push(text);
    }
    normalize_whitespace(&parts.join("\n"))
}

/// Whether `el` is a chrome element or sits anywhere inside one.
fn is_chrome(el: ElementRef<'_>, chrome: &Selector) -> bool {
    if chrome.matches(&el) {
        return true;
    }
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| chrome.matches(&a))
}

/// Depth-first text collection under `el`, pruning chrome subtrees.
fn append_text(el: ElementRef<'_>, chrome: &Selector, out: &mut String) {
    for child in el.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            if !chrome.matches(&child_el) {
                append_text(child_el, chrome, out);
            }
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
        }
    }
}

/// Collapse whitespace runs to single spaces and blank-line runs to one
/// blank line.
fn normalize_whitespace(text: &str) -> String {
    let collapsed = SPACE_RUNS.replace_all(text, " ");
    let collapsed = BLANK_LINE_RUNS.replace_all(&collapsed, "\n\n");
    collapsed.trim().to_string()
}

/// Title resolution order: first `<h1>`, else `<title>`, else `og:title`.
fn resolve_title(doc: &Html) -> String {
    let h1_sel = Selector::parse("h1").expect("valid selector");
    if let Some(h1) = doc.select(&h1_sel).next() {
        let title = h1.text().collect::<String>().trim().to_string();
        if !title.is_empty() {
            return title;
        }
    }

    let title_sel = Selector::parse("title").expect("valid selector");
    if let Some(t) = doc.select(&title_sel).next() {
        let title = t.text().collect::<String>().trim().to_string();
        if !title.is_empty() {
            return title;
        }
    }

    let og_sel = Selector::parse(r#"meta[property="og:title"]"#).expect("valid selector");
    if let Some(meta) = doc.select(&og_sel).next() {
        if let Some(content) = meta.value().attr("content") {
            return content.trim().to_string();
        }
    }

    String::new()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
