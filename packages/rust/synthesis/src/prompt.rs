//! Fixed prompt contracts for synthesis and formatting.
//!
//! These are behavioral contracts, not tunables: synthesis must preserve the
//! original's factual claims and produce structured Markdown ending in a
//! References section; formatting must clean without adding facts.

use postforge_shared::{ExtractedContent, REFERENCE_CAP_CHARS, truncate_chars};

/// System contract for enhancing an article from reference articles.
pub const SYNTHESIS_SYSTEM_PROMPT: &str = "\
You are an expert content editor and SEO specialist. Your task is to improve and enhance blog \
articles based on successful reference articles that rank well on Google.

Your goals:
1. Improve the structure and formatting of the original article
2. Add relevant details and insights inspired by the reference articles
3. Maintain the original article's core message and facts
4. Make the content more engaging and readable
5. Use proper headings, paragraphs, and formatting
6. Ensure the content is original and not plagiarized

Output format:
- Use markdown formatting
- Include an engaging introduction
- Use H2 and H3 headings appropriately
- Add bullet points or numbered lists where relevant
- Include a conclusion section
- At the end, add a \"References\" section listing the source URLs";

/// System contract for cleaning up raw scraped content without adding facts.
pub const FORMAT_SYSTEM_PROMPT: &str = "\
You are an expert content formatter and editor. Your task is to clean up and format raw blog \
content that may have been scraped from a website.

Your goals:
1. FIX FORMATTING: Add proper markdown structure (headings, paragraphs, lists)
2. CLEAN UP TEXT: Remove duplicated text, navigation remnants, and website artifacts
3. IMPROVE READABILITY: Break up long paragraphs, add proper spacing
4. PRESERVE THE ORIGINAL MESSAGE: Do NOT add new information or change facts
5. REMOVE NOISE: Strip out cookie notices, subscription prompts, and other non-content text

IMPORTANT RULES:
- Keep ALL original information - do not remove any facts or details
- Use the original title as the H1 heading
- Create logical H2/H3 sections based on the content flow
- Use bullet points or numbered lists where appropriate
- Keep the same writing style and tone
- Do NOT add new information that wasn't in the original
- Do NOT add a conclusion if there wasn't one
- Output clean, well-formatted markdown";

/// User payload embedding the original article and the truncated references,
/// in their discovery order.
pub fn synthesis_user_prompt(
    title: &str,
    original: &str,
    references: &[&ExtractedContent],
) -> String {
    let reference_blocks: String = references
        .iter()
        .enumerate()
        .map(|(idx, r)| {
            format!(
                "\n--- Reference Article {} ---\nTitle: {}\nURL: {}\nContent:\n{}\n",
                idx + 1,
                r.title,
                r.url,
                truncate_chars(&r.text, REFERENCE_CAP_CHARS)
            )
        })
        .collect();

    format!(
        "Please enhance this article based on the reference articles that rank well on Google \
         for similar topics.\n\n\
         === ORIGINAL ARTICLE ===\n\
         Title: {title}\n\n\
         Content:\n{original}\n\n\
         === REFERENCE ARTICLES (TOP GOOGLE RESULTS) ===\n\
         {reference_blocks}\n\
         Please rewrite and enhance the original article, making it more comprehensive and \
         well-formatted while maintaining its core message. Include proper markdown formatting."
    )
}

/// User payload for the formatting contract.
pub fn format_user_prompt(title: &str, original: &str) -> String {
    format!(
        "Please format and clean up the following raw blog content. Preserve all information \
         but improve the structure and readability.\n\n\
         === BLOG TITLE ===\n\
         {title}\n\n\
         === RAW ORIGINAL CONTENT ===\n\
         {original}\n\n\
         Please output the cleaned and formatted version in markdown format."
    )
}
