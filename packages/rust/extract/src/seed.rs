//! Seed-index parsing: turn a blog listing page into [`SeedPost`] records.
//!
//! The listing page presents each post as an `article` card; cards missing a
//! title or URL are dropped, all other fields fall back to placeholder
//! defaults so ingestion never stalls on sparse markup.

use scraper::{ElementRef, Html, Selector};

use postforge_shared::SeedPost;

/// Parse every post card on a blog index page, in page order.
pub fn parse_seed_index(html: &str) -> Vec<SeedPost> {
    let doc = Html::parse_document(html);
    let card_sel = Selector::parse("article").expect("valid selector");

    doc.select(&card_sel).filter_map(parse_card).collect()
}

/// The N oldest posts. Listing pages order newest-first, so the oldest
/// posts are the tail of the list.
pub fn oldest(posts: &[SeedPost], count: usize) -> Vec<SeedPost> {
    let start = posts.len().saturating_sub(count);
    posts[start..].to_vec()
}

fn parse_card(card: ElementRef<'_>) -> Option<SeedPost> {
    let title = select_text(card, "h2.entry-title")?;
    let url = select_attr(card, "h2.entry-title a", "href")?;

    let published = select_text(card, "time.ct-meta-element-date")
        .or_else(|| select_text(card, ".meta-date"))
        .unwrap_or_else(|| "No date available".into());

    Some(SeedPost {
        title,
        url,
        category: select_text(card, ".meta-categories a")
            .unwrap_or_else(|| "Uncategorized".into()),
        author: select_text(card, ".meta-author a").unwrap_or_else(|| "Unknown".into()),
        published,
        excerpt: select_text(card, ".entry-excerpt p")
            .unwrap_or_else(|| "No excerpt available".into()),
    })
}

fn select_text(scope: ElementRef<'_>, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).expect("valid selector");
    let text = scope
        .select(&sel)
        .next()?
        .text()
        .collect::<String>()
        .trim()
        .to_string();
    (!text.is_empty()).then_some(text)
}

fn select_attr(scope: ElementRef<'_>, selector: &str, attr: &str) -> Option<String> {
    let sel = Selector::parse(selector).expect("valid selector");
    scope
        .select(&sel)
        .next()?
        .value()
        .attr(attr)
        .map(|v| v.to_string())
}
