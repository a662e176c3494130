// tests/extract_pages.rs
//
// Page extraction wired through the sources: short excerpts get page text
// attached, long ones are left alone, failures never drop an item.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use prospect_signals::extract::{ContentExtractor, EXTRACT_BELOW_CHARS};
use prospect_signals::fakes::{hit, StaticPageFetcher, StaticSearchBackend};
use prospect_signals::model::{NewsItem, RelevanceDetails};
use prospect_signals::sources::{SearchBackend, SecondarySource};

const PAGE: &str = r#"<html><head><style>.x{}</style><script>track()</script></head>
<body><nav>Home | About</nav><article><h1>Acme Corp expands</h1>
<p>Acme Corp opened two data centers in Ohio.</p></article>
<footer>Copyright</footer></body></html>"#;

fn item(url: &str, content: &str) -> NewsItem {
    NewsItem {
        url: url.into(),
        title: "Acme Corp expands".into(),
        description: "Acme Corp grows.".into(),
        content: content.into(),
        full_content: None,
        source: "Wire".into(),
        published_at: None,
        entity_name: "Acme Corp".into(),
        is_competitor: false,
        relevance_score: 0.0,
        relevance_details: RelevanceDetails::default(),
    }
}

#[tokio::test]
async fn short_excerpt_gets_page_text_without_chrome() {
    let pages = Arc::new(StaticPageFetcher::new().page("https://n.test/a", PAGE));
    let ex = ContentExtractor::new(pages.clone());
    let mut it = item("https://n.test/a", "Acme Corp grows.");

    ex.supplement(&mut it).await;

    let full = it.full_content.as_deref().unwrap();
    assert!(full.contains("Acme Corp opened two data centers in Ohio."));
    assert!(!full.contains("track()"));
    assert!(!full.contains("Home | About"));
    assert!(!full.contains("Copyright"));
    assert_eq!(pages.calls(), 1);
}

#[tokio::test]
async fn long_excerpt_is_not_fetched() {
    let pages = Arc::new(StaticPageFetcher::new().page("https://n.test/a", PAGE));
    let ex = ContentExtractor::new(pages.clone());
    let mut it = item("https://n.test/a", &"word ".repeat(EXTRACT_BELOW_CHARS));

    ex.supplement(&mut it).await;

    assert!(it.full_content.is_none());
    assert_eq!(pages.calls(), 0);
}

#[tokio::test]
async fn failed_fetch_leaves_item_intact() {
    let pages = Arc::new(StaticPageFetcher::new());
    let ex = ContentExtractor::new(pages.clone());
    let mut it = item("https://n.test/missing", "Acme Corp grows.");

    ex.supplement(&mut it).await;

    assert!(it.full_content.is_none());
    assert_eq!(it.content, "Acme Corp grows.");
    assert_eq!(ex.extract("https://n.test/missing").await, "");
}

#[tokio::test]
async fn secondary_items_carry_extracted_text() {
    let pages = Arc::new(StaticPageFetcher::new().page("https://s.test/1", PAGE));
    let search: Arc<dyn SearchBackend> = Arc::new(StaticSearchBackend::with_hits(vec![
        hit("Acme Corp expands", "Acme Corp grows.", "https://s.test/1"),
        hit("Acme Corp elsewhere", "Acme Corp in brief.", "https://s.test/2"),
    ]));
    let source = SecondarySource::new(Some(search), ContentExtractor::new(pages), 2);
    let now = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();

    let items = source.fetch("Acme Corp", &[], "tech", now).await;

    assert_eq!(items.len(), 2, "extraction failure does not drop the item");
    let with_page = items.iter().find(|i| i.url == "https://s.test/1").unwrap();
    assert!(with_page
        .full_content
        .as_deref()
        .is_some_and(|t| t.contains("data centers")));
    let without = items.iter().find(|i| i.url == "https://s.test/2").unwrap();
    assert!(without.full_content.is_none());
}
