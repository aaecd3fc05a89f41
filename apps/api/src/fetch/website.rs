//! Website fetcher: plain HTTP GET plus CSS-selector extraction. No headless
//! browser, so JavaScript-rendered pages yield whatever static HTML they ship.

use std::time::Duration;

use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use super::{FetchError, FetchedContent};

/// Extracted body text is bounded; the marker signals truncation to readers.
const MAX_BODY_CHARS: usize = 10_000;
const TRUNCATION_MARKER: &str = "...";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Main-content candidates, tried in order before falling back to `<body>`.
const CONTENT_SELECTORS: [&str; 8] = [
    "article",
    "main",
    ".content",
    ".post-content",
    ".entry-content",
    ".article-content",
    "#content",
    ".main-content",
];

/// Elements whose text never belongs in the extracted body.
const EXCLUDED_TAGS: [&str; 7] = [
    "script", "style", "nav", "header", "footer", "aside", "noscript",
];
const EXCLUDED_CLASSES: [&str; 3] = ["advertisement", "ads", "sidebar"];

pub struct WebsiteFetcher {
    client: Client,
}

impl WebsiteFetcher {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .user_agent(USER_AGENT)
                .redirect(reqwest::redirect::Policy::limited(5))
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    pub async fn fetch(&self, url: &str) -> Result<FetchedContent, FetchError> {
        let base = Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;

        let response = self.client.get(base.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let html = response.text().await?;
        debug!("Fetched {} bytes of HTML from {url}", html.len());

        Ok(extract_page(&html, &base))
    }
}

impl Default for WebsiteFetcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Pure extraction over the downloaded document. Kept synchronous so the
/// parsed DOM never lives across an await point.
fn extract_page(html: &str, base: &Url) -> FetchedContent {
    let doc = Html::parse_document(html);
    let title = extract_title(&doc);
    let body = truncate(&extract_main_content(&doc));
    let candidates = collect_image_candidates(&doc, base);
    let cover_image = select_cover_image(&candidates);
    FetchedContent {
        title,
        body,
        cover_image,
        metadata: None,
    }
}

fn extract_title(doc: &Html) -> String {
    let from_tag = |sel: &str| -> Option<String> {
        let selector = Selector::parse(sel).ok()?;
        doc.select(&selector)
            .next()
            .map(|el| el.text().collect::<String>())
            .map(|t| collapse_whitespace(&t))
            .filter(|t| !t.is_empty())
    };
    let from_meta = || -> Option<String> {
        let selector = Selector::parse(r#"meta[property="og:title"]"#).ok()?;
        doc.select(&selector)
            .next()
            .and_then(|el| el.value().attr("content"))
            .map(collapse_whitespace)
            .filter(|t| !t.is_empty())
    };
    from_tag("title")
        .or_else(|| from_tag("h1"))
        .or_else(from_meta)
        .unwrap_or_else(|| "Untitled".to_string())
}

fn extract_main_content(doc: &Html) -> String {
    for sel_str in CONTENT_SELECTORS {
        if let Ok(selector) = Selector::parse(sel_str) {
            if let Some(element) = doc.select(&selector).next() {
                return collect_text(element);
            }
        }
    }
    if let Ok(selector) = Selector::parse("body") {
        if let Some(body) = doc.select(&selector).next() {
            return collect_text(body);
        }
    }
    String::new()
}

/// Gathers text under `root`, skipping anything inside boilerplate elements.
fn collect_text(root: ElementRef) -> String {
    let mut out = String::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let excluded = node.ancestors().any(|ancestor| {
            ancestor.value().as_element().is_some_and(|el| {
                EXCLUDED_TAGS.contains(&el.name())
                    || el.classes().any(|c| EXCLUDED_CLASSES.contains(&c))
            })
        });
        if !excluded {
            out.push_str(text);
            out.push(' ');
        }
    }
    collapse_whitespace(&out)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate(text: &str) -> String {
    match text.char_indices().nth(MAX_BODY_CHARS) {
        Some((idx, _)) => format!("{}{}", &text[..idx], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

#[derive(Debug, Clone)]
struct ImageCandidate {
    url: String,
    from_og: bool,
}

/// Collects every plausible image source in document order, resolved against
/// the page's own URL so relative paths survive.
fn collect_image_candidates(doc: &Html, base: &Url) -> Vec<ImageCandidate> {
    let mut out: Vec<ImageCandidate> = Vec::new();
    let mut push = |src: &str, from_og: bool, out: &mut Vec<ImageCandidate>| {
        if src.is_empty() {
            return;
        }
        if let Ok(absolute) = base.join(src) {
            out.push(ImageCandidate {
                url: absolute.to_string(),
                from_og,
            });
        }
    };

    let meta_sources = [
        (r#"meta[property="og:image"]"#, true),
        (r#"meta[name="twitter:image"]"#, false),
        (r#"meta[name="twitter:image:src"]"#, false),
    ];
    for (sel_str, from_og) in meta_sources {
        if let Ok(selector) = Selector::parse(sel_str) {
            for el in doc.select(&selector) {
                if let Some(content) = el.value().attr("content") {
                    push(content, from_og, &mut out);
                }
            }
        }
    }

    if let Ok(selector) = Selector::parse(r#"link[rel="apple-touch-icon"]"#) {
        for el in doc.select(&selector) {
            if let Some(href) = el.value().attr("href") {
                push(href, false, &mut out);
            }
        }
    }

    if let Ok(selector) = Selector::parse("img") {
        for el in doc.select(&selector) {
            let src = el
                .value()
                .attr("src")
                .or_else(|| el.value().attr("data-src"))
                .or_else(|| el.value().attr("data-lazy-src"));
            if let Some(src) = src {
                push(src, false, &mut out);
            }
        }
    }

    out
}

/// Picks the best cover: first Open-Graph candidate, else the first candidate
/// that is not icon-shaped and has an image extension, else anything.
fn select_cover_image(candidates: &[ImageCandidate]) -> Option<String> {
    if let Some(og) = candidates.iter().find(|c| c.from_og) {
        return Some(og.url.clone());
    }
    if let Some(good) = candidates
        .iter()
        .find(|c| !looks_like_icon(&c.url) && has_image_extension(&c.url))
    {
        return Some(good.url.clone());
    }
    candidates.first().map(|c| c.url.clone())
}

fn looks_like_icon(url: &str) -> bool {
    let lower = url.to_lowercase();
    ["icon", "logo", "avatar", "favicon", "apple-touch"]
        .iter()
        .any(|hint| lower.contains(hint))
}

fn has_image_extension(url: &str) -> bool {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_lowercase(),
        Err(_) => return false,
    };
    [".jpg", ".jpeg", ".png", ".webp", ".gif"]
        .iter()
        .any(|ext| path.ends_with(ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/posts/1").unwrap()
    }

    #[test]
    fn test_title_prefers_title_tag() {
        let doc = Html::parse_document(
            "<html><head><title>  A   Title </title></head><body><h1>H1</h1></body></html>",
        );
        assert_eq!(extract_title(&doc), "A Title");
    }

    #[test]
    fn test_title_falls_back_to_h1_then_untitled() {
        let doc = Html::parse_document("<html><body><h1>Headline</h1></body></html>");
        assert_eq!(extract_title(&doc), "Headline");
        let empty = Html::parse_document("<html><body><p>text</p></body></html>");
        assert_eq!(extract_title(&empty), "Untitled");
    }

    #[test]
    fn test_main_content_prefers_article_over_body() {
        let doc = Html::parse_document(
            "<html><body><nav>menu</nav><article>real content here</article>\
             <footer>legal</footer></body></html>",
        );
        assert_eq!(extract_main_content(&doc), "real content here");
    }

    #[test]
    fn test_body_fallback_skips_boilerplate() {
        let doc = Html::parse_document(
            "<html><body><script>var x = 1;</script><nav>menu</nav>\
             <div class=\"sidebar\">widgets</div><p>kept text</p></body></html>",
        );
        let content = extract_main_content(&doc);
        assert_eq!(content, "kept text");
    }

    #[test]
    fn test_truncation_appends_marker() {
        let long = "word ".repeat(4000);
        let truncated = truncate(long.trim());
        assert!(truncated.ends_with(TRUNCATION_MARKER));
        assert!(truncated.len() <= MAX_BODY_CHARS + TRUNCATION_MARKER.len());
        assert_eq!(truncate("short"), "short");
    }

    #[test]
    fn test_og_image_wins() {
        let doc = Html::parse_document(
            r#"<html><head>
                <meta name="twitter:image" content="/tw.png">
                <meta property="og:image" content="/og.png">
            </head><body><img src="/inline.jpg"></body></html>"#,
        );
        let candidates = collect_image_candidates(&doc, &base());
        assert_eq!(
            select_cover_image(&candidates).as_deref(),
            Some("https://example.com/og.png")
        );
    }

    #[test]
    fn test_icon_paths_passed_over_for_real_images() {
        let doc = Html::parse_document(
            r#"<html><body>
                <img src="/assets/logo.png">
                <img data-src="/uploads/hero.jpg">
            </body></html>"#,
        );
        let candidates = collect_image_candidates(&doc, &base());
        assert_eq!(
            select_cover_image(&candidates).as_deref(),
            Some("https://example.com/uploads/hero.jpg")
        );
    }

    #[test]
    fn test_any_candidate_beats_none() {
        let doc = Html::parse_document(
            r#"<html><body><img src="/assets/favicon.ico"></body></html>"#,
        );
        let candidates = collect_image_candidates(&doc, &base());
        assert_eq!(
            select_cover_image(&candidates).as_deref(),
            Some("https://example.com/assets/favicon.ico")
        );
        assert_eq!(select_cover_image(&[]), None);
    }

    #[test]
    fn test_relative_sources_resolved_against_page_url() {
        let doc = Html::parse_document(r#"<html><body><img src="images/pic.jpg"></body></html>"#);
        let candidates = collect_image_candidates(&doc, &base());
        assert_eq!(candidates[0].url, "https://example.com/posts/images/pic.jpg");
    }
}
