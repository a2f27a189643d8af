//! RBC and Smart-Lab news clients
//!
//! Both sources publish RSS 2.0 feeds. Items are extracted with regex
//! rather than a full XML parser: the feeds are flat and well-formed,
//! and only four tags per item matter.

use crate::companies::name_variations;
use crate::error::{DataError, Result};
use chrono::{DateTime, Duration as ChronoDuration, NaiveDateTime, Utc};
use regex::Regex;
use reqwest::Client;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const SMARTLAB_RSS_URL: &str = "https://smart-lab.ru/rss/";

static ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<item>(.*?)</item>").expect("static regex"));
static TAG_STRIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("static regex"));

/// A single news item from either source
#[derive(Debug, Clone)]
pub struct NewsItem {
    /// Headline
    pub title: String,
    /// Article URL
    pub link: String,
    /// Publication time, `YYYY-MM-DD HH:MM:SS`
    pub published: String,
    /// Short description with HTML stripped
    pub summary: String,
    /// Source category label
    pub category: String,
}

/// RBC RSS feed categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RbcCategory {
    /// Economy-wide news
    Economics,
    /// Stock market news
    Stock,
    /// Business news
    Business,
}

impl RbcCategory {
    fn rss_url(self) -> &'static str {
        match self {
            Self::Economics => "https://rssexport.rbc.ru/rbcnews/news/20/full.rss",
            Self::Stock => "https://rssexport.rbc.ru/rbcnews/news/stock/full.rss",
            Self::Business => "https://rssexport.rbc.ru/rbcnews/news/business/full.rss",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Economics => "economics",
            Self::Stock => "stock",
            Self::Business => "business",
        }
    }
}

/// Client for RBC news feeds
pub struct RbcClient {
    client: Client,
}

impl RbcClient {
    /// Create a new RBC client
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: feed_client()?,
        })
    }

    /// Fetch one RSS category
    pub async fn get_feed(&self, category: RbcCategory) -> Result<Vec<NewsItem>> {
        let xml = fetch_text(&self.client, category.rss_url()).await?;
        Ok(parse_rss(&xml, category.label()))
    }

    /// Market news across all categories within the lookback window,
    /// newest first
    pub async fn get_market_news(&self, look_back_days: i64) -> Result<Vec<NewsItem>> {
        let mut all = Vec::new();
        for category in [
            RbcCategory::Economics,
            RbcCategory::Stock,
            RbcCategory::Business,
        ] {
            match self.get_feed(category).await {
                Ok(items) => all.extend(items),
                Err(e) => debug!("RBC feed {} failed: {}", category.label(), e),
            }
        }

        let mut recent = filter_by_age(all, look_back_days);
        recent.sort_by(|a, b| b.published.cmp(&a.published));
        Ok(recent)
    }

    /// News mentioning a specific company
    pub async fn search_company_news(
        &self,
        ticker: &str,
        look_back_days: i64,
    ) -> Result<Vec<NewsItem>> {
        let all = self.get_market_news(look_back_days).await?;
        Ok(filter_by_company(all, ticker))
    }
}

/// Client for the Smart-Lab community feed
pub struct SmartlabClient {
    client: Client,
}

impl SmartlabClient {
    /// Create a new Smart-Lab client
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: feed_client()?,
        })
    }

    /// Fetch the feed; each item is categorized by headline keywords
    pub async fn get_feed(&self) -> Result<Vec<NewsItem>> {
        let xml = fetch_text(&self.client, SMARTLAB_RSS_URL).await?;
        let mut items = parse_rss(&xml, "general");
        for item in &mut items {
            item.category = classify_title(&item.title).to_string();
        }
        Ok(items)
    }

    /// Feed items within the lookback window, newest first
    pub async fn get_recent(&self, look_back_days: i64) -> Result<Vec<NewsItem>> {
        let items = self.get_feed().await?;
        let mut recent = filter_by_age(items, look_back_days);
        recent.sort_by(|a, b| b.published.cmp(&a.published));
        Ok(recent)
    }

    /// Posts mentioning a specific company
    pub async fn search_company_news(
        &self,
        ticker: &str,
        look_back_days: i64,
    ) -> Result<Vec<NewsItem>> {
        let items = self.get_recent(look_back_days).await?;
        Ok(filter_by_company(items, ticker))
    }
}

fn feed_client() -> Result<Client> {
    Ok(Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .build()?)
}

async fn fetch_text(client: &Client, url: &str) -> Result<String> {
    debug!("Fetching feed: {}", url);
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        return Err(DataError::Api(format!(
            "feed returned HTTP {} for {url}",
            response.status()
        )));
    }

    Ok(response.text().await?)
}

/// Extract items from an RSS 2.0 document
fn parse_rss(xml: &str, category: &str) -> Vec<NewsItem> {
    ITEM_RE
        .captures_iter(xml)
        .map(|cap| {
            let item = &cap[1];
            NewsItem {
                title: extract_tag(item, "title"),
                link: extract_tag(item, "link"),
                published: normalize_pub_date(&extract_tag(item, "pubDate")),
                summary: strip_html(&extract_tag(item, "description")),
                category: category.to_string(),
            }
        })
        .collect()
}

/// Extract one tag's text content, unwrapping CDATA and entities
fn extract_tag(item: &str, tag: &str) -> String {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");

    let Some(start) = item.find(&open) else {
        return String::new();
    };
    let rest = &item[start + open.len()..];
    let Some(end) = rest.find(&close) else {
        return String::new();
    };

    let mut text = rest[..end].trim();
    if let Some(inner) = text
        .strip_prefix("<![CDATA[")
        .and_then(|t| t.strip_suffix("]]>"))
    {
        text = inner.trim();
    }

    decode_entities(text)
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn strip_html(text: &str) -> String {
    TAG_STRIP_RE.replace_all(text, "").trim().to_string()
}

/// Convert an RFC 2822 pubDate to `YYYY-MM-DD HH:MM:SS`, falling back
/// to the current time when the feed date is unparseable
fn normalize_pub_date(raw: &str) -> String {
    DateTime::parse_from_rfc2822(raw)
        .map(|dt| dt.naive_utc())
        .unwrap_or_else(|_| Utc::now().naive_utc())
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

fn filter_by_age(items: Vec<NewsItem>, look_back_days: i64) -> Vec<NewsItem> {
    let cutoff = Utc::now().naive_utc() - ChronoDuration::days(look_back_days);
    items
        .into_iter()
        .filter(|item| {
            NaiveDateTime::parse_from_str(&item.published, "%Y-%m-%d %H:%M:%S")
                .map(|dt| dt >= cutoff)
                .unwrap_or(false)
        })
        .collect()
}

fn filter_by_company(items: Vec<NewsItem>, ticker: &str) -> Vec<NewsItem> {
    let terms = name_variations(ticker);
    items
        .into_iter()
        .filter(|item| {
            let title = item.title.to_lowercase();
            let summary = item.summary.to_lowercase();
            terms.iter().any(|t| title.contains(t) || summary.contains(t))
        })
        .collect()
}

/// Categorize a Smart-Lab headline by keywords
fn classify_title(title: &str) -> &'static str {
    let lower = title.to_lowercase();

    if ["дивиденд", "выплат", "доходность"]
        .iter()
        .any(|w| lower.contains(w))
    {
        "dividends"
    } else if ["отчет", "финанс", "прибыль", "выручка"]
        .iter()
        .any(|w| lower.contains(w))
    {
        "financials"
    } else if ["цб", "ключевая ставка", "инфляция"]
        .iter()
        .any(|w| lower.contains(w))
    {
        "monetary_policy"
    } else if ["нефть", "газ", "золото", "валют"]
        .iter()
        .any(|w| lower.contains(w))
    {
        "commodities"
    } else if ["сша", "китай", "европа", "санкции"]
        .iter()
        .any(|w| lower.contains(w))
    {
        "geopolitics"
    } else {
        "general"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel>
<item>
<title><![CDATA[Сбербанк отчитался о рекордной прибыли]]></title>
<link>https://example.com/1</link>
<pubDate>Mon, 02 Jun 2025 10:30:00 +0300</pubDate>
<description><![CDATA[<p>Чистая прибыль выросла &amp; превысила прогноз</p>]]></description>
</item>
<item>
<title>Цены на нефть снижаются</title>
<link>https://example.com/2</link>
<pubDate>Sun, 01 Jun 2025 08:00:00 +0300</pubDate>
<description>Brent ниже $70</description>
</item>
</channel></rss>"#;

    #[test]
    fn test_parse_rss_items() {
        let items = parse_rss(SAMPLE_RSS, "stock");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Сбербанк отчитался о рекордной прибыли");
        assert_eq!(items[0].link, "https://example.com/1");
        assert_eq!(items[0].category, "stock");
        // HTML stripped, entities decoded
        assert_eq!(items[0].summary, "Чистая прибыль выросла & превысила прогноз");
    }

    #[test]
    fn test_pub_date_normalized_to_utc() {
        let items = parse_rss(SAMPLE_RSS, "stock");
        assert_eq!(items[0].published, "2025-06-02 07:30:00");
    }

    #[test]
    fn test_unparseable_date_does_not_panic() {
        let normalized = normalize_pub_date("tomorrow-ish");
        // falls back to now; format must still be parseable
        assert!(NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%d %H:%M:%S").is_ok());
    }

    #[test]
    fn test_company_filter() {
        let items = parse_rss(SAMPLE_RSS, "stock");
        let hits = filter_by_company(items, "SBER");
        assert_eq!(hits.len(), 1);
        assert!(hits[0].title.contains("Сбербанк"));
    }

    #[test]
    fn test_classify_title() {
        assert_eq!(classify_title("Газпром объявил дивиденды"), "dividends");
        assert_eq!(classify_title("ЦБ сохранил ключевую ставку"), "monetary_policy");
        assert_eq!(classify_title("Просто пост"), "general");
    }
}
