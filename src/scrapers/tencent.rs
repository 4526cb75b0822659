//! Tencent News web feed client.
//!
//! The feed is a single POST endpoint (`getHotModuleList`) that takes a
//! channel id and a page counter (`flush_num`) and answers with JSON. Article
//! links point at regular HTML pages carrying an `article:published_time`
//! meta tag.

use super::{FeedSource, extract_published_time};
use crate::error::{EtlError, Result};
use reqwest::header::{COOKIE, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument};
use url::Url;

pub const DEFAULT_FEED_URL: &str = "https://i.news.qq.com/web_feed/getHotModuleList";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/112.0.0.0 Safari/537.36 Edg/112.0.1722.58";
pub const DEFAULT_DEVICE_ID: &str = "0_SM2WDY82ADn3S";

#[derive(Debug, Serialize)]
struct ClientTag {
    from: &'static str,
}

/// Request body for one feed page.
#[derive(Debug, Serialize)]
pub struct FeedRequest<'a> {
    se_req: ClientTag,
    forward: &'static str,
    qimei36: &'a str,
    device_id: &'a str,
    base_req: ClientTag,
    channel_id: &'a str,
    flush_num: u32,
    item_count: u32,
}

impl<'a> FeedRequest<'a> {
    pub fn new(channel_id: &'a str, page: u32, page_size: u32, device_id: &'a str) -> Self {
        Self {
            se_req: ClientTag { from: "pc" },
            forward: "2",
            qimei36: device_id,
            device_id,
            base_req: ClientTag { from: "pc" },
            channel_id,
            flush_num: page,
            item_count: page_size,
        }
    }
}

/// HTTP client for the feed endpoint and the article pages it links to.
///
/// Every request carries the same static headers (user agent and, when
/// configured, a session cookie).
#[derive(Debug, Clone)]
pub struct TencentFeed {
    client: Client,
    feed_url: Url,
    device_id: String,
    page_size: u32,
}

impl TencentFeed {
    pub fn new(
        feed_url: &str,
        cookie: Option<&str>,
        user_agent: &str,
        device_id: &str,
        page_size: u32,
    ) -> Result<Self> {
        let feed_url = Url::parse(feed_url).map_err(|source| EtlError::Url {
            url: feed_url.to_string(),
            source,
        })?;

        let mut headers = HeaderMap::new();
        if let Ok(ua) = HeaderValue::from_str(user_agent) {
            headers.insert(USER_AGENT, ua);
        }
        if let Some(cookie) = cookie.filter(|c| !c.is_empty()) {
            if let Ok(value) = HeaderValue::from_str(cookie) {
                headers.insert(COOKIE, value);
            }
        }

        let client = Client::builder().default_headers(headers).build()?;
        Ok(Self {
            client,
            feed_url,
            device_id: device_id.to_string(),
            page_size,
        })
    }
}

impl FeedSource for TencentFeed {
    #[instrument(level = "info", skip(self), fields(feed = %self.feed_url))]
    async fn fetch_page(&self, channel_id: &str, page: u32) -> Result<Value> {
        let body = FeedRequest::new(channel_id, page, self.page_size, &self.device_id);
        let resp = self
            .client
            .post(self.feed_url.clone())
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(EtlError::Status {
                status: status.as_u16(),
                url: self.feed_url.to_string(),
            });
        }

        let data = resp.json::<Value>().await?;
        debug!("Feed page received");
        Ok(data)
    }

    #[instrument(level = "info", skip(self))]
    async fn fetch_published_time(&self, url: &str) -> Result<Option<String>> {
        let parsed = Url::parse(url).map_err(|source| EtlError::Url {
            url: url.to_string(),
            source,
        })?;

        let resp = self.client.get(parsed).send().await?;
        let status = resp.status();
        if status != StatusCode::OK {
            return Err(EtlError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let html = resp.text().await?;
        let published = extract_published_time(&html);
        info!(bytes = html.len(), found = published.is_some(), "Parsed article page");
        Ok(published)
    }
}
