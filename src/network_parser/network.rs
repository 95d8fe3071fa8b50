//! MangaDex 接口的阻塞式 HTTP 实现。
//!
//! 一个 `MangaDexClient` 在所有下载线程间共享（`reqwest::blocking::Client` 本身可并发使用）。

use std::io::{self, Read};
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, CONNECTION, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use super::api::{
    ApiError, AssetBody, AssetTransport, CatalogApi, ChapterPage, ChapterQuery, DeliveryInfo,
    FetchError, RawChapter, WorkCandidate,
};
use crate::base_system::context::Config;

#[derive(Debug, Clone)]
pub struct MangaDexConfig {
    pub api_base: String,
    pub user_agent: String,
    pub request_timeout: Duration,
    pub asset_timeout: Duration,
    pub force_port_443: bool,
}

impl From<&Config> for MangaDexConfig {
    fn from(cfg: &Config) -> Self {
        Self {
            api_base: cfg.api_base.trim().trim_end_matches('/').to_string(),
            user_agent: cfg.user_agent.clone(),
            request_timeout: cfg.request_timeout(),
            asset_timeout: cfg.asset_timeout(),
            force_port_443: cfg.force_port_443,
        }
    }
}

pub struct MangaDexClient {
    client: Client,
    config: MangaDexConfig,
}

impl MangaDexClient {
    pub fn new(config: MangaDexConfig) -> anyhow::Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .unwrap_or(HeaderValue::from_static("mdex-downloader")),
        );

        // 单个请求另行设置超时；这里只限制建连时间
        let client = Client::builder()
            .default_headers(default_headers)
            .connect_timeout(config.request_timeout)
            .timeout(None)
            .build()?;

        Ok(Self { client, config })
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str, req: RequestBuilder) -> Result<T, ApiError> {
        debug!(target: "network", url, "GET");
        let resp = req
            .header(ACCEPT, "application/json")
            .timeout(self.config.request_timeout)
            .send()
            .map_err(|e| map_request_error(url, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        resp.json::<T>().map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout(url.to_string())
            } else {
                ApiError::Decode(e.to_string())
            }
        })
    }
}

fn map_request_error(url: &str, e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Timeout(url.to_string())
    } else if let Some(status) = e.status() {
        ApiError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        }
    } else {
        ApiError::Transport(e.to_string())
    }
}

// ── 响应结构 ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    data: Option<Vec<T>>,
    total: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct MangaData {
    id: String,
    #[serde(default)]
    attributes: Option<MangaAttributes>,
}

#[derive(Debug, Default, Deserialize)]
struct MangaAttributes {
    #[serde(default)]
    title: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct ChapterData {
    id: String,
    #[serde(default)]
    attributes: Option<ChapterAttributes>,
}

#[derive(Debug, Default, Deserialize)]
struct ChapterAttributes {
    #[serde(default)]
    chapter: Option<Value>,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtHomeResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default, rename = "baseUrl")]
    base_url: Option<String>,
    #[serde(default)]
    chapter: Option<AtHomeChapter>,
}

#[derive(Debug, Deserialize)]
struct AtHomeChapter {
    #[serde(default)]
    hash: Option<String>,
    #[serde(default)]
    data: Option<Vec<String>>,
    #[serde(default, rename = "dataSaver")]
    data_saver: Option<Vec<String>>,
}

fn into_candidate(m: MangaData) -> WorkCandidate {
    let titles = m
        .attributes
        .and_then(|a| a.title)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(locale, v)| v.as_str().map(|t| (locale, t.to_string())))
        .collect();
    WorkCandidate { id: m.id, titles }
}

fn into_raw_chapter(c: ChapterData) -> RawChapter {
    let attrs = c.attributes.unwrap_or_default();
    // 章节号通常是字符串，偶尔会是数字
    let chapter = match attrs.chapter {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    RawChapter {
        id: c.id,
        chapter,
        title: attrs.title,
    }
}

fn into_delivery(resp: AtHomeResponse) -> Result<DeliveryInfo, ApiError> {
    let result = resp.result.unwrap_or_default();
    if result != "ok" {
        return Err(ApiError::ResultNotOk(result));
    }
    let base_url = resp
        .base_url
        .filter(|s| !s.trim().is_empty())
        .ok_or(ApiError::Incomplete("baseUrl"))?;
    let chapter = resp.chapter.ok_or(ApiError::Incomplete("chapter"))?;
    let hash = chapter
        .hash
        .filter(|s| !s.trim().is_empty())
        .ok_or(ApiError::Incomplete("chapter.hash"))?;
    let data = chapter
        .data
        .filter(|d| !d.is_empty())
        .ok_or(ApiError::Incomplete("chapter.data"))?;
    Ok(DeliveryInfo {
        base_url,
        hash,
        data,
        data_saver: chapter.data_saver.unwrap_or_default(),
    })
}

impl CatalogApi for MangaDexClient {
    fn search_works(&self, title: &str, limit: usize) -> Result<Vec<WorkCandidate>, ApiError> {
        let url = format!("{}/manga", self.config.api_base);
        let limit = limit.max(1).to_string();
        let req = self.client.get(&url).query(&[
            ("title", title),
            ("limit", limit.as_str()),
            ("order[relevance]", "desc"),
        ]);
        let resp: ListResponse<MangaData> = self.get_json(&url, req)?;
        Ok(resp
            .data
            .unwrap_or_default()
            .into_iter()
            .map(into_candidate)
            .collect())
    }

    fn chapter_page(&self, query: &ChapterQuery<'_>) -> Result<ChapterPage, ApiError> {
        let url = format!("{}/chapter", self.config.api_base);
        let mut params: Vec<(&str, String)> = vec![
            ("manga", query.work_id.to_string()),
            ("translatedLanguage[]", query.locale.to_string()),
            ("includes[]", "scanlation_group".to_string()),
            ("order[volume]", "asc".to_string()),
            ("order[chapter]", "asc".to_string()),
            ("limit", query.limit.to_string()),
            ("offset", query.offset.to_string()),
        ];
        for rating in query.content_ratings {
            params.push(("contentRating[]", rating.clone()));
        }
        let req = self.client.get(&url).query(&params);
        let resp: ListResponse<ChapterData> = self.get_json(&url, req)?;
        Ok(ChapterPage {
            items: resp
                .data
                .unwrap_or_default()
                .into_iter()
                .map(into_raw_chapter)
                .collect(),
            total: resp.total,
        })
    }

    fn delivery(&self, chapter_id: &str) -> Result<DeliveryInfo, ApiError> {
        let url = format!("{}/at-home/server/{}", self.config.api_base, chapter_id);
        let req = self
            .client
            .get(&url)
            .query(&[("forcePort443", self.config.force_port_443.to_string())]);
        let resp: AtHomeResponse = self.get_json(&url, req)?;
        into_delivery(resp)
    }
}

impl AssetTransport for MangaDexClient {
    fn open(&self, url: &str) -> Result<AssetBody, FetchError> {
        let resp = self
            .client
            .get(url)
            .header(ACCEPT, "image/*,*/*")
            .timeout(self.config.asset_timeout)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout
                } else if let Some(err) = e.status().and_then(|s| FetchError::from_status(s.as_u16())) {
                    err
                } else {
                    FetchError::Transport(e.to_string())
                }
            })?;
        let status = resp.status().as_u16();
        if let Some(err) = FetchError::from_status(status) {
            return Err(err);
        }
        if !resp.status().is_success() {
            return Err(FetchError::Transport(format!("unexpected HTTP {status}")));
        }
        Ok(Box::new(AssetResponse(resp)))
    }
}

/// 读取过程中的超时统一映射为 `io::ErrorKind::TimedOut`，便于上层按超时退避。
struct AssetResponse(Response);

impl Read for AssetResponse {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf).map_err(|e| {
            let timed_out = e.kind() == io::ErrorKind::TimedOut
                || e
                    .get_ref()
                    .and_then(|inner| inner.downcast_ref::<reqwest::Error>())
                    .is_some_and(reqwest::Error::is_timeout);
            if timed_out {
                io::Error::new(io::ErrorKind::TimedOut, e.to_string())
            } else {
                e
            }
        })
    }
}
