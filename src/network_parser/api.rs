//! 远端目录/分发服务的抽象接口。
//!
//! 核心流程只依赖这里的 trait，真实实现见 `network`，测试使用内存假实现。

use std::io::Read;

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("http status {status} from {url}")]
    Status { status: u16, url: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("server reported result={0}")]
    ResultNotOk(String),
    #[error("incomplete delivery response: missing {0}")]
    Incomplete(&'static str),
}

impl ApiError {
    /// 请求本身失败（网络/状态码），区别于响应内容异常。
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ApiError::Timeout(_) | ApiError::Status { .. } | ApiError::Transport(_)
        )
    }
}

/// 单张图片请求的失败分类。
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("timed out")]
    Timeout,
    #[error("server error (HTTP {0})")]
    Server(u16),
    #[error("client error (HTTP {0})")]
    Client(u16),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("stream interrupted: {0}")]
    Stream(String),
    #[error("empty response body")]
    EmptyBody,
    #[error("local write failed: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// 4xx 与本地写入失败不重试，其余均视为暂时性错误。
    pub fn is_transient(&self) -> bool {
        !matches!(self, FetchError::Client(_) | FetchError::Io(_))
    }

    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            400..=499 => Some(FetchError::Client(status)),
            500..=599 => Some(FetchError::Server(status)),
            _ => None,
        }
    }
}

/// 搜索结果中的一个候选作品；`titles` 保持服务端给出的语言顺序。
#[derive(Debug, Clone, PartialEq)]
pub struct WorkCandidate {
    pub id: String,
    pub titles: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawChapter {
    pub id: String,
    pub chapter: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChapterPage {
    pub items: Vec<RawChapter>,
    pub total: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
pub struct ChapterQuery<'a> {
    pub work_id: &'a str,
    pub locale: &'a str,
    pub limit: usize,
    pub offset: usize,
    pub content_ratings: &'a [String],
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryInfo {
    pub base_url: String,
    pub hash: String,
    pub data: Vec<String>,
    pub data_saver: Vec<String>,
}

impl DeliveryInfo {
    /// 压缩版列表为空时退回原图列表。
    pub fn files(&self, data_saver: bool) -> (&'static str, &[String]) {
        if data_saver && !self.data_saver.is_empty() {
            ("data-saver", &self.data_saver)
        } else {
            ("data", &self.data)
        }
    }

    pub fn asset_url(&self, quality: &str, file_name: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            quality,
            self.hash,
            file_name
        )
    }
}

pub trait CatalogApi: Send + Sync {
    fn search_works(&self, title: &str, limit: usize) -> Result<Vec<WorkCandidate>, ApiError>;
    fn chapter_page(&self, query: &ChapterQuery<'_>) -> Result<ChapterPage, ApiError>;
    fn delivery(&self, chapter_id: &str) -> Result<DeliveryInfo, ApiError>;
}

pub type AssetBody = Box<dyn Read + Send>;

/// 打开图片响应流；非 2xx 状态必须映射为 `FetchError`。
pub trait AssetTransport: Send + Sync {
    fn open(&self, url: &str) -> Result<AssetBody, FetchError>;
}
