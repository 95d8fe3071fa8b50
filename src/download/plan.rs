//! 章节目录拉取与下载计划准备。
//!
//! 分页拉取某作品在指定语言下的全部章节，排序后与作品信息组成 `DownloadPlan`。

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::models::{Chapter, DownloadPlan, FilesystemError, Work, sort_chapters};
use crate::base_system::context::Config;
use crate::network_parser::api::{ApiError, CatalogApi, ChapterQuery};

#[derive(Debug, Error)]
pub enum EnumerationError {
    #[error("chapter listing request failed: {0}")]
    Transport(#[source] ApiError),
    #[error("unexpected chapter listing response: {0}")]
    Unexpected(String),
}

impl From<ApiError> for EnumerationError {
    fn from(e: ApiError) -> Self {
        if e.is_transport() {
            EnumerationError::Transport(e)
        } else {
            EnumerationError::Unexpected(e.to_string())
        }
    }
}

#[derive(Debug, Clone)]
pub struct CatalogOptions {
    pub page_size: usize,
    pub content_ratings: Vec<String>,
}

impl From<&Config> for CatalogOptions {
    fn from(cfg: &Config) -> Self {
        Self {
            page_size: cfg.chapters_per_page.clamp(1, 500),
            content_ratings: cfg.content_ratings.clone(),
        }
    }
}

/// 拉取完整章节列表（已排序）。任一页失败则整体失败，不返回部分结果。
pub fn fetch_chapters(
    api: &dyn CatalogApi,
    work_id: &str,
    locale: &str,
    options: &CatalogOptions,
) -> Result<Vec<Chapter>, EnumerationError> {
    let mut chapters: Vec<Chapter> = Vec::new();
    let mut declared_total: Option<usize> = None;
    let mut offset = 0usize;

    loop {
        let query = ChapterQuery {
            work_id,
            locale,
            limit: options.page_size,
            offset,
            content_ratings: &options.content_ratings,
        };
        let page = api.chapter_page(&query).map_err(|e| {
            warn!(target: "catalog", work_id, locale, offset, error = %e, "章节列表请求失败");
            EnumerationError::from(e)
        })?;

        if declared_total.is_none() {
            declared_total = Some(page.total.unwrap_or(0));
        }
        if page.items.is_empty() {
            break;
        }

        offset += page.items.len();
        chapters.extend(page.items.into_iter().map(|raw| Chapter::from_raw(raw, locale)));
        debug!(target: "catalog", fetched = chapters.len(), total = ?declared_total, "章节分页");

        if let Some(total) = declared_total
            && total > 0
            && chapters.len() >= total
        {
            break;
        }
    }

    sort_chapters(&mut chapters);
    info!(target: "catalog", work_id, locale, count = chapters.len(), "章节列表获取完成");
    Ok(chapters)
}

/// 拉取目录并组装下载计划。
pub fn prepare_download_plan(
    api: &dyn CatalogApi,
    work: Work,
    locale: &str,
    options: &CatalogOptions,
) -> Result<DownloadPlan, EnumerationError> {
    let chapters = fetch_chapters(api, &work.id, locale, options)?;
    Ok(DownloadPlan { work, chapters })
}

/// 创建 `<root>/<作品名>` 目录。
pub fn prepare_work_dir(root: &Path, work: &Work) -> Result<PathBuf, FilesystemError> {
    let dir = root.join(&work.sanitized_name);
    fs::create_dir_all(&dir).map_err(|source| FilesystemError::DirectoryCreateFailed {
        path: dir.clone(),
        source,
    })?;
    Ok(dir)
}
