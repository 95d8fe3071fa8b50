//! 批量下载主流程编排。
//!
//! 按顺序逐章调用 `ChapterDownloader`，每章之间按配置等待，统计成功/无图片/失败章数。
//! 单章内的任何错误（包括 panic）只影响该章。

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use super::chapter::ChapterDownloader;
use super::fetcher::AssetFetcher;
use super::models::{Chapter, ChapterOutcome, ChapterPhase, DownloadResult};
use super::progress::{DownloadEvent, ProgressReporter};
use crate::base_system::context::Config;
use crate::base_system::cooldown_retry::{BackoffPolicy, Sleeper, ThreadSleeper};
use crate::base_system::file_cleaner::remove_dir_if_empty;
use crate::network_parser::api::{AssetTransport, CatalogApi};

pub struct BatchDownloader {
    chapters: ChapterDownloader,
    delay: Duration,
    sleeper: Arc<dyn Sleeper>,
}

impl BatchDownloader {
    pub fn new(chapters: ChapterDownloader, delay: Duration, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            chapters,
            delay,
            sleeper,
        }
    }

    /// 按配置组装整条下载链路（共享一个工作池）。
    pub fn from_config(
        config: &Config,
        api: Arc<dyn CatalogApi>,
        transport: Arc<dyn AssetTransport>,
    ) -> std::io::Result<Self> {
        let sleeper: Arc<dyn Sleeper> = Arc::new(ThreadSleeper);
        let fetcher = AssetFetcher::new(
            transport,
            BackoffPolicy::with_max_attempts(config.max_retries),
            Arc::clone(&sleeper),
        );
        let chapters = ChapterDownloader::new(api, fetcher, config.clone())?;
        Ok(Self::new(chapters, config.chapter_delay(), sleeper))
    }

    pub fn run(
        &self,
        chapters: &[Chapter],
        work_dir: &Path,
        progress: &mut ProgressReporter,
    ) -> DownloadResult {
        let total = chapters.len();
        let start = Instant::now();
        let mut result = DownloadResult::default();

        info!(target: "download", total, dir = %work_dir.display(), "开始批量下载");
        progress.emit(DownloadEvent::BatchStarted { total });

        for (idx, chapter) in chapters.iter().enumerate() {
            let index = idx + 1;
            progress.emit(DownloadEvent::ChapterStarted {
                index,
                total,
                chapter_id: chapter.id.clone(),
                label: chapter.display_label.clone(),
            });
            progress.emit(DownloadEvent::ChapterPhase {
                chapter_id: chapter.id.clone(),
                phase: ChapterPhase::Pending,
            });

            let outcome = self.run_one(chapter, work_dir, progress);
            result.record(&outcome);
            progress.emit(DownloadEvent::ChapterFinished {
                index,
                total,
                label: chapter.display_label.clone(),
                outcome,
            });

            if index < total && !self.delay.is_zero() {
                self.sleeper.sleep(self.delay);
            }
        }

        info!(
            target: "download",
            total = result.total(),
            success = result.success,
            no_assets = result.no_assets,
            failed = result.failed,
            "批量下载结束，用时 {:.1}s",
            start.elapsed().as_secs_f32()
        );
        progress.emit(DownloadEvent::BatchFinished { result });
        result
    }

    fn run_one(
        &self,
        chapter: &Chapter,
        work_dir: &Path,
        progress: &mut ProgressReporter,
    ) -> ChapterOutcome {
        let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
            self.chapters.download(chapter, work_dir, progress)
        }));
        match attempt {
            Ok(Ok(files)) if files.assets.is_empty() => {
                if let Err(e) = remove_dir_if_empty(&files.dir) {
                    warn!(target: "download", dir = %files.dir.display(), error = %e, "删除空章节目录失败");
                }
                warn!(target: "download", chapter = %chapter.display_label, "章节没有成功下载的图片");
                ChapterOutcome::NoAssets
            }
            Ok(Ok(files)) => {
                info!(
                    target: "download",
                    chapter = %chapter.display_label,
                    images = files.assets.len(),
                    "章节下载完成"
                );
                ChapterOutcome::Success(files.assets)
            }
            Ok(Err(e)) => {
                error!(target: "download", chapter = %chapter.display_label, error = %e, "章节下载失败");
                ChapterOutcome::Failed(e.to_string())
            }
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                error!(target: "download", chapter = %chapter.display_label, reason = %reason, "章节下载异常");
                ChapterOutcome::Failed(reason)
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
