//! 单章下载：获取分发节点、规划图片、跳过已完成文件、并发拉取剩余图片。

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::fetcher::AssetFetcher;
use super::models::{AssetDescriptor, AssetOutcome, Chapter, ChapterPhase, FilesystemError};
use super::progress::{DownloadEvent, ProgressReporter};
use super::worker_pool::WorkerPool;
use crate::base_system::context::Config;
use crate::base_system::file_cleaner::{has_content, remove_if_empty_file};
use crate::network_parser::api::{ApiError, CatalogApi, DeliveryInfo};

const DEFAULT_EXTENSION: &str = ".jpg";

#[derive(Debug, Error)]
pub enum ChapterError {
    #[error("delivery lookup failed: {0}")]
    Delivery(#[from] ApiError),
    #[error(transparent)]
    Filesystem(#[from] FilesystemError),
}

/// 一章在磁盘上的结果：目录与按序号排列的非空图片文件。
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterFiles {
    pub dir: PathBuf,
    pub assets: Vec<PathBuf>,
}

pub struct ChapterDownloader {
    api: Arc<dyn CatalogApi>,
    fetcher: Arc<AssetFetcher>,
    pool: WorkerPool,
    config: Config,
}

impl ChapterDownloader {
    pub fn new(
        api: Arc<dyn CatalogApi>,
        fetcher: AssetFetcher,
        config: Config,
    ) -> std::io::Result<Self> {
        let pool = WorkerPool::new("asset", config.max_workers)?;
        debug!(target: "download", workers = pool.size(), "图片下载工作池就绪");
        Ok(Self {
            api,
            fetcher: Arc::new(fetcher),
            pool,
            config,
        })
    }

    pub fn chapter_dir(&self, chapter: &Chapter, work_dir: &Path) -> PathBuf {
        work_dir.join(
            self.config
                .chapter_folder_name(&chapter.display_label, &chapter.id),
        )
    }

    pub fn download(
        &self,
        chapter: &Chapter,
        work_dir: &Path,
        progress: &mut ProgressReporter,
    ) -> Result<ChapterFiles, ChapterError> {
        progress.emit(DownloadEvent::ChapterPhase {
            chapter_id: chapter.id.clone(),
            phase: ChapterPhase::FetchingMetadata,
        });
        let delivery = self.api.delivery(&chapter.id).map_err(|e| {
            warn!(target: "download", chapter = %chapter.display_label, error = %e, "获取图片服务器失败");
            e
        })?;

        let dir = self.chapter_dir(chapter, work_dir);
        fs::create_dir_all(&dir).map_err(|source| FilesystemError::DirectoryCreateFailed {
            path: dir.clone(),
            source,
        })?;

        progress.emit(DownloadEvent::ChapterPhase {
            chapter_id: chapter.id.clone(),
            phase: ChapterPhase::PlanningAssets,
        });
        let plan = plan_assets(&chapter.id, &delivery, self.config.data_saver, &dir);

        let mut pending: Vec<AssetDescriptor> = Vec::new();
        for asset in &plan {
            if has_content(&asset.target_path) {
                continue;
            }
            if let Err(e) = remove_if_empty_file(&asset.target_path) {
                warn!(target: "download", path = %asset.target_path.display(), error = %e, "删除空文件失败");
            }
            pending.push(asset.clone());
        }
        progress.emit(DownloadEvent::AssetsPlanned {
            chapter_id: chapter.id.clone(),
            total: plan.len(),
            pending: pending.len(),
        });
        debug!(
            target: "download",
            chapter = %chapter.display_label,
            total = plan.len(),
            pending = pending.len(),
            "图片计划"
        );

        if pending.is_empty() {
            info!(target: "download", chapter = %chapter.display_label, "没有需要下载的新图片");
        } else {
            progress.emit(DownloadEvent::ChapterPhase {
                chapter_id: chapter.id.clone(),
                phase: ChapterPhase::FetchingAssets,
            });
            let tasks = pending.into_iter().map(|asset| {
                let fetcher = Arc::clone(&self.fetcher);
                move || {
                    let outcome = fetcher.fetch(&asset.source_url, &asset.target_path);
                    (asset, outcome)
                }
            });
            for (asset, outcome) in self.pool.scatter(tasks).iter() {
                if outcome != AssetOutcome::Success {
                    warn!(
                        target: "download",
                        chapter = %chapter.display_label,
                        file = %asset.source_filename,
                        ?outcome,
                        "图片下载失败"
                    );
                }
                progress.emit(DownloadEvent::AssetFinished {
                    chapter_id: chapter.id.clone(),
                    sequence: asset.sequence,
                    outcome,
                });
            }
        }

        let assets: Vec<PathBuf> = plan
            .into_iter()
            .map(|a| a.target_path)
            .filter(|p| has_content(p))
            .collect();
        Ok(ChapterFiles { dir, assets })
    }
}

/// 按服务端顺序生成 `001.ext`、`002.ext`……，保留原扩展名，缺失时用 `.jpg`。
pub fn plan_assets(
    chapter_id: &str,
    delivery: &DeliveryInfo,
    data_saver: bool,
    dir: &Path,
) -> Vec<AssetDescriptor> {
    let (quality, files) = delivery.files(data_saver);
    files
        .iter()
        .enumerate()
        .map(|(idx, file)| {
            let sequence = idx + 1;
            AssetDescriptor {
                chapter_id: chapter_id.to_string(),
                sequence,
                source_filename: file.clone(),
                source_url: delivery.asset_url(quality, file),
                target_path: dir.join(format!("{sequence:03}{}", extension_of(file))),
            }
        })
        .collect()
}

fn extension_of(file: &str) -> String {
    Path::new(file)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{e}"))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base_system::cooldown_retry::BackoffPolicy;
    use crate::download::models::chapter;
    use crate::download::test_support::{
        FakeCatalog, FakeTransport, RecordingSleeper, Scripted, delivery,
    };

    fn downloader(catalog: Arc<FakeCatalog>, transport: Arc<FakeTransport>) -> ChapterDownloader {
        let fetcher = AssetFetcher::new(
            transport,
            BackoffPolicy::with_max_attempts(2),
            Arc::new(RecordingSleeper::default()),
        );
        ChapterDownloader::new(catalog, fetcher, Config::default()).unwrap()
    }

    #[test]
    fn plans_sequence_names_and_urls() {
        let info = delivery(&["a1-x.png", "b2-y", "c3.jpeg"]);
        let plan = plan_assets("ch", &info, false, Path::new("/tmp/ch"));
        let names: Vec<_> = plan
            .iter()
            .map(|a| a.target_path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["001.png", "002.jpg", "003.jpeg"]);
        assert_eq!(plan[1].source_url, "https://node.test/data/h/b2-y");
        assert_eq!(plan[2].sequence, 3);
    }

    #[test]
    fn data_saver_uses_compressed_list() {
        let mut info = delivery(&["full.png"]);
        info.data_saver = vec!["small.jpg".to_string()];
        let plan = plan_assets("ch", &info, true, Path::new("d"));
        assert_eq!(plan[0].source_url, "https://node.test/data-saver/h/small.jpg");
        assert_eq!(plan[0].target_path, Path::new("d").join("001.jpg"));
    }

    #[test]
    fn second_run_fetches_nothing_and_returns_same_paths() {
        let root = tempfile::tempdir().unwrap();
        let catalog = Arc::new(
            FakeCatalog::default().with_delivery("ch1", delivery(&["p1.png", "p2.png"])),
        );
        let transport = Arc::new(FakeTransport::default());
        transport.script("https://node.test/data/h/p1.png", vec![Scripted::Body(b"1".to_vec())]);
        transport.script("https://node.test/data/h/p2.png", vec![Scripted::Body(b"2".to_vec())]);
        let dl = downloader(catalog.clone(), transport.clone());
        let ch = chapter("ch1", Some("1"), None);

        let first = dl
            .download(&ch, root.path(), &mut ProgressReporter::silent())
            .unwrap();
        assert_eq!(first.dir, root.path().join("1"));
        assert_eq!(
            first.assets,
            vec![first.dir.join("001.png"), first.dir.join("002.png")]
        );
        assert_eq!(transport.call_count(), 2);

        let second = dl
            .download(&ch, root.path(), &mut ProgressReporter::silent())
            .unwrap();
        assert_eq!(second, first);
        assert_eq!(transport.call_count(), 2);
        assert_eq!(catalog.delivery_calls(), 2);
    }

    #[test]
    fn zero_byte_leftovers_are_refetched() {
        let root = tempfile::tempdir().unwrap();
        let catalog =
            Arc::new(FakeCatalog::default().with_delivery("ch1", delivery(&["p1.png"])));
        let transport = Arc::new(FakeTransport::default());
        transport.script("https://node.test/data/h/p1.png", vec![Scripted::Body(b"x".to_vec())]);
        let dl = downloader(catalog, transport.clone());
        let ch = chapter("ch1", Some("1"), None);

        let dir = root.path().join("1");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("001.png"), b"").unwrap();

        let files = dl
            .download(&ch, root.path(), &mut ProgressReporter::silent())
            .unwrap();
        assert_eq!(files.assets, vec![dir.join("001.png")]);
        assert_eq!(fs::read(dir.join("001.png")).unwrap(), b"x");
        assert_eq!(transport.call_count(), 1);
    }

    #[test]
    fn failed_assets_are_left_out_of_the_result() {
        let root = tempfile::tempdir().unwrap();
        let catalog = Arc::new(
            FakeCatalog::default().with_delivery("ch1", delivery(&["ok.png", "gone.png"])),
        );
        let transport = Arc::new(FakeTransport::default());
        transport.script("https://node.test/data/h/ok.png", vec![Scripted::Body(b"x".to_vec())]);
        let dl = downloader(catalog, transport);

        let files = dl
            .download(
                &chapter("ch1", Some("1"), None),
                root.path(),
                &mut ProgressReporter::silent(),
            )
            .unwrap();
        assert_eq!(files.assets, vec![files.dir.join("001.png")]);
    }

    #[test]
    fn delivery_failure_creates_no_directory() {
        let root = tempfile::tempdir().unwrap();
        let dl = downloader(
            Arc::new(FakeCatalog::default()),
            Arc::new(FakeTransport::default()),
        );
        let err = dl
            .download(
                &chapter("missing", Some("4"), None),
                root.path(),
                &mut ProgressReporter::silent(),
            )
            .unwrap_err();
        assert!(matches!(err, ChapterError::Delivery(ApiError::Status { status: 404, .. })));
        assert!(!root.path().join("4").exists());
    }

    #[test]
    fn parent_dir_title_stays_inside_work_dir() {
        let root = tempfile::tempdir().unwrap();
        let work_dir = root.path().join("Work");
        let catalog =
            Arc::new(FakeCatalog::default().with_delivery("c9", delivery(&["p1.png"])));
        let transport = Arc::new(FakeTransport::default());
        transport.script("https://node.test/data/h/p1.png", vec![Scripted::Body(b"x".to_vec())]);
        let dl = downloader(catalog, transport);

        let ch = chapter("c9", None, Some(".."));
        assert_eq!(ch.display_label, "..");
        let files = dl
            .download(&ch, &work_dir, &mut ProgressReporter::silent())
            .unwrap();
        assert_eq!(files.dir, work_dir.join("id_c9"));
        assert_eq!(files.assets, vec![work_dir.join("id_c9").join("001.png")]);
        assert!(!root.path().join("001.png").exists());
    }

    #[test]
    fn unsafe_label_falls_back_to_chapter_id() {
        let dl = downloader(
            Arc::new(FakeCatalog::default()),
            Arc::new(FakeTransport::default()),
        );
        let ch = chapter("abc-123", None, Some("第一話"));
        assert_eq!(
            dl.chapter_dir(&ch, Path::new("w")),
            Path::new("w").join("id_abc-123")
        );
    }
}
