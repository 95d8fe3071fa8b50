//! 单张图片下载：有限次重试 + 失败分类。
//!
//! 数据先写入 `<目标>.part`，完整且非空时才重命名为目标文件；
//! 其余任何退出路径（含 panic 展开）都会删除临时文件。

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, warn};

use super::models::AssetOutcome;
use crate::base_system::cooldown_retry::{BackoffPolicy, FailureKind, Sleeper};
use crate::network_parser::api::{AssetTransport, FetchError};

const CHUNK_SIZE: usize = 16 * 1024;

pub struct AssetFetcher {
    transport: Arc<dyn AssetTransport>,
    policy: BackoffPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl AssetFetcher {
    pub fn new(
        transport: Arc<dyn AssetTransport>,
        policy: BackoffPolicy,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            transport,
            policy,
            sleeper,
        }
    }

    pub fn fetch(&self, url: &str, target: &Path) -> AssetOutcome {
        let file = display_name(target);
        let max = self.policy.max_attempts.max(1);

        for attempt in 0..max {
            let err = match self.try_once(url, target) {
                Ok(bytes) => {
                    debug!(target: "fetch", file = %file, bytes, attempt = attempt + 1, "图片下载完成");
                    return AssetOutcome::Success;
                }
                Err(e) => e,
            };

            if !err.is_transient() {
                warn!(target: "fetch", file = %file, url, error = %err, "图片下载失败，不再重试");
                return AssetOutcome::PermanentFailure;
            }
            let kind = match err {
                FetchError::Timeout => FailureKind::Timeout,
                FetchError::EmptyBody => FailureKind::EmptyBody,
                _ => FailureKind::Transient,
            };
            warn!(
                target: "fetch",
                file = %file,
                attempt = attempt + 1,
                max,
                error = %err,
                "图片下载失败"
            );
            if !self.policy.wait_before_retry(self.sleeper.as_ref(), kind, attempt) {
                break;
            }
        }

        error!(target: "fetch", file = %file, url, "重试次数用尽，放弃该图片");
        AssetOutcome::ExhaustedRetries
    }

    fn try_once(&self, url: &str, target: &Path) -> Result<u64, FetchError> {
        let mut body = self.transport.open(url)?;
        let mut part = PartialFile::create(target)?;
        let written = copy_body(&mut body, part.writer())?;
        if written == 0 {
            return Err(FetchError::EmptyBody);
        }
        part.commit()?;
        Ok(written)
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn copy_body(body: &mut dyn Read, out: &mut dyn Write) -> Result<u64, FetchError> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let n = match body.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == io::ErrorKind::TimedOut => return Err(FetchError::Timeout),
            Err(e) => return Err(FetchError::Stream(e.to_string())),
        };
        out.write_all(&buf[..n])?;
        total += n as u64;
    }
    Ok(total)
}

/// `<目标>.part` 临时文件；未 `commit` 即被丢弃时删除自身。
struct PartialFile {
    tmp: PathBuf,
    target: PathBuf,
    file: Option<BufWriter<File>>,
    committed: bool,
}

impl PartialFile {
    fn create(target: &Path) -> io::Result<Self> {
        let mut tmp: OsString = target.as_os_str().to_owned();
        tmp.push(".part");
        let tmp = PathBuf::from(tmp);
        let file = File::create(&tmp)?;
        Ok(Self {
            tmp,
            target: target.to_path_buf(),
            file: Some(BufWriter::new(file)),
            committed: false,
        })
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self.file.as_mut() {
            Some(w) => w as &mut dyn Write,
            None => unreachable!("writer used after commit"),
        }
    }

    fn commit(mut self) -> io::Result<()> {
        if let Some(w) = self.file.take() {
            let file = w.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
        }
        fs::rename(&self.tmp, &self.target)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        self.file.take();
        let _ = fs::remove_file(&self.tmp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::test_support::{FakeTransport, RecordingSleeper, Scripted};
    use std::time::Duration;

    const URL: &str = "https://node.test/data/h/1.png";

    fn fetcher(transport: &Arc<FakeTransport>, sleeper: &Arc<RecordingSleeper>) -> AssetFetcher {
        AssetFetcher::new(
            transport.clone(),
            BackoffPolicy::with_max_attempts(3),
            sleeper.clone(),
        )
    }

    fn part_path(target: &Path) -> PathBuf {
        let mut p = target.as_os_str().to_owned();
        p.push(".part");
        PathBuf::from(p)
    }

    #[test]
    fn two_timeouts_then_success() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("001.png");
        let transport = Arc::new(FakeTransport::default());
        transport.script(
            URL,
            vec![
                Scripted::Timeout,
                Scripted::Timeout,
                Scripted::Body(b"png-bytes".to_vec()),
            ],
        );
        let sleeper = Arc::new(RecordingSleeper::default());

        let outcome = fetcher(&transport, &sleeper).fetch(URL, &target);

        assert_eq!(outcome, AssetOutcome::Success);
        assert_eq!(transport.calls(), vec![URL.to_string(); 3]);
        assert_eq!(fs::read(&target).unwrap(), b"png-bytes");
        assert_eq!(
            sleeper.calls(),
            vec![Duration::from_secs(3), Duration::from_secs(4)]
        );
        assert!(!part_path(&target).exists());
    }

    #[test]
    fn client_error_is_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("001.png");
        let transport = Arc::new(FakeTransport::default());
        transport.script(URL, vec![Scripted::Status(404)]);
        let sleeper = Arc::new(RecordingSleeper::default());

        let outcome = fetcher(&transport, &sleeper).fetch(URL, &target);

        assert_eq!(outcome, AssetOutcome::PermanentFailure);
        assert_eq!(transport.call_count(), 1);
        assert!(sleeper.calls().is_empty());
        assert!(!target.exists());
    }

    #[test]
    fn empty_body_and_server_errors_are_retried() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("002.jpg");
        let transport = Arc::new(FakeTransport::default());
        transport.script(
            URL,
            vec![
                Scripted::Body(Vec::new()),
                Scripted::Status(503),
                Scripted::Body(b"ok".to_vec()),
            ],
        );
        let sleeper = Arc::new(RecordingSleeper::default());

        let outcome = fetcher(&transport, &sleeper).fetch(URL, &target);

        assert_eq!(outcome, AssetOutcome::Success);
        assert_eq!(
            sleeper.calls(),
            vec![Duration::from_secs(1), Duration::from_secs(3)]
        );
    }

    #[test]
    fn exhausted_retries_leave_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("003.jpg");
        let transport = Arc::new(FakeTransport::default());
        transport.script(
            URL,
            vec![
                Scripted::Broken(b"half".to_vec()),
                Scripted::Broken(b"half".to_vec()),
                Scripted::Broken(b"half".to_vec()),
            ],
        );
        let sleeper = Arc::new(RecordingSleeper::default());

        let outcome = fetcher(&transport, &sleeper).fetch(URL, &target);

        assert_eq!(outcome, AssetOutcome::ExhaustedRetries);
        assert_eq!(transport.call_count(), 3);
        // 最后一次失败后不再等待
        assert_eq!(sleeper.calls().len(), 2);
        assert!(!target.exists());
        assert!(!part_path(&target).exists());
    }

    #[test]
    fn unwritable_target_is_permanent() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("missing").join("001.jpg");
        let transport = Arc::new(FakeTransport::default());
        transport.script(URL, vec![Scripted::Body(b"data".to_vec())]);
        let sleeper = Arc::new(RecordingSleeper::default());

        let outcome = fetcher(&transport, &sleeper).fetch(URL, &target);

        assert_eq!(outcome, AssetOutcome::PermanentFailure);
        assert!(sleeper.calls().is_empty());
    }
}
