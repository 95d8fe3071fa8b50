//! 测试用的内存假实现：目录服务、图片传输与记录型 Sleeper。

use std::collections::{HashMap, VecDeque};
use std::io::{self, Cursor, Read};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::base_system::cooldown_retry::Sleeper;
use crate::network_parser::api::{
    ApiError, AssetBody, AssetTransport, CatalogApi, ChapterPage, ChapterQuery, DeliveryInfo,
    FetchError, RawChapter, WorkCandidate,
};

#[derive(Default)]
pub struct RecordingSleeper {
    calls: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn calls(&self) -> Vec<Duration> {
        self.calls.lock().unwrap().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.calls.lock().unwrap().push(duration);
    }
}

#[derive(Default)]
pub struct FakeCatalog {
    pub candidates: Vec<WorkCandidate>,
    pub search_error: Option<ApiError>,
    /// 第 n 次分页请求返回 `pages[n]`，超出范围返回空页。
    pub pages: Vec<ChapterPage>,
    pub page_error_at: Option<(usize, ApiError)>,
    pub deliveries: HashMap<String, Result<DeliveryInfo, ApiError>>,
    pub panic_on_delivery: Option<String>,
    pub page_requests: Mutex<Vec<(usize, usize)>>,
    pub delivery_calls: AtomicUsize,
}

impl FakeCatalog {
    pub fn with_delivery(mut self, chapter_id: &str, info: DeliveryInfo) -> Self {
        self.deliveries.insert(chapter_id.to_string(), Ok(info));
        self
    }

    pub fn page_requests(&self) -> Vec<(usize, usize)> {
        self.page_requests.lock().unwrap().clone()
    }

    pub fn delivery_calls(&self) -> usize {
        self.delivery_calls.load(Ordering::SeqCst)
    }
}

impl CatalogApi for FakeCatalog {
    fn search_works(&self, _title: &str, limit: usize) -> Result<Vec<WorkCandidate>, ApiError> {
        if let Some(err) = &self.search_error {
            return Err(err.clone());
        }
        Ok(self.candidates.iter().take(limit).cloned().collect())
    }

    fn chapter_page(&self, query: &ChapterQuery<'_>) -> Result<ChapterPage, ApiError> {
        let idx = {
            let mut reqs = self.page_requests.lock().unwrap();
            reqs.push((query.limit, query.offset));
            reqs.len() - 1
        };
        if let Some((at, err)) = &self.page_error_at
            && *at == idx
        {
            return Err(err.clone());
        }
        Ok(self.pages.get(idx).cloned().unwrap_or_default())
    }

    fn delivery(&self, chapter_id: &str) -> Result<DeliveryInfo, ApiError> {
        self.delivery_calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_delivery.as_deref() == Some(chapter_id) {
            panic!("delivery lookup exploded for {chapter_id}");
        }
        self.deliveries
            .get(chapter_id)
            .cloned()
            .unwrap_or_else(|| {
                Err(ApiError::Status {
                    status: 404,
                    url: format!("/at-home/server/{chapter_id}"),
                })
            })
    }
}

pub fn raw(id: &str, number: Option<&str>) -> RawChapter {
    RawChapter {
        id: id.to_string(),
        chapter: number.map(str::to_string),
        title: None,
    }
}

pub fn delivery(files: &[&str]) -> DeliveryInfo {
    DeliveryInfo {
        base_url: "https://node.test".to_string(),
        hash: "h".to_string(),
        data: files.iter().map(|f| f.to_string()).collect(),
        data_saver: Vec::new(),
    }
}

/// 单次请求的脚本化结果。
#[derive(Debug, Clone)]
pub enum Scripted {
    Timeout,
    Status(u16),
    Body(Vec<u8>),
    /// 先给出部分数据，随后读取失败。
    Broken(Vec<u8>),
}

#[derive(Default)]
pub struct FakeTransport {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn script(&self, url: &str, steps: Vec<Scripted>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .extend(steps);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl AssetTransport for FakeTransport {
    fn open(&self, url: &str) -> Result<AssetBody, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(VecDeque::pop_front);
        match step {
            None => Err(FetchError::Client(404)),
            Some(Scripted::Timeout) => Err(FetchError::Timeout),
            Some(Scripted::Status(code)) => Err(FetchError::from_status(code)
                .unwrap_or_else(|| FetchError::Transport(format!("HTTP {code}")))),
            Some(Scripted::Body(bytes)) => Ok(Box::new(Cursor::new(bytes))),
            Some(Scripted::Broken(prefix)) => Ok(Box::new(BrokenReader {
                data: Cursor::new(prefix),
            })),
        }
    }
}

struct BrokenReader {
    data: Cursor<Vec<u8>>,
}

impl Read for BrokenReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.data.read(buf)? {
            0 => Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset")),
            n => Ok(n),
        }
    }
}
