//! 图片并发下载工作池。
//!
//! 进程内只创建一个，跨章节复用；固定数量的命名工作线程从同一个任务队列取任务。
//! 单个任务 panic 只会丢失该任务的结果，不会拖垮工作线程。

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use crossbeam_channel as channel;
use tracing::{debug, error};

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct WorkerPool {
    tx: Option<channel::Sender<Job>>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(name: &str, workers: usize) -> io::Result<Self> {
        let workers = workers.max(1);
        let (tx, rx) = channel::unbounded::<Job>();

        let mut handles = Vec::with_capacity(workers);
        for idx in 0..workers {
            let rx = rx.clone();
            let handle = thread::Builder::new()
                .name(format!("{name}-{idx}"))
                .spawn(move || {
                    while let Ok(job) = rx.recv() {
                        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                            error!(target: "download", "工作线程任务异常退出");
                        }
                    }
                })?;
            handles.push(handle);
        }
        debug!(target: "download", name, workers, "工作池已启动");

        Ok(Self {
            tx: Some(tx),
            handles,
        })
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    pub fn submit<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        match &self.tx {
            Some(tx) => tx.send(Box::new(job)).is_ok(),
            None => false,
        }
    }

    /// 提交一批任务，返回结果接收端（按完成顺序）。所有任务结束后接收端自动断开；
    /// panic 的任务不产生结果。
    pub fn scatter<T, F, I>(&self, tasks: I) -> channel::Receiver<T>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (result_tx, result_rx) = channel::unbounded::<T>();
        for task in tasks {
            let result_tx = result_tx.clone();
            self.submit(move || {
                let _ = result_tx.send(task());
            });
        }
        result_rx
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.tx.take();
        for h in self.handles.drain(..) {
            let _ = h.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn scatter_collects_all_results() {
        let pool = WorkerPool::new("test", 3).unwrap();
        let mut results: Vec<usize> = pool
            .scatter((0..10).map(|i| move || i * 2))
            .iter()
            .collect();
        results.sort_unstable();
        assert_eq!(results, (0..10).map(|i| i * 2).collect::<Vec<_>>());
    }

    #[test]
    fn concurrency_is_bounded_by_worker_count() {
        let pool = WorkerPool::new("bounded", 2).unwrap();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let tasks = (0..8).map(|_| {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            move || {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(10));
                running.fetch_sub(1, Ordering::SeqCst);
            }
        });
        let done = pool.scatter(tasks).iter().count();
        assert_eq!(done, 8);
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(pool.size(), 2);
    }

    #[test]
    fn panicking_task_does_not_kill_the_pool() {
        let pool = WorkerPool::new("panic", 1).unwrap();
        let results: Vec<u8> = pool
            .scatter(vec![
                Box::new(|| -> u8 { panic!("boom") }) as Box<dyn FnOnce() -> u8 + Send>,
                Box::new(|| 7),
            ])
            .iter()
            .collect();
        assert_eq!(results, vec![7]);

        let again: Vec<u8> = pool.scatter([|| 1u8]).iter().collect();
        assert_eq!(again, vec![1]);
    }
}
