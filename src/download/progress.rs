//! 下载事件上报与 CLI 进度条管理。
//!
//! 核心流程只产生 `DownloadEvent`；界面层通过回调把事件翻译成本地化文本，
//! 有进度条时经由 `MultiProgress` 打印，避免文本与进度条互相覆盖。

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::models::{AssetOutcome, ChapterOutcome, ChapterPhase, DownloadResult};

#[derive(Debug, Clone, PartialEq)]
pub enum DownloadEvent {
    BatchStarted {
        total: usize,
    },
    ChapterStarted {
        index: usize,
        total: usize,
        chapter_id: String,
        label: String,
    },
    ChapterPhase {
        chapter_id: String,
        phase: ChapterPhase,
    },
    AssetsPlanned {
        chapter_id: String,
        total: usize,
        pending: usize,
    },
    AssetFinished {
        chapter_id: String,
        sequence: usize,
        outcome: AssetOutcome,
    },
    ChapterFinished {
        index: usize,
        total: usize,
        label: String,
        outcome: ChapterOutcome,
    },
    BatchFinished {
        result: DownloadResult,
    },
}

/// 回调返回 `Some(text)` 时由上报器负责输出该文本。
pub type EventCallback = Box<dyn FnMut(&DownloadEvent) -> Option<String> + Send>;

struct CliBars {
    mp: MultiProgress,
    chapter_bar: ProgressBar,
    asset_bar: ProgressBar,
}

pub struct ProgressReporter {
    cb: Option<EventCallback>,
    cli: Option<CliBars>,
}

impl ProgressReporter {
    #[cfg(test)]
    pub fn silent() -> Self {
        Self {
            cb: None,
            cli: None,
        }
    }

    pub fn with_callback(cb: EventCallback) -> Self {
        Self {
            cb: Some(cb),
            cli: None,
        }
    }

    /// 启用两条进度条（章节 / 当前章节图片），输出到 stderr。
    pub fn with_cli_bars(mut self, chapter_prefix: &str, asset_prefix: &str) -> Self {
        let mp = MultiProgress::with_draw_target(ProgressDrawTarget::stderr());
        let style = ProgressStyle::with_template(
            "{prefix} [{elapsed_precise}] {wide_bar} {pos}/{len} ({eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

        let chapter_bar = mp.add(ProgressBar::new(0));
        chapter_bar.set_style(style.clone());
        chapter_bar.set_prefix(chapter_prefix.to_string());

        let asset_bar = mp.add(ProgressBar::new(0));
        asset_bar.set_style(style);
        asset_bar.set_prefix(asset_prefix.to_string());

        self.cli = Some(CliBars {
            mp,
            chapter_bar,
            asset_bar,
        });
        self
    }

    pub fn emit(&mut self, event: DownloadEvent) {
        if let Some(cli) = self.cli.as_ref() {
            match &event {
                DownloadEvent::BatchStarted { total } => {
                    cli.chapter_bar.set_length(*total as u64);
                    cli.chapter_bar.set_position(0);
                }
                DownloadEvent::AssetsPlanned { pending, .. } => {
                    cli.asset_bar.set_length(*pending as u64);
                    cli.asset_bar.set_position(0);
                }
                DownloadEvent::AssetFinished { .. } => cli.asset_bar.inc(1),
                DownloadEvent::ChapterFinished { .. } => {
                    cli.chapter_bar.inc(1);
                    cli.asset_bar.set_length(0);
                    cli.asset_bar.set_position(0);
                }
                _ => {}
            }
        }

        let Some(cb) = self.cb.as_mut() else {
            return;
        };
        if let Some(text) = cb(&event) {
            self.println(&text);
        }
    }

    pub fn println(&self, text: &str) {
        match self.cli.as_ref() {
            Some(cli) => {
                if cli.mp.println(text).is_err() {
                    eprintln!("{text}");
                }
            }
            None => println!("{text}"),
        }
    }

    pub fn finish_cli_bars(&mut self) {
        let Some(cli) = self.cli.take() else {
            return;
        };
        cli.asset_bar.finish_and_clear();
        cli.chapter_bar.finish_and_clear();
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.finish_cli_bars();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn callback_sees_every_event_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut reporter = ProgressReporter::with_callback(Box::new(move |evt| {
            sink.lock().unwrap().push(evt.clone());
            None
        }));
        reporter.emit(DownloadEvent::BatchStarted { total: 1 });
        reporter.emit(DownloadEvent::BatchFinished {
            result: DownloadResult::default(),
        });
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], DownloadEvent::BatchStarted { total: 1 });
    }

    #[test]
    fn silent_reporter_accepts_events() {
        let mut reporter = ProgressReporter::silent();
        reporter.emit(DownloadEvent::BatchStarted { total: 3 });
        assert!(reporter.cli.is_none());
    }
}
