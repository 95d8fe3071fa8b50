//! 下载相关的数据模型定义。
//!
//! 包含作品、章节、图片计划、下载结果与章节状态等核心数据结构。

use std::cmp::Ordering;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::base_system::context::sanitize_name;
use crate::network_parser::api::{RawChapter, WorkCandidate};

const FALLBACK_TITLE: &str = "Unknown_Title";
const FALLBACK_LABEL: &str = "N/A";

#[derive(Debug, Clone, PartialEq)]
pub struct Work {
    pub id: String,
    pub titles: Vec<(String, String)>,
    pub display_title: String,
    pub sanitized_name: String,
}

impl Work {
    pub fn from_candidate(candidate: WorkCandidate) -> Self {
        let display_title = preferred_title(&candidate.titles)
            .unwrap_or(FALLBACK_TITLE)
            .to_string();
        let mut sanitized_name = sanitize_name(&display_title);
        if sanitized_name.is_empty() {
            sanitized_name = format!("id_{}", sanitize_name(&candidate.id));
        }
        Self {
            id: candidate.id,
            titles: candidate.titles,
            display_title,
            sanitized_name,
        }
    }
}

/// 优先英文标题，否则取第一个。
fn preferred_title(titles: &[(String, String)]) -> Option<&str> {
    titles
        .iter()
        .find(|(locale, _)| locale == "en")
        .or_else(|| titles.first())
        .map(|(_, t)| t.as_str())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chapter {
    pub id: String,
    /// 服务端给出的原始章节号字符串，字面量选择按它匹配。
    pub number: Option<String>,
    pub ordinal: Option<f64>,
    pub display_label: String,
    pub locale: String,
}

impl Chapter {
    pub fn from_raw(raw: RawChapter, locale: &str) -> Self {
        let number = raw
            .chapter
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let ordinal = number.as_deref().and_then(parse_ordinal);
        let display_label = number
            .clone()
            .or_else(|| {
                raw.title
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
            })
            .unwrap_or_else(|| FALLBACK_LABEL.to_string());
        Self {
            id: raw.id,
            number,
            ordinal,
            display_label,
            locale: locale.to_string(),
        }
    }
}

pub fn parse_ordinal(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// 按章节号升序；无章节号的排在最后；相同时保持原有顺序（稳定排序）。
pub fn compare_chapters(a: &Chapter, b: &Chapter) -> Ordering {
    match (a.ordinal, b.ordinal) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn sort_chapters(chapters: &mut [Chapter]) {
    chapters.sort_by(compare_chapters);
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssetDescriptor {
    pub chapter_id: String,
    /// 从 1 开始。
    pub sequence: usize,
    pub source_filename: String,
    pub source_url: String,
    pub target_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetOutcome {
    Success,
    PermanentFailure,
    ExhaustedRetries,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChapterOutcome {
    Success(Vec<PathBuf>),
    NoAssets,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterPhase {
    Pending,
    FetchingMetadata,
    PlanningAssets,
    FetchingAssets,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DownloadResult {
    pub success: u32,
    pub no_assets: u32,
    pub failed: u32,
}

impl DownloadResult {
    pub fn record(&mut self, outcome: &ChapterOutcome) {
        match outcome {
            ChapterOutcome::Success(_) => self.success += 1,
            ChapterOutcome::NoAssets => self.no_assets += 1,
            ChapterOutcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.success + self.no_assets + self.failed
    }
}

#[derive(Debug, Error)]
pub enum FilesystemError {
    #[error("failed to create directory {}: {source}", path.display())]
    DirectoryCreateFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct DownloadPlan {
    pub work: Work,
    pub chapters: Vec<Chapter>,
}

#[cfg(test)]
pub(crate) fn chapter(id: &str, number: Option<&str>, title: Option<&str>) -> Chapter {
    Chapter::from_raw(
        RawChapter {
            id: id.to_string(),
            chapter: number.map(str::to_string),
            title: title.map(str::to_string),
        },
        "en",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titles(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(l, t)| (l.to_string(), t.to_string()))
            .collect()
    }

    #[test]
    fn work_name_prefers_english_title() {
        let work = Work::from_candidate(WorkCandidate {
            id: "w1".to_string(),
            titles: titles(&[("ja", "ワンパンマン"), ("en", "One Punch-Man")]),
        });
        assert_eq!(work.display_title, "One Punch-Man");
        assert_eq!(work.sanitized_name, "One_Punch-Man");
    }

    #[test]
    fn work_name_falls_back_to_id_when_unsafe() {
        let work = Work::from_candidate(WorkCandidate {
            id: "1a2b".to_string(),
            titles: titles(&[("ja", "ワンパンマン")]),
        });
        assert_eq!(work.display_title, "ワンパンマン");
        assert_eq!(work.sanitized_name, "id_1a2b");

        let dots = Work::from_candidate(WorkCandidate {
            id: "w9".to_string(),
            titles: titles(&[("en", "..")]),
        });
        assert_eq!(dots.sanitized_name, "id_w9");

        let untitled = Work::from_candidate(WorkCandidate {
            id: "x".to_string(),
            titles: Vec::new(),
        });
        assert_eq!(untitled.sanitized_name, "Unknown_Title");
    }

    #[test]
    fn chapter_label_fallbacks() {
        assert_eq!(chapter("a", Some("10.5"), Some("t")).display_label, "10.5");
        assert_eq!(chapter("b", None, Some("Oneshot")).display_label, "Oneshot");
        assert_eq!(chapter("c", None, None).display_label, "N/A");
        assert_eq!(chapter("d", Some(" "), Some(" ")).display_label, "N/A");

        let extra = chapter("e", Some("Extra"), None);
        assert_eq!(extra.ordinal, None);
        assert_eq!(extra.display_label, "Extra");
    }

    #[test]
    fn ordering_is_numeric_with_nulls_last_and_stable() {
        let mut list = vec![
            chapter("oneshot", None, Some("Oneshot")),
            chapter("c10", Some("10"), None),
            chapter("c2", Some("2"), None),
            chapter("c2-alt", Some("2.0"), None),
            chapter("extra", Some("Extra"), None),
            chapter("c1.5", Some("1.5"), None),
        ];
        sort_chapters(&mut list);
        let ids: Vec<_> = list.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c1.5", "c2", "c2-alt", "c10", "oneshot", "extra"]);

        for pair in list.windows(2) {
            if let (Some(a), Some(b)) = (pair[0].ordinal, pair[1].ordinal) {
                assert!(a <= b);
            }
        }
    }

    #[test]
    fn non_finite_ordinals_are_rejected() {
        assert_eq!(parse_ordinal("NaN"), None);
        assert_eq!(parse_ordinal("inf"), None);
        assert_eq!(parse_ordinal(" 7 "), Some(7.0));
    }

    #[test]
    fn result_counts_each_outcome_once() {
        let mut result = DownloadResult::default();
        result.record(&ChapterOutcome::Success(vec![PathBuf::from("001.jpg")]));
        result.record(&ChapterOutcome::NoAssets);
        result.record(&ChapterOutcome::Failed("x".to_string()));
        result.record(&ChapterOutcome::Failed("y".to_string()));
        assert_eq!(
            result,
            DownloadResult {
                success: 1,
                no_assets: 1,
                failed: 2
            }
        );
        assert_eq!(result.total(), 4);
    }
}
