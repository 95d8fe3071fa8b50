//! 书名解析：把用户输入的标题匹配到目录中的作品。
//!
//! 先做忽略大小写的完全匹配；否则对每个候选的每个语言标题做模糊打分，
//! 最高分达到阈值即接受，否则返回相似候选供界面展示。

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::models::Work;
use crate::base_system::context::Config;
use crate::base_system::fuzzy::ratio_ignore_case;
use crate::network_parser::api::{CatalogApi, WorkCandidate};

/// 相似候选的最低分。
pub const SIMILAR_SCORE: u8 = 60;
/// 返回给界面的相似候选数量上限。
pub const MAX_SUGGESTIONS: usize = 5;

#[derive(Debug, Clone, Copy)]
pub struct SearchOptions {
    pub limit: usize,
    pub threshold: u8,
}

impl From<&Config> for SearchOptions {
    fn from(cfg: &Config) -> Self {
        Self {
            limit: cfg.search_limit.max(1),
            threshold: cfg.match_threshold.min(100),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    pub work_id: String,
    pub title: String,
    pub score: u8,
}

#[derive(Debug, Clone)]
pub struct ResolvedWork {
    pub work: Work,
    pub score: u8,
}

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("no work found for '{title}'")]
    NotFound { title: String },
    #[error("no confident match for '{title}' ({} similar)", suggestions.len())]
    Ambiguous {
        title: String,
        suggestions: Vec<Suggestion>,
    },
}

pub fn resolve_title(
    api: &dyn CatalogApi,
    title: &str,
    options: SearchOptions,
) -> Result<ResolvedWork, ResolutionError> {
    let title = title.trim();
    let candidates = match api.search_works(title, options.limit) {
        Ok(c) => c,
        Err(e) => {
            warn!(target: "search", title, error = %e, "搜索请求失败");
            return Err(ResolutionError::NotFound {
                title: title.to_string(),
            });
        }
    };
    if candidates.is_empty() {
        info!(target: "search", title, "搜索无结果");
        return Err(ResolutionError::NotFound {
            title: title.to_string(),
        });
    }
    debug!(target: "search", title, count = candidates.len(), "获取到候选作品");
    pick_candidate(candidates, title, options.threshold)
}

/// 在候选列表上执行匹配规则（不访问网络）。
pub fn pick_candidate(
    candidates: Vec<WorkCandidate>,
    title: &str,
    threshold: u8,
) -> Result<ResolvedWork, ResolutionError> {
    let wanted = title.to_lowercase();

    if let Some(idx) = candidates.iter().position(|c| {
        c.titles
            .iter()
            .any(|(_, t)| t.to_lowercase() == wanted)
    }) {
        let mut candidates = candidates;
        let work = Work::from_candidate(candidates.swap_remove(idx));
        info!(target: "search", id = %work.id, name = %work.sanitized_name, "完全匹配");
        return Ok(ResolvedWork { work, score: 100 });
    }

    let mut best: Option<(usize, u8)> = None;
    // 作品 id -> (最高分, 展示标题, 首次出现顺序)
    let mut similar: HashMap<&str, (u8, String, usize)> = HashMap::new();

    for (idx, candidate) in candidates.iter().enumerate() {
        for (_, candidate_title) in &candidate.titles {
            let score = ratio_ignore_case(title, candidate_title);
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((idx, score));
            }
            if score < SIMILAR_SCORE {
                continue;
            }
            let display = candidate
                .titles
                .iter()
                .find(|(l, _)| l == "en")
                .map(|(_, t)| t.clone())
                .unwrap_or_else(|| candidate_title.clone());
            let order = similar.len();
            let entry = similar
                .entry(candidate.id.as_str())
                .or_insert((score, display.clone(), order));
            if score > entry.0 {
                entry.0 = score;
                entry.1 = display;
            }
        }
    }

    if let Some((idx, score)) = best
        && score >= threshold
    {
        let work = Work::from_candidate(candidates[idx].clone());
        info!(target: "search", id = %work.id, score, "模糊匹配成功");
        return Ok(ResolvedWork { work, score });
    }

    let mut suggestions: Vec<(u8, String, usize, String)> = similar
        .into_iter()
        .map(|(id, (score, display, order))| (score, display, order, id.to_string()))
        .collect();
    suggestions.sort_by(|a, b| b.0.cmp(&a.0).then(a.2.cmp(&b.2)));
    let suggestions: Vec<Suggestion> = suggestions
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(|(score, title, _, work_id)| Suggestion {
            work_id,
            title,
            score,
        })
        .collect();

    info!(
        target: "search",
        title,
        best = best.map(|(_, s)| s).unwrap_or(0),
        threshold,
        "未达到匹配阈值"
    );
    Err(ResolutionError::Ambiguous {
        title: title.to_string(),
        suggestions,
    })
}
