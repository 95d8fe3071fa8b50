//! 章节选择表达式解析。
//!
//! 表达式由空白分隔的 token 组成：整体为 `all`/`todos`/`todo` 时选中全部；
//! 恰含一个连字符的 token 是闭区间；其余 token 按章节号或显示标签精确匹配。

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;
use tracing::debug;

use super::models::{Chapter, sort_chapters};

pub const ALL_MARKERS: &[&str] = &["all", "todos", "todo"];

#[derive(Debug, Clone, PartialEq)]
pub enum SelectionToken {
    All,
    Range { start: f64, end: f64 },
    Literal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("range bounds must be non-negative numbers")]
    Malformed,
    #[error("range start is greater than its end")]
    Inverted,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("no chapters matched the selection")]
    Empty,
    #[error("no valid selection token in: {}", .0.join(", "))]
    AllInvalid(Vec<String>),
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SelectionDiagnostics {
    pub invalid_ranges: Vec<String>,
    pub empty_ranges: Vec<String>,
    pub not_found: Vec<String>,
    pub invalid: Vec<String>,
}

impl SelectionDiagnostics {
    pub fn is_clean(&self) -> bool {
        self.invalid_ranges.is_empty()
            && self.empty_ranges.is_empty()
            && self.not_found.is_empty()
            && self.invalid.is_empty()
    }

    /// 至少有一个语法合法的 token（空区间或未找到的字面量）。
    fn has_valid_token(&self) -> bool {
        !self.empty_ranges.is_empty() || !self.not_found.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Selection {
    pub chapters: Vec<Chapter>,
    pub diagnostics: SelectionDiagnostics,
}

impl Selection {
    pub fn into_result(self) -> Result<Vec<Chapter>, SelectionError> {
        if !self.chapters.is_empty() {
            return Ok(self.chapters);
        }
        if self.diagnostics.has_valid_token() {
            return Err(SelectionError::Empty);
        }
        let mut rejected = self.diagnostics.invalid_ranges;
        rejected.extend(self.diagnostics.invalid);
        if rejected.is_empty() {
            Err(SelectionError::Empty)
        } else {
            Err(SelectionError::AllInvalid(rejected))
        }
    }
}

fn decimal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9]+(?:\.[0-9]+)?$").expect("static regex"))
}

/// `digits[.digits]`，不接受符号、指数或 inf/nan。
pub fn is_decimal(s: &str) -> bool {
    decimal_re().is_match(s)
}

pub fn is_all_marker(expr: &str) -> bool {
    let expr = expr.trim();
    ALL_MARKERS.iter().any(|m| expr.eq_ignore_ascii_case(m))
}

/// 解析 `start-end`（调用方保证恰好一个连字符）。
pub fn parse_range(token: &str) -> Result<(f64, f64), RangeError> {
    let (start, end) = token.split_once('-').ok_or(RangeError::Malformed)?;
    let (start, end) = (start.trim(), end.trim());
    if !is_decimal(start) || !is_decimal(end) {
        return Err(RangeError::Malformed);
    }
    let start: f64 = start.parse().map_err(|_| RangeError::Malformed)?;
    let end: f64 = end.parse().map_err(|_| RangeError::Malformed)?;
    if start > end {
        return Err(RangeError::Inverted);
    }
    Ok((start, end))
}

/// 把表达式切分为 `(原始文本, token)`；区间语法错误时 token 为 `Err`。
pub fn tokenize(expr: &str) -> Vec<(String, Result<SelectionToken, RangeError>)> {
    if is_all_marker(expr) {
        return vec![(expr.trim().to_string(), Ok(SelectionToken::All))];
    }
    expr.split_whitespace()
        .map(|tok| {
            let parsed = if tok.matches('-').count() == 1 {
                parse_range(tok).map(|(start, end)| SelectionToken::Range { start, end })
            } else {
                Ok(SelectionToken::Literal(tok.to_string()))
            };
            (tok.to_string(), parsed)
        })
        .collect()
}

/// 未匹配字面量中可报告为“未找到”的部分；其余视为无效输入。
fn looks_like_valid_literal(tok: &str) -> bool {
    if is_decimal(tok) {
        return true;
    }
    !tok.contains('-') && tok.parse::<f64>().is_err()
}

pub fn select_chapters(chapters: &[Chapter], expr: &str) -> Selection {
    let tokens = tokenize(expr);
    let mut diagnostics = SelectionDiagnostics::default();

    if matches!(tokens.as_slice(), [(_, Ok(SelectionToken::All))]) {
        return Selection {
            chapters: chapters.to_vec(),
            diagnostics,
        };
    }

    let mut ranges: Vec<(String, f64, f64)> = Vec::new();
    let mut literals: Vec<String> = Vec::new();
    for (text, token) in tokens {
        match token {
            Ok(SelectionToken::Range { start, end }) => ranges.push((text, start, end)),
            Ok(SelectionToken::Literal(s)) => {
                if !literals.contains(&s) {
                    literals.push(s);
                }
            }
            Ok(SelectionToken::All) => {}
            Err(_) => diagnostics.invalid_ranges.push(text),
        }
    }

    let mut picked: Vec<Chapter> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();

    for (label, start, end) in &ranges {
        let mut hit = false;
        for ch in chapters {
            let Some(ord) = ch.ordinal else { continue };
            if ord < *start || ord > *end {
                continue;
            }
            hit = true;
            if seen.insert(ch.id.as_str()) {
                picked.push(ch.clone());
            }
        }
        if !hit {
            diagnostics.empty_ranges.push(label.clone());
        }
    }

    let mut matched_literals: HashSet<&str> = HashSet::new();
    for ch in chapters {
        let by_number = ch
            .number
            .as_deref()
            .and_then(|n| literals.iter().find(|l| l.as_str() == n));
        let by_label = literals.iter().find(|l| l.as_str() == ch.display_label);
        let Some(lit) = by_number.or(by_label) else {
            continue;
        };
        matched_literals.insert(lit.as_str());
        if seen.insert(ch.id.as_str()) {
            picked.push(ch.clone());
        }
    }

    for lit in &literals {
        if matched_literals.contains(lit.as_str()) {
            continue;
        }
        if looks_like_valid_literal(lit) {
            diagnostics.not_found.push(lit.clone());
        } else {
            diagnostics.invalid.push(lit.clone());
        }
    }

    sort_chapters(&mut picked);
    debug!(
        target: "selection",
        expr,
        picked = picked.len(),
        clean = diagnostics.is_clean(),
        "章节选择完成"
    );
    Selection {
        chapters: picked,
        diagnostics,
    }
}
