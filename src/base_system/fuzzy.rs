//! 标题模糊匹配打分。
//!
//! 分数为 0-100 的整数：`round(200 * LCS / (len(a) + len(b)))`，
//! 即按插入/删除编辑距离折算的相似度。比较前不做大小写处理，由调用方决定。

/// 两个字符串的相似度（0-100）。两者都为空时视为完全相同。
pub fn ratio(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 100;
    }
    let lcs = lcs_len(&a, &b);
    let score = (200.0 * lcs as f64 / total as f64).round();
    score.clamp(0.0, 100.0) as u8
}

/// 忽略大小写的相似度。
pub fn ratio_ignore_case(a: &str, b: &str) -> u8 {
    ratio(&a.to_lowercase(), &b.to_lowercase())
}

fn lcs_len(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    // 单行滚动 DP
    let mut prev = vec![0usize; b.len() + 1];
    let mut cur = vec![0usize; b.len() + 1];
    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            cur[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                cur[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}
