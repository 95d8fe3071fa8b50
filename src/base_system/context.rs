//! 全局配置结构（Config）与默认值。
//!
//! 该模块同时提供生成 `config.yml` 的字段元信息，以及统一的文件名净化函数。

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::config::{ConfigSpec, FieldMeta};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // 接口配置
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_language")]
    pub language: String,

    // 路径配置
    #[serde(default = "default_save_path")]
    pub save_path: String,
    #[serde(default)]
    pub chapter_folder_prefix: String,

    // 搜索配置
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
    #[serde(default = "default_match_threshold")]
    pub match_threshold: u8,

    // 目录配置
    #[serde(default = "default_chapters_per_page")]
    pub chapters_per_page: usize,
    #[serde(default = "default_content_ratings")]
    pub content_ratings: Vec<String>,

    // 网络配置
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_asset_timeout")]
    pub asset_timeout: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default = "default_chapter_delay_ms")]
    pub chapter_delay_ms: u64,
    #[serde(default = "default_false")]
    pub force_port_443: bool,
    #[serde(default = "default_false")]
    pub data_saver: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            user_agent: default_user_agent(),
            language: default_language(),
            save_path: default_save_path(),
            chapter_folder_prefix: String::new(),
            search_limit: default_search_limit(),
            match_threshold: default_match_threshold(),
            chapters_per_page: default_chapters_per_page(),
            content_ratings: default_content_ratings(),
            request_timeout: default_request_timeout(),
            asset_timeout: default_asset_timeout(),
            max_retries: default_max_retries(),
            max_workers: default_max_workers(),
            chapter_delay_ms: default_chapter_delay_ms(),
            force_port_443: default_false(),
            data_saver: default_false(),
        }
    }
}

impl ConfigSpec for Config {
    const FILE_NAME: &'static str = "config.yml";

    fn fields() -> &'static [FieldMeta] {
        static FIELDS: [FieldMeta; 16] = [
            FieldMeta {
                name: "api_base",
                description: "MangaDex API 地址",
            },
            FieldMeta {
                name: "user_agent",
                description: "请求使用的 User-Agent",
            },
            FieldMeta {
                name: "language",
                description: "章节语言（同时决定界面语言）, 可选: [pt-br, en, es]",
            },
            FieldMeta {
                name: "save_path",
                description: "保存路径",
            },
            FieldMeta {
                name: "chapter_folder_prefix",
                description: "章节文件夹名前缀（留空表示不加前缀）",
            },
            FieldMeta {
                name: "search_limit",
                description: "搜索时最多获取的候选作品数",
            },
            FieldMeta {
                name: "match_threshold",
                description: "模糊匹配接受阈值 (0-100)",
            },
            FieldMeta {
                name: "chapters_per_page",
                description: "拉取章节目录时每页数量",
            },
            FieldMeta {
                name: "content_ratings",
                description: "拉取章节目录时包含的内容分级",
            },
            FieldMeta {
                name: "request_timeout",
                description: "接口请求超时时间（秒）",
            },
            FieldMeta {
                name: "asset_timeout",
                description: "图片下载超时时间（秒）",
            },
            FieldMeta {
                name: "max_retries",
                description: "单张图片最大尝试次数",
            },
            FieldMeta {
                name: "max_workers",
                description: "图片下载并发线程数",
            },
            FieldMeta {
                name: "chapter_delay_ms",
                description: "章节之间的等待时间, 单位ms",
            },
            FieldMeta {
                name: "force_port_443",
                description: "是否强制图片服务器使用 443 端口",
            },
            FieldMeta {
                name: "data_saver",
                description: "是否下载压缩版（data-saver）图片",
            },
        ];
        &FIELDS
    }
}

impl Config {
    pub fn default_save_dir(&self) -> PathBuf {
        if self.save_path.trim().is_empty() {
            std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        } else {
            PathBuf::from(&self.save_path)
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout.max(1))
    }

    pub fn asset_timeout(&self) -> Duration {
        Duration::from_secs(self.asset_timeout.max(1))
    }

    pub fn chapter_delay(&self) -> Duration {
        Duration::from_millis(self.chapter_delay_ms)
    }

    pub fn chapter_folder_name(&self, label: &str, chapter_id: &str) -> String {
        let name = sanitize_name(label);
        let name = if name.is_empty() {
            format!("id_{chapter_id}")
        } else {
            name
        };
        format!("{}{}", sanitize_name(&self.chapter_folder_prefix), name)
    }
}

const SAFE_EXTRA_CHARS: &str = "_-.() ";

/// 只保留安全字符集内的字符，去掉首尾空白后把空格替换为下划线。
///
/// 作品目录与章节目录共用这一实现；结果可能为空，由调用方决定回退名称。
/// 只由 `.` 组成的结果（`.`、`..`）会指向当前或上级目录，按空处理。
pub fn sanitize_name(name: &str) -> String {
    let kept: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || SAFE_EXTRA_CHARS.contains(*c))
        .collect();
    let kept = kept.trim().replace(' ', "_");
    if kept.chars().all(|c| c == '.') {
        return String::new();
    }
    kept
}

fn default_false() -> bool {
    false
}

fn default_api_base() -> String {
    "https://api.mangadex.org".to_string()
}

fn default_user_agent() -> String {
    format!("mdex-downloader/{}", env!("CARGO_PKG_VERSION"))
}

fn default_language() -> String {
    "pt-br".to_string()
}

fn default_save_path() -> String {
    "Downloads".to_string()
}

fn default_search_limit() -> usize {
    10
}

fn default_match_threshold() -> u8 {
    75
}

fn default_chapters_per_page() -> usize {
    100
}

fn default_content_ratings() -> Vec<String> {
    ["safe", "suggestive", "erotica", "pornographic"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_request_timeout() -> u64 {
    15
}

fn default_asset_timeout() -> u64 {
    25
}

fn default_max_retries() -> u32 {
    3
}

fn default_max_workers() -> usize {
    4
}

fn default_chapter_delay_ms() -> u64 {
    500
}
