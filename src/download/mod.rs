//! 下载流程模块入口。
//!
//! 子模块：
//! - `models`      — 数据模型（Work / Chapter / AssetDescriptor / DownloadResult 等）
//! - `search`      — 标题解析与模糊匹配
//! - `plan`        — 章节目录拉取与下载计划
//! - `selection`   — 章节选择表达式
//! - `fetcher`     — 单张图片下载与重试
//! - `worker_pool` — 图片并发下载工作池
//! - `chapter`     — 单章下载
//! - `downloader`  — 批量下载编排
//! - `progress`    — 下载事件与 CLI 进度条

pub mod chapter;
pub mod downloader;
pub mod fetcher;
pub mod models;
pub mod plan;
pub mod progress;
pub mod search;
pub mod selection;
pub mod worker_pool;

#[cfg(test)]
pub(crate) mod test_support;
