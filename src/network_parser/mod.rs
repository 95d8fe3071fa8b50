//! 远端服务访问层。
//!
//! - `api`     — 核心依赖的 trait 与数据结构
//! - `network` — 基于 reqwest 的 MangaDex 实现

pub mod api;
pub mod network;
