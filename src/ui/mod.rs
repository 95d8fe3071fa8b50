//! 交互层入口。
//!
//! 命令行交互与界面文本表；下载核心只通过事件回调与这里交互。

pub mod noui;
pub mod strings;
