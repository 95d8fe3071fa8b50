//! 空文件/空目录清理，以及"文件已就绪"判断。

use std::fs;
use std::io;
use std::path::Path;

pub fn is_empty_dir(path: impl AsRef<Path>) -> io::Result<bool> {
    let path = path.as_ref();
    let mut entries = fs::read_dir(path)?;
    Ok(entries.next().is_none())
}

/// 目录为空时删除；返回是否删除。
pub fn remove_dir_if_empty(path: impl AsRef<Path>) -> io::Result<bool> {
    let path = path.as_ref();
    if !is_empty_dir(path)? {
        return Ok(false);
    }
    fs::remove_dir(path)?;
    Ok(true)
}

/// 断点续传的唯一依据：文件存在且大小非零。
pub fn has_content(path: impl AsRef<Path>) -> bool {
    fs::metadata(path.as_ref())
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

/// 删除零字节文件；返回是否删除。
pub fn remove_if_empty_file(path: impl AsRef<Path>) -> io::Result<bool> {
    let path = path.as_ref();
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() && meta.len() == 0 => {
            fs::remove_file(path)?;
            Ok(true)
        }
        Ok(_) => Ok(false),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
