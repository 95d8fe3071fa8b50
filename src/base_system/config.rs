//! 配置文件读写与带注释生成。

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_yaml::Value;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("invalid yaml at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Copy)]
pub struct FieldMeta {
    pub name: &'static str,
    pub description: &'static str,
}

pub trait ConfigSpec: Serialize + DeserializeOwned + Default {
    const FILE_NAME: &'static str;
    fn fields() -> &'static [FieldMeta];
}

/// 读取结果：配置本体 + 实际使用的文件路径。
#[derive(Debug, Clone)]
pub struct LoadedConfig<T> {
    pub config: T,
    pub path: PathBuf,
    pub created: bool,
}

/// Load the config from `base_dir/FILE_NAME` (or the working directory), creating a
/// commented default file when it does not exist yet.
///
/// User values are merged over the defaults, so a file written by an older version
/// keeps working; when fields are missing the file is rewritten with all of them.
pub fn load_or_create<T: ConfigSpec>(base_dir: Option<&Path>) -> Result<LoadedConfig<T>, ConfigError> {
    let path = base_dir
        .map(|b| b.join(T::FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(T::FILE_NAME));
    load_or_create_at(&path)
}

pub fn load_or_create_at<T: ConfigSpec>(path: &Path) -> Result<LoadedConfig<T>, ConfigError> {
    ensure_parent(path)?;

    if !path.exists() {
        let config = T::default();
        write_with_comments(&config, path)?;
        info!(target: "config", path = %path.display(), "已生成默认配置文件");
        return Ok(LoadedConfig {
            config,
            path: path.to_path_buf(),
            created: true,
        });
    }

    let user_yaml = read_yaml(path)?;
    let missing = missing_fields::<T>(&user_yaml);

    let mut merged = serde_yaml::to_value(T::default())
        .map_err(|err| ConfigError::Validation(err.to_string()))?;
    merge_values(&mut merged, user_yaml);

    let config: T =
        serde_yaml::from_value(merged).map_err(|err| ConfigError::Validation(err.to_string()))?;

    if !missing.is_empty() {
        debug!(target: "config", ?missing, "配置缺少字段，补全后回写");
        write_with_comments(&config, path)?;
    }

    Ok(LoadedConfig {
        config,
        path: path.to_path_buf(),
        created: false,
    })
}

pub fn write_with_comments<T: ConfigSpec>(config: &T, path: &Path) -> Result<(), ConfigError> {
    ensure_parent(path)?;
    let yaml = generate_yaml_with_comments(config)?;
    fs::write(path, yaml).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn generate_yaml_with_comments<T: ConfigSpec>(config: &T) -> Result<String, ConfigError> {
    let value =
        serde_yaml::to_value(config).map_err(|err| ConfigError::Validation(err.to_string()))?;
    let Value::Mapping(mapping) = value else {
        return Err(ConfigError::Validation(
            "config must serialize to a mapping".to_string(),
        ));
    };

    let mut lines = Vec::with_capacity(T::fields().len() * 2);
    for field in T::fields() {
        if !field.description.is_empty() {
            lines.push(format!("# {}", field.description.replace('\n', "\n# ")));
        }
        let key = Value::String(field.name.to_string());
        let val = mapping.get(&key).cloned().unwrap_or(Value::Null);
        let yaml_line = serde_yaml::to_string(&serde_yaml::Mapping::from_iter([(key, val)]))
            .map_err(|err| ConfigError::Validation(err.to_string()))?;
        lines.push(yaml_line.trim_end().to_string());
    }
    lines.push(String::new());

    Ok(lines.join("\n"))
}

fn read_yaml(path: &Path) -> Result<Value, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    // 空文件按空映射处理
    if raw.trim().is_empty() {
        return Ok(Value::Mapping(serde_yaml::Mapping::new()));
    }
    serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn missing_fields<T: ConfigSpec>(user_yaml: &Value) -> Vec<&'static str> {
    let Value::Mapping(map) = user_yaml else {
        return T::fields().iter().map(|f| f.name).collect();
    };
    T::fields()
        .iter()
        .filter(|f| !map.contains_key(Value::String(f.name.to_string())))
        .map(|f| f.name)
        .collect()
}

fn merge_values(default: &mut Value, user: Value) {
    match (default, user) {
        (Value::Mapping(dest), Value::Mapping(src)) => {
            for (key, user_val) in src {
                if let Some(dest_val) = dest.get_mut(&key) {
                    merge_values(dest_val, user_val);
                } else {
                    dest.insert(key, user_val);
                }
            }
        }
        // null 表示用户留空，保留默认值
        (_, Value::Null) => {}
        (dest, other) => {
            *dest = other;
        }
    }
}

fn ensure_parent(path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base_system::context::Config;

    #[test]
    fn creates_commented_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_or_create::<Config>(Some(dir.path())).unwrap();
        assert!(loaded.created);
        assert_eq!(loaded.path, dir.path().join("config.yml"));

        let raw = fs::read_to_string(&loaded.path).unwrap();
        assert!(raw.contains("# 模糊匹配接受阈值 (0-100)"));
        assert!(raw.contains("match_threshold: 75"));
        assert_eq!(loaded.config.max_workers, 4);
    }

    #[test]
    fn merges_user_values_and_backfills_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(&path, "match_threshold: 60\nmax_workers: 2\n").unwrap();

        let loaded = load_or_create_at::<Config>(&path).unwrap();
        assert!(!loaded.created);
        assert_eq!(loaded.config.match_threshold, 60);
        assert_eq!(loaded.config.max_workers, 2);
        assert_eq!(loaded.config.max_retries, 3);

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("chapter_delay_ms: 500"));
        assert!(raw.contains("match_threshold: 60"));
    }

    #[test]
    fn null_value_keeps_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(&path, "save_path:\n").unwrap();

        let loaded = load_or_create_at::<Config>(&path).unwrap();
        assert_eq!(loaded.config.save_path, "Downloads");
    }

    #[test]
    fn invalid_yaml_is_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(&path, "max_workers: [1, 2\n").unwrap();

        let err = load_or_create_at::<Config>(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
