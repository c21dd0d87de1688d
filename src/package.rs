//! 模块打包：校验 JSON，清空构建目录，复制静态文件

use crate::error::{InvalidJsonFile, PackageError};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// 构建结果
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildReport {
    pub target: PathBuf,
    pub copied: Vec<String>,
    /// 源路径不存在而跳过
    pub skipped: Vec<String>,
    /// 复制失败（不中止构建）
    pub failed: Vec<String>,
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PackageError + '_ {
    move |source| PackageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().map(|e| e == "json").unwrap_or(false)
}

fn check_json(path: &Path, invalid: &mut Vec<InvalidJsonFile>) {
    let result = fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|content| {
            serde_json::from_str::<serde_json::Value>(&content)
                .map(|_| ())
                .map_err(|e| e.to_string())
        });

    if let Err(message) = result {
        error!("无效的 JSON 文件: {:?} - {}", path, message);
        invalid.push(InvalidJsonFile {
            path: path.to_path_buf(),
            message,
        });
    }
}

/// 校验静态路径下的所有 `.json` 文件，返回校验过的文件数
///
/// 不存在的路径忽略（复制阶段会给出警告）。
pub fn validate_json_files(source_root: &Path, paths: &[String]) -> Result<usize, PackageError> {
    info!("校验 JSON 文件...");
    let mut checked = 0;
    let mut invalid = Vec::new();

    for path in paths {
        let full = source_root.join(path);
        if full.is_dir() {
            for entry in WalkDir::new(&full).sort_by_file_name() {
                let entry = entry.map_err(|e| PackageError::Io {
                    path: e.path().map(Path::to_path_buf).unwrap_or_else(|| full.clone()),
                    source: e
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("符号链接循环")),
                })?;
                if entry.file_type().is_file() && is_json(entry.path()) {
                    checked += 1;
                    check_json(entry.path(), &mut invalid);
                }
            }
        } else if full.is_file() && is_json(&full) {
            checked += 1;
            check_json(&full, &mut invalid);
        }
    }

    if invalid.is_empty() {
        info!("所有 JSON 文件有效 ({} 个)", checked);
        Ok(checked)
    } else {
        Err(PackageError::InvalidJson(invalid))
    }
}

/// 递归复制文件或目录
fn copy_path(src: &Path, dst: &Path) -> Result<u64, PackageError> {
    if src.is_file() {
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        fs::copy(src, dst).map_err(io_error(src))?;
        return Ok(1);
    }

    let mut count = 0;
    for entry in WalkDir::new(src).follow_links(true) {
        let entry = entry.map_err(|e| PackageError::Io {
            path: src.to_path_buf(),
            source: e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("符号链接循环")),
        })?;
        let relative = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(io_error(&target))?;
        } else {
            fs::copy(entry.path(), &target).map_err(io_error(entry.path()))?;
            count += 1;
        }
    }
    Ok(count)
}

/// 构建模块目录
///
/// 先校验 JSON（有无效文件则不构建），然后删除并重建目标目录，逐个复制静态路径。
pub fn build_module(
    source_root: &Path,
    static_paths: &[String],
    target: &Path,
) -> Result<BuildReport, PackageError> {
    validate_json_files(source_root, static_paths)?;

    // 防止把源目录本身当成构建目录清空
    let source_abs = fs::canonicalize(source_root).map_err(io_error(source_root))?;
    if let Ok(target_abs) = fs::canonicalize(target) {
        if source_abs.starts_with(&target_abs) {
            return Err(PackageError::Io {
                path: target.to_path_buf(),
                source: std::io::Error::other("构建目录包含源目录，拒绝清空"),
            });
        }
    }

    if target.exists() {
        debug!("清空构建目录: {:?}", target);
        fs::remove_dir_all(target).map_err(io_error(target))?;
    }
    fs::create_dir_all(target).map_err(io_error(target))?;
    info!("构建到目标目录: {:?}", target);

    let mut report = BuildReport {
        target: target.to_path_buf(),
        ..Default::default()
    };

    for path in static_paths {
        let src = source_root.join(path);
        if !src.exists() {
            warn!("源路径不存在，跳过: {}", path);
            report.skipped.push(path.clone());
            continue;
        }

        match copy_path(&src, &target.join(path)) {
            Ok(files) => {
                debug!("已复制 {} ({} 个文件)", path, files);
                report.copied.push(path.clone());
            }
            Err(e) => {
                error!("复制 {} 失败: {}", path, e);
                report.failed.push(path.clone());
            }
        }
    }

    info!(
        "构建完成: 复制 {}, 跳过 {}, 失败 {}",
        report.copied.len(),
        report.skipped.len(),
        report.failed.len()
    );
    Ok(report)
}
