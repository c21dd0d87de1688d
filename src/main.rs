mod cli;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use modsync_lib::config::{BuildConfig, RemoteSettings};
use modsync_lib::core::{SyncEngine, SyncOptions, SyncProgress, SyncReport};
use modsync_lib::logging::{LogConfig, SizeRotatingWriter};
use modsync_lib::{create_transport, download, package};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::prelude::*;

/// 初始化日志系统
fn init_logging(config: &LogConfig, verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        config.tracing_level()
    };
    let env_filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

    fn console_layer<S>() -> impl tracing_subscriber::Layer<S>
    where
        S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
    }

    if !config.enabled {
        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer())
            .try_init();
        return;
    }

    match SizeRotatingWriter::new(&config.dir, config.max_size_mb) {
        Ok(file_writer) => {
            // 文件日志层
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false);

            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(file_layer)
                .with(console_layer())
                .try_init();
        }
        Err(e) => {
            // 文件日志创建失败，回退到控制台
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer())
                .try_init();
            warn!("无法创建日志文件 {:?}: {}", config.dir, e);
        }
    }
}

fn remote_settings(config: &BuildConfig) -> Result<RemoteSettings> {
    RemoteSettings::from_env(&config.sftp)
        .map_err(|missing| anyhow!("缺少环境变量: {}", missing.join(", ")))
}

fn remote_root(settings: &RemoteSettings, config: &BuildConfig) -> Result<String> {
    settings
        .module_path(&config.module_name)
        .ok_or_else(|| anyhow!("缺少环境变量: FTP_REMOTE_PATH"))
}

async fn log_progress(mut rx: mpsc::Receiver<SyncProgress>) {
    while let Some(progress) = rx.recv().await {
        if progress.current_file.is_empty() {
            debug!("阶段: {:?}", progress.phase);
        } else if progress.failed {
            debug!(
                "[{}/{}] 失败: {}",
                progress.completed, progress.total, progress.current_file
            );
        } else {
            debug!(
                "[{}/{}] {}",
                progress.completed, progress.total, progress.current_file
            );
        }
    }
}

fn print_summary(report: &SyncReport) {
    println!("{}", "=".repeat(60));
    println!("{} -> {}", report.local_root.display(), report.remote_root);
    println!("本地 {} 个文件, 远程 {} 个文件", report.local_files, report.remote_files);
    println!(
        "{} (待上传 {:.2} MB)",
        report.plan,
        report.pending_upload_bytes as f64 / (1024.0 * 1024.0)
    );

    if !report.unreadable_dirs.is_empty() {
        println!("无法列出的远程目录:");
        for dir in &report.unreadable_dirs {
            println!("  {}", dir);
        }
    }

    match &report.outcome {
        Some(outcome) => {
            println!(
                "上传 {} ({:.2} MB), 删除 {}, 失败 {}, 用时 {:.2}s",
                outcome.uploaded_count,
                outcome.uploaded_mb(),
                outcome.deleted_count,
                outcome.error_count(),
                outcome.duration_seconds
            );
            for failure in &outcome.failures {
                println!("  ✗ {}: {}", failure.path, failure.error);
            }
        }
        None => println!("未修改远程 (用时 {:.2}s)", report.duration_seconds),
    }
    println!("{}", "=".repeat(60));
}

/// 连接远程并执行同步（或只计算计划）
async fn run_sync(
    config: &BuildConfig,
    settings: &RemoteSettings,
    local_root: &Path,
    remote_root: &str,
    dry_run: bool,
) -> Result<()> {
    let mut transport = create_transport(settings)?;

    let (tx, rx) = mpsc::channel(256);
    let progress_task = tokio::spawn(log_progress(rx));

    let engine = SyncEngine::with_options(SyncOptions {
        concurrency: config.sftp.concurrency.max(1),
        dry_run,
    })
    .with_progress(tx);
    let result = engine.run(&mut *transport, local_root, remote_root).await;

    // 释放发送端，让进度任务退出
    drop(engine);
    let _ = progress_task.await;

    let report = result.context("同步失败")?;
    print_summary(&report);
    Ok(())
}

async fn cmd_build(config: &BuildConfig, target: Option<PathBuf>, no_upload: bool) -> Result<()> {
    let target = config.target_dir(target.as_deref());
    let report = package::build_module(Path::new("."), &config.static_paths, &target)
        .context("构建模块失败")?;
    println!(
        "构建完成: {} (复制 {}, 跳过 {}, 失败 {})",
        report.target.display(),
        report.copied.len(),
        report.skipped.len(),
        report.failed.len()
    );

    if no_upload {
        info!("已指定 --no-upload，跳过上传");
        return Ok(());
    }
    if !config.sftp.enabled {
        info!("sftp.enabled 未开启，跳过上传");
        return Ok(());
    }

    let settings = match RemoteSettings::from_env(&config.sftp) {
        Ok(settings) => settings,
        Err(missing) => {
            warn!("缺少环境变量 {}，跳过上传", missing.join(", "));
            return Ok(());
        }
    };
    let Some(remote_root) = settings.module_path(&config.module_name) else {
        warn!("缺少环境变量 FTP_REMOTE_PATH，跳过上传");
        return Ok(());
    };

    run_sync(config, &settings, &target, &remote_root, false).await
}

async fn cmd_sync(config: &BuildConfig, dir: Option<PathBuf>, dry_run: bool) -> Result<()> {
    let local_root = dir.unwrap_or_else(|| config.target_dir(None));
    let settings = remote_settings(config)?;
    let remote_root = remote_root(&settings, config)?;
    run_sync(config, &settings, &local_root, &remote_root, dry_run).await
}

async fn cmd_download(config: &BuildConfig, out: PathBuf) -> Result<()> {
    let settings = remote_settings(config)?;
    let source = settings
        .download_source()
        .ok_or_else(|| anyhow!("缺少环境变量: FTP_SOURCE_PATH 或 FTP_REMOTE_PATH"))?;

    let mut transport = create_transport(&settings)?;
    let log = download::download_sources(&mut *transport, source, &out)
        .await
        .context("下载失败")?;

    println!(
        "下载完成: 成功 {}, 失败 {} (日志: {})",
        log.downloaded.len(),
        log.errors.len(),
        out.join(download::DOWNLOAD_LOG_FILE).display()
    );
    for failure in &log.errors {
        println!("  ✗ {}: {}", failure.file, failure.error);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = BuildConfig::load(&cli.config)?;
    init_logging(&config.log, cli.verbose);

    match cli.command {
        Command::Build { target, no_upload } => cmd_build(&config, target, no_upload).await,
        Command::Plan { dir } => cmd_sync(&config, dir, true).await,
        Command::Sync { dir } => cmd_sync(&config, dir, false).await,
        Command::Download { out } => cmd_download(&config, out).await,
    }
}
