use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "modsync")]
#[command(about = "构建模块目录并通过 SFTP 增量同步到服务器", version)]
pub struct Cli {
    /// 配置文件路径
    #[arg(long, global = true, default_value = modsync_lib::config::CONFIG_FILE)]
    pub config: PathBuf,

    /// 控制台输出 debug 日志
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// 校验并构建模块目录，按配置上传
    Build {
        /// 构建目录，默认取 buildPath 或模块名
        target: Option<PathBuf>,

        /// 只构建，不上传
        #[arg(long)]
        no_upload: bool,
    },

    /// 扫描并显示同步计划，不修改远程
    Plan {
        /// 本地目录，默认为构建目录
        dir: Option<PathBuf>,
    },

    /// 把本地目录同步到远程模块目录
    Sync {
        /// 本地目录，默认为构建目录
        dir: Option<PathBuf>,
    },

    /// 下载远程源文件（en.json）
    Download {
        /// 输出目录
        #[arg(long, default_value = modsync_lib::download::DEFAULT_DOWNLOAD_DIR)]
        out: PathBuf,
    },
}
