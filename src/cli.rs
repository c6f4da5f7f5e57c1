//! # 命令行接口模块
//!
//! 使用 `clap` 定义了程序的命令行结构，包括子命令和参数。
//! 所有用户通过命令行与程序交互的入口点都在此模块中定义。

use clap::{Args, Parser};
use std::path::PathBuf;

use crate::codec::CodecOptions;
use crate::constants::{DEFAULT_CHUNK_SIZE, DEFAULT_PROGRESS_UPDATES};

/// 一款基于 LSB (最低有效位) 隐写术的命令行工具，用于在未压缩的 24/32 位 BMP 图像中隐藏或恢复任意文件。
#[derive(Parser, Debug)]
#[command(
    version,
    about,
    long_about = "一款基于 LSB (最低有效位) 隐写术的命令行工具，用于在未压缩的 24/32 位 BMP 图像中隐藏或恢复任意文件。"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// 所有子命令共享的选项。
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// 不显示进度。
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// 分块读写文件时的块大小 (字节)。
    #[arg(long, global = true, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// 每个阶段最多显示的进度更新次数。
    #[arg(long, global = true, default_value_t = DEFAULT_PROGRESS_UPDATES)]
    pub progress_updates: usize,
}

impl GlobalArgs {
    pub fn codec_options(&self) -> CodecOptions {
        CodecOptions {
            chunk_size: self.chunk_size,
            progress_updates: self.progress_updates,
        }
    }
}

impl Default for GlobalArgs {
    fn default() -> Self {
        Self {
            quiet: true,
            chunk_size: DEFAULT_CHUNK_SIZE,
            progress_updates: DEFAULT_PROGRESS_UPDATES,
        }
    }
}

/// 可用的子命令。
#[derive(Parser, Debug)]
pub enum Commands {
    /// 把文件隐藏到 BMP 图像中，生成 `<图像名>_hided.bmp`。
    Embed(EmbedArgs),

    /// 从经过隐写的 BMP 图像中恢复文件，生成 `<图像名>_extracted[.扩展名]`。
    Extract(ExtractArgs),

    /// 检查 BMP 图像中是否带有有效的隐写数据头。
    Verify(ImageArgs),

    /// 显示 BMP 图像最多可以隐藏的字节数。
    Capacity(ImageArgs),

    /// 显示 BMP 图像的尺寸、位深度、容量以及已隐藏的内容。
    Info(ImageArgs),
}

/// 'embed' 命令所需的参数。
#[derive(Parser, Debug)]
pub struct EmbedArgs {
    /// 用于隐写的 BMP 图像文件路径。
    #[arg(short, long)]
    pub image: PathBuf,

    /// 要隐藏的文件路径。
    #[arg(short, long)]
    pub file: PathBuf,

    /// 输出目录，默认与输入图像相同。
    #[arg(short, long)]
    pub out_dir: Option<PathBuf>,
}

/// 'extract' 命令所需的参数。
#[derive(Parser, Debug)]
pub struct ExtractArgs {
    /// 已隐藏数据的 BMP 图像文件路径。
    #[arg(short, long)]
    pub image: PathBuf,

    /// 输出目录，默认与输入图像相同。
    #[arg(short, long)]
    pub out_dir: Option<PathBuf>,
}

/// 只需要一张图像的命令所用的参数。
#[derive(Parser, Debug)]
pub struct ImageArgs {
    /// BMP 图像文件路径。
    #[arg(short, long)]
    pub image: PathBuf,
}
