//! # 命令处理逻辑模块
//!
//! 包含处理各个子命令的高级业务逻辑。
//! 本模块负责在工作线程上调用编解码器、在主线程上渲染进度，并向用户报告结果。

use crate::cli::{EmbedArgs, ExtractArgs, GlobalArgs, ImageArgs};
use crate::codec::SteganographyCodec;
use crate::progress::{Progress, ProgressHandler, Stage};
use anyhow::{Context, Result};
use colored::Colorize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

/// 处理 'Embed' 命令的执行逻辑。
///
/// # Errors
///
/// 如果发生以下任一情况，将返回错误：
/// * 无法读取输入的图像或要隐藏的文件。
/// * 图像不是未压缩的 24/32 位 BMP。
/// * 图像没有足够的空间来隐藏文件。
/// * 无法写入到输出目录。
pub fn handle_embed(args: EmbedArgs, global: &GlobalArgs) -> Result<()> {
    let codec = SteganographyCodec::with_options(global.codec_options());
    let out_dir = output_dir(args.out_dir.as_deref(), &args.image);

    let output = run_with_progress(global.quiet, |progress| {
        codec.embed(&args.image, &args.file, &out_dir, progress)
    })
    .with_context(|| {
        format!(
            "Unable to hide {} in image: {}",
            args.file.to_string_lossy().red().bold(),
            args.image.to_string_lossy().red().bold()
        )
    })?;

    println!(
        "The file has been successfully hidden and saved: {}",
        output.to_string_lossy().green().bold()
    );
    Ok(())
}

/// 处理 'Extract' 命令的执行逻辑。
///
/// # Errors
///
/// 如果发生以下任一情况，将返回错误：
/// * 无法读取输入的图像文件，或者它不是受支持的 BMP。
/// * 图像中没有有效的隐写数据头。
/// * 无法写入到输出目录。
pub fn handle_extract(args: ExtractArgs, global: &GlobalArgs) -> Result<()> {
    let codec = SteganographyCodec::with_options(global.codec_options());
    let out_dir = output_dir(args.out_dir.as_deref(), &args.image);

    let output = run_with_progress(global.quiet, |progress| {
        codec.extract(&args.image, &out_dir, progress)
    })
    .with_context(|| {
        format!(
            "Failed to recover hidden data from '{}'. \nThe image may not contain a hidden file or is corrupted.",
            args.image.to_string_lossy().red().bold()
        )
    })?;

    println!(
        "The file has been successfully recovered and saved: {}",
        output.to_string_lossy().green().bold()
    );
    Ok(())
}

/// 处理 'Verify' 命令的执行逻辑。
pub fn handle_verify(args: ImageArgs, global: &GlobalArgs) -> Result<()> {
    let codec = SteganographyCodec::with_options(global.codec_options());

    let valid = run_with_progress(global.quiet, |progress| codec.verify(&args.image, progress))
        .with_context(|| {
            format!(
                "Unable to verify image file: {}",
                args.image.to_string_lossy().red().bold()
            )
        })?;

    if valid {
        println!(
            "{} carries a valid hidden data header.",
            args.image.to_string_lossy().green().bold()
        );
    } else {
        println!(
            "{} does not carry a valid hidden data header.",
            args.image.to_string_lossy().yellow().bold()
        );
    }
    Ok(())
}

/// 处理 'Capacity' 命令的执行逻辑。
pub fn handle_capacity(args: ImageArgs, global: &GlobalArgs) -> Result<()> {
    let codec = SteganographyCodec::with_options(global.codec_options());
    let capacity = codec.compute_capacity(&args.image).with_context(|| {
        format!(
            "Unable to compute the capacity of image file: {}",
            args.image.to_string_lossy().red().bold()
        )
    })?;

    println!(
        "Up to {} bytes can be hidden in {}",
        capacity.to_string().green().bold(),
        args.image.to_string_lossy().bold()
    );
    Ok(())
}

/// 处理 'Info' 命令的执行逻辑。
pub fn handle_info(args: ImageArgs, global: &GlobalArgs) -> Result<()> {
    let codec = SteganographyCodec::with_options(global.codec_options());
    let info = codec.inspect(&args.image).with_context(|| {
        format!(
            "Unable to inspect image file: {}",
            args.image.to_string_lossy().red().bold()
        )
    })?;

    println!("{}", args.image.to_string_lossy().bold());
    println!("  dimensions:  {}x{}", info.width, info.height);
    println!("  bit depth:   {}", info.bit_count);
    println!("  pixel bytes: {}", info.image_bytes);
    println!("  capacity:    {} bytes", info.capacity.to_string().green());
    match info.payload {
        Some(header) => {
            let extension = header.extension();
            println!(
                "  payload:     {} bytes{}",
                header.size.to_string().green().bold(),
                if extension.is_empty() {
                    String::new()
                } else {
                    format!(" (.{extension})")
                }
            );
        }
        None => println!("  payload:     {}", "none".yellow()),
    }
    Ok(())
}

fn output_dir(out_dir: Option<&Path>, image: &Path) -> PathBuf {
    match out_dir {
        Some(dir) => dir.to_path_buf(),
        None => match image.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        },
    }
}

/// 在工作线程上执行 `job`，主线程通过通道接收进度并渲染。
fn run_with_progress<T, F>(quiet: bool, job: F) -> T
where
    T: Send,
    F: FnOnce(Option<&dyn ProgressHandler>) -> T + Send,
{
    if quiet {
        return job(None);
    }

    let (tx, rx) = mpsc::channel::<Progress>();
    thread::scope(|s| {
        let worker = s.spawn(move || {
            let handler: &dyn ProgressHandler = &tx;
            job(Some(handler))
        });

        let mut renderer = ProgressRenderer::default();
        for event in rx {
            renderer.render(event);
        }
        renderer.clear();

        worker
            .join()
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
    })
}

/// 在终端同一行上刷新 `[ 42%] transferring bits`。
#[derive(Default)]
struct ProgressRenderer {
    stage: Option<Stage>,
    percent: f64,
    drawn: bool,
}

impl ProgressRenderer {
    fn render(&mut self, event: Progress) {
        match event {
            Progress::Stage(stage) => self.stage = Some(stage),
            Progress::Percent(percent) => self.percent = percent,
            Progress::Output(_) => return,
        }

        let stage = self.stage.map(|s| s.to_string()).unwrap_or_default();
        let mut stderr = io::stderr().lock();
        let _ = write!(
            stderr,
            "\r\x1b[2K[{:>3}%] {}",
            (self.percent * 100.0).round() as u32,
            stage.cyan()
        );
        let _ = stderr.flush();
        self.drawn = true;
    }

    fn clear(&self) {
        if self.drawn {
            eprint!("\r\x1b[2K");
        }
    }
}
