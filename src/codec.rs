//! # 隐写编解码器
//!
//! 对外提供 `embed`、`extract`、`verify`、`compute_capacity` 和 `inspect` 五个操作。
//! 每次调用都是独立的工作单元，编解码器本身不保存可变状态。
//!
//! 单次调用依次经过以下阶段，任何一步失败都会带着当时的阶段返回 [`CodecError`]:
//!
//! ```text
//! Idle → ReadingContainer → ReadingPayload → BuildingHeader → CheckingCapacity
//!      → Transferring → WritingOutput → Done | Failed
//! ```
//!
//! `ReadingPayload`、`BuildingHeader`、`CheckingCapacity` 只出现在 `embed` 中。
//! 输出先写入临时文件，成功后才改名为最终文件名，失败不会留下输出。

use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::bits::{bits, bits_to_bytes, extract_bit};
use crate::bmp::{BmpFile, read_bmp};
use crate::constants::{DEFAULT_CHUNK_SIZE, DEFAULT_PROGRESS_UPDATES, HIDE_HEADER_BITS};
use crate::error::{CodecError, Operation, StegoError};
use crate::files::{
    extracted_path, file_extension, hided_path, is_safe_extension, read_file, write_atomically,
    write_chunks,
};
use crate::header::HideDataHeader;
use crate::progress::{CancellationToken, ProgressHandler, ProgressScope, Stage};
use crate::steganography::{embed_bits, extract_bits};

/// 编解码器的可调参数。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecOptions {
    /// 分块读写文件时的块大小 (字节)
    pub chunk_size: usize,
    /// 每个进度段期望的最大更新次数
    pub progress_updates: usize,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            progress_updates: DEFAULT_PROGRESS_UPDATES,
        }
    }
}

/// `inspect` 的结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub width: i32,
    pub height: i32,
    pub bit_count: u16,
    pub image_bytes: usize,
    pub capacity: u64,
    /// 带有效标识的数据头
    pub payload: Option<HideDataHeader>,
}

#[derive(Debug, Clone, Default)]
pub struct SteganographyCodec {
    options: CodecOptions,
    cancel: CancellationToken,
}

/// 单次调用的状态: 当前阶段和进度视图。
struct Session<'a> {
    operation: Operation,
    stage: Stage,
    scope: ProgressScope<'a>,
}

impl<'a> Session<'a> {
    fn new(
        operation: Operation,
        handler: Option<&'a dyn ProgressHandler>,
        cancel: &'a CancellationToken,
        options: &CodecOptions,
    ) -> Self {
        Self {
            operation,
            stage: Stage::Idle,
            scope: ProgressScope::new(handler, cancel, options.progress_updates),
        }
    }

    fn enter(&mut self, stage: Stage) {
        debug!("{}: {}", self.operation, stage);
        self.stage = stage;
        self.scope.stage(stage);
    }

    fn check<T>(&self, result: Result<T, StegoError>) -> Result<T, CodecError> {
        result.map_err(|source| self.failed(source))
    }

    fn fail<T>(&self, source: StegoError) -> Result<T, CodecError> {
        Err(self.failed(source))
    }

    /// 发出 `Failed` 事件；错误里保留失败时所在的阶段。
    fn failed(&self, source: StegoError) -> CodecError {
        debug!("{}: {} while {}", self.operation, Stage::Failed, self.stage);
        self.scope.stage(Stage::Failed);
        CodecError::new(self.operation, self.stage, source)
    }
}

impl SteganographyCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: CodecOptions) -> Self {
        Self {
            options: CodecOptions {
                chunk_size: options.chunk_size.max(1),
                progress_updates: options.progress_updates.max(1),
            },
            cancel: CancellationToken::new(),
        }
    }

    /// 使用外部的取消标记，在批次边界检查。
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn options(&self) -> &CodecOptions {
        &self.options
    }

    /// 把 `file` 隐藏到 `bmp` 中，写出 `{out_dir}/{bmp 文件名}_hided.bmp` 并返回实际路径。
    ///
    /// # Errors
    ///
    /// * `Format` - `bmp` 不是受支持的 BMP
    /// * `CapacityExceeded` - 数据头加载荷超出容量，信息中给出可隐藏的字节数
    /// * `Io` - 读写失败
    /// * `Cancelled` - 取消标记被触发
    pub fn embed(
        &self,
        bmp: impl AsRef<Path>,
        file: impl AsRef<Path>,
        out_dir: impl AsRef<Path>,
        progress: Option<&dyn ProgressHandler>,
    ) -> Result<PathBuf, CodecError> {
        let (bmp_path, file_path, out_dir) = (bmp.as_ref(), file.as_ref(), out_dir.as_ref());
        let mut session = Session::new(Operation::Embed, progress, &self.cancel, &self.options);
        session.scope.set(0.0);

        session.enter(Stage::ReadingContainer);
        let mut container = session.check(read_bmp(
            bmp_path,
            self.options.chunk_size,
            &mut session.scope.sub(0.0, 0.2),
        ))?;

        session.enter(Stage::ReadingPayload);
        let payload = session.check(read_file(
            file_path,
            self.options.chunk_size,
            &mut session.scope.sub(0.2, 0.1),
        ))?;

        session.enter(Stage::BuildingHeader);
        let Ok(size) = u32::try_from(payload.len()) else {
            return session.fail(StegoError::CapacityExceeded {
                required: payload.len() as u64,
                capacity: container.capacity(),
                available: container.available_bits() / 8,
            });
        };
        let header = HideDataHeader::new(&file_extension(file_path), size);

        session.enter(Stage::CheckingCapacity);
        let needed_bits = HIDE_HEADER_BITS as u64 + payload.len() as u64 * 8;
        if needed_bits > container.available_bits() {
            return session.fail(StegoError::CapacityExceeded {
                required: payload.len() as u64,
                capacity: container.capacity(),
                available: container.available_bits() / 8,
            });
        }

        session.enter(Stage::Transferring);
        let header_bytes = header.to_bytes();
        let slots = &mut container.image_data[..needed_bits as usize];
        session.check(embed_bits(
            slots,
            bits(&header_bytes).chain(bits(&payload)),
            &mut session.scope.sub(0.3, 0.5),
        ))?;

        session.enter(Stage::WritingOutput);
        let target = hided_path(bmp_path, out_dir);
        let chunk_size = self.options.chunk_size;
        let mut write_scope = session.scope.sub(0.8, 0.2);
        let written = session.check(write_atomically(&target, |writer| {
            container.write_to(writer, chunk_size, &mut write_scope, &target)
        }))?;

        session.scope.set(1.0);
        session.enter(Stage::Done);
        session.scope.output(written.clone());
        info!(
            "embedded {} bytes from '{}' into '{}'",
            payload.len(),
            file_path.display(),
            written.display()
        );
        Ok(written)
    }

    /// 从 `bmp` 中恢复隐藏的文件，写出 `{out_dir}/{bmp 文件名}_extracted[.扩展名]` 并返回实际路径。
    ///
    /// # Errors
    ///
    /// * `Format` - `bmp` 不是受支持的 BMP
    /// * `Integrity` - 数据头标识不匹配，或声明的长度超出容器
    /// * `Io` - 读写失败
    /// * `Cancelled` - 取消标记被触发
    pub fn extract(
        &self,
        bmp: impl AsRef<Path>,
        out_dir: impl AsRef<Path>,
        progress: Option<&dyn ProgressHandler>,
    ) -> Result<PathBuf, CodecError> {
        let (bmp_path, out_dir) = (bmp.as_ref(), out_dir.as_ref());
        let mut session = Session::new(Operation::Extract, progress, &self.cancel, &self.options);
        session.scope.set(0.0);

        session.enter(Stage::ReadingContainer);
        let container = session.check(read_bmp(
            bmp_path,
            self.options.chunk_size,
            &mut session.scope.sub(0.0, 0.3),
        ))?;

        session.enter(Stage::Transferring);
        let Some(header) = read_header(&container) else {
            return session.fail(StegoError::Integrity(
                "container is too small to hold a header".to_string(),
            ));
        };
        session.scope.set(0.3);

        if !header.is_valid() {
            return session.fail(StegoError::Integrity("magic mismatch".to_string()));
        }
        session.scope.set(0.4);

        let payload_bits = header.size as usize * 8;
        let Some(slots) = container
            .image_data
            .get(HIDE_HEADER_BITS..HIDE_HEADER_BITS + payload_bits)
        else {
            return session.fail(StegoError::Integrity(format!(
                "declared payload of {} bytes exceeds the container",
                header.size
            )));
        };
        let bits = session.check(extract_bits(slots, &mut session.scope.sub(0.4, 0.4)))?;
        let data = bits_to_bytes(&bits);

        session.enter(Stage::WritingOutput);
        let mut extension = header.extension();
        if !is_safe_extension(&extension) {
            warn!("ignoring unsafe recovered extension {extension:?}");
            extension.clear();
        }
        let target = extracted_path(bmp_path, out_dir, &extension);
        let chunk_size = self.options.chunk_size;
        let mut write_scope = session.scope.sub(0.8, 0.2);
        let written = session.check(write_atomically(&target, |writer| {
            write_chunks(writer, &data, chunk_size, &mut write_scope, &target)
        }))?;

        session.scope.set(1.0);
        session.enter(Stage::Done);
        session.scope.output(written.clone());
        info!(
            "extracted {} bytes from '{}' into '{}'",
            data.len(),
            bmp_path.display(),
            written.display()
        );
        Ok(written)
    }

    /// 检查 `bmp` 的前 160 个最低位是否组成了有效的数据头。
    ///
    /// 标识不匹配时返回 `Ok(false)`，只有读取失败才返回错误。
    pub fn verify(
        &self,
        bmp: impl AsRef<Path>,
        progress: Option<&dyn ProgressHandler>,
    ) -> Result<bool, CodecError> {
        let bmp_path = bmp.as_ref();
        let mut session = Session::new(Operation::Verify, progress, &self.cancel, &self.options);
        session.scope.set(0.0);

        session.enter(Stage::ReadingContainer);
        let container = session.check(read_bmp(
            bmp_path,
            self.options.chunk_size,
            &mut session.scope.sub(0.0, 0.7),
        ))?;

        session.enter(Stage::Transferring);
        let header = read_header(&container);
        session.scope.set(0.9);

        let valid = header.is_some_and(|h| h.is_valid());
        session.scope.set(1.0);
        session.enter(Stage::Done);
        info!(
            "'{}' {} a valid hidden data header",
            bmp_path.display(),
            if valid { "carries" } else { "does not carry" }
        );
        Ok(valid)
    }

    /// 可隐藏的最大载荷字节数: `available_bits / 8 - 20`。
    pub fn compute_capacity(&self, bmp: impl AsRef<Path>) -> Result<u64, CodecError> {
        let mut session = Session::new(
            Operation::ComputeCapacity,
            None,
            &self.cancel,
            &self.options,
        );
        session.enter(Stage::ReadingContainer);
        let container = session.check(read_bmp(
            bmp.as_ref(),
            self.options.chunk_size,
            &mut session.scope.sub(0.0, 1.0),
        ))?;
        Ok(container.capacity())
    }

    /// 一次读取中汇总容器的几何信息、容量和已隐藏的数据头。
    pub fn inspect(&self, bmp: impl AsRef<Path>) -> Result<ContainerInfo, CodecError> {
        let mut session = Session::new(Operation::Inspect, None, &self.cancel, &self.options);
        session.enter(Stage::ReadingContainer);
        let container = session.check(read_bmp(
            bmp.as_ref(),
            self.options.chunk_size,
            &mut session.scope.sub(0.0, 1.0),
        ))?;

        let info = &container.info_header;
        Ok(ContainerInfo {
            width: info.width,
            height: info.height,
            bit_count: info.bit_count,
            image_bytes: container.image_data.len(),
            capacity: container.capacity(),
            payload: read_header(&container).filter(HideDataHeader::is_valid),
        })
    }
}

/// 像素数据不足 160 字节时返回 `None`。
fn read_header(container: &BmpFile) -> Option<HideDataHeader> {
    let slots = container.image_data.get(..HIDE_HEADER_BITS)?;
    let bits: Vec<bool> = slots.iter().map(|&b| extract_bit(b)).collect();
    HideDataHeader::parse(&bits)
}
