//! # 文件读写模块
//!
//! 分块读取、写入临时文件后原子替换，以及输出文件的命名规则。
//! 文件句柄只在单次调用内存在，出错时随作用域一起关闭；
//! 未能持久化的临时文件在 drop 时删除。

use std::fs::File;
use std::io::{BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use log::debug;
use tempfile::NamedTempFile;

use crate::constants::{EXTRACTED_SUFFIX, HIDED_SUFFIX};
use crate::error::{Result, StegoError};
use crate::progress::ProgressScope;

const PREALLOC_LIMIT: usize = 64 << 20;

/// 读取整个文件，每读完一块报告一次进度。
pub fn read_file(path: &Path, chunk_size: usize, scope: &mut ProgressScope) -> Result<Vec<u8>> {
    let mut file = File::open(path).map_err(|e| StegoError::io(path, e))?;
    let len = file.metadata().map_err(|e| StegoError::io(path, e))?.len();
    let len = usize::try_from(len)
        .map_err(|_| StegoError::Format(format!("'{}' is too large", path.display())))?;
    read_chunks(&mut file, len, chunk_size, scope, path)
}

/// 从 `reader` 中最多读取 `len` 字节，遇到 EOF 提前结束。
pub fn read_chunks<R: Read>(
    reader: &mut R,
    len: usize,
    chunk_size: usize,
    scope: &mut ProgressScope,
    path: &Path,
) -> Result<Vec<u8>> {
    // 头部声明的长度可能是损坏的，预分配设上限
    let mut data = Vec::with_capacity(len.min(PREALLOC_LIMIT));
    let mut buf = vec![0u8; chunk_size.max(1)];

    while data.len() < len {
        let want = buf.len().min(len - data.len());
        let read = match reader.read(&mut buf[..want]) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(StegoError::io(path, e)),
        };
        data.extend_from_slice(&buf[..read]);
        scope.report(data.len() as f64 / len as f64);
        scope.check_cancelled()?;
    }

    if data.len() < len {
        debug!(
            "'{}' ended after {} of {} expected bytes",
            path.display(),
            data.len(),
            len
        );
    }
    scope.finish();
    Ok(data)
}

/// 分块写出 `data`，每块之后报告进度并检查取消。
pub fn write_chunks(
    writer: &mut dyn Write,
    data: &[u8],
    chunk_size: usize,
    scope: &mut ProgressScope,
    path: &Path,
) -> Result<()> {
    let mut written = 0;
    for chunk in data.chunks(chunk_size.max(1)) {
        writer
            .write_all(chunk)
            .map_err(|e| StegoError::io(path, e))?;
        written += chunk.len();
        scope.report(written as f64 / data.len() as f64);
        scope.check_cancelled()?;
    }
    scope.finish();
    Ok(())
}

/// 先写入 `target` 所在目录中的临时文件，成功后以不覆盖的方式改名。
///
/// 目标在此期间被别人创建时，会继续尝试下一个带数字后缀的名字。
/// 返回最终写入的路径。
pub fn write_atomically<F>(target: &Path, write: F) -> Result<PathBuf>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| StegoError::io(dir, e))?;

    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        write(&mut writer)?;
        writer.flush().map_err(|e| StegoError::io(target, e))?;
    }
    tmp.as_file()
        .sync_all()
        .map_err(|e| StegoError::io(target, e))?;

    let mut candidate = unique_path(target);
    loop {
        match tmp.persist_noclobber(&candidate) {
            Ok(_) => {
                debug!("persisted '{}'", candidate.display());
                return Ok(candidate);
            }
            Err(err) if err.error.kind() == ErrorKind::AlreadyExists => {
                tmp = err.file;
                candidate = unique_path(target);
            }
            Err(err) => return Err(StegoError::io(&candidate, err.error)),
        }
    }
}

/// 已存在时依次尝试 `name_1.ext`、`name_2.ext` ……
pub fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    (1..)
        .map(|n| dir.join(format!("{stem}_{n}{ext}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| path.to_path_buf())
}

/// 不带点的扩展名，没有时为空字符串。
pub fn file_extension(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn base_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `{out_dir}/{bmp 文件名}_hided.bmp`，尚未去重。
pub fn hided_path(bmp: &Path, out_dir: &Path) -> PathBuf {
    out_dir.join(format!("{}{HIDED_SUFFIX}.bmp", base_name(bmp)))
}

/// `{out_dir}/{bmp 文件名}_extracted`，目标本身没有扩展名且 `extension` 非空时追加扩展名。
pub fn extracted_path(bmp: &Path, out_dir: &Path, extension: &str) -> PathBuf {
    let path = out_dir.join(format!("{}{EXTRACTED_SUFFIX}", base_name(bmp)));
    if !extension.is_empty() && path.extension().is_none() {
        path.with_extension(extension)
    } else {
        path
    }
}

/// 恢复出的扩展名只接受 ASCII 字母数字、`_` 和 `-`。
pub fn is_safe_extension(extension: &str) -> bool {
    extension
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::CancellationToken;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn unique_path_appends_counter() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let target = dir.path().join("photo_hided.bmp");
        assert_eq!(unique_path(&target), target);

        fs::write(&target, b"x")?;
        assert_eq!(unique_path(&target), dir.path().join("photo_hided_1.bmp"));

        fs::write(dir.path().join("photo_hided_1.bmp"), b"x")?;
        assert_eq!(unique_path(&target), dir.path().join("photo_hided_2.bmp"));
        Ok(())
    }

    #[test]
    fn extracted_path_appends_extension_only_when_missing() {
        let out = Path::new("/out");
        assert_eq!(
            extracted_path(Path::new("/in/cat.bmp"), out, "txt"),
            PathBuf::from("/out/cat_extracted.txt")
        );
        assert_eq!(
            extracted_path(Path::new("/in/cat.bmp"), out, ""),
            PathBuf::from("/out/cat_extracted")
        );
        // 文件名本身带点时，目标路径已经“有”扩展名
        assert_eq!(
            extracted_path(Path::new("/in/cat.v2.bmp"), out, "txt"),
            PathBuf::from("/out/cat.v2_extracted")
        );
    }

    #[test]
    fn hided_path_uses_bmp_stem() {
        assert_eq!(
            hided_path(Path::new("dir/photo.bmp"), Path::new("out")),
            PathBuf::from("out/photo_hided.bmp")
        );
    }

    #[test]
    fn unsafe_extensions_are_rejected() {
        assert!(is_safe_extension("tar-gz"));
        assert!(is_safe_extension(""));
        assert!(!is_safe_extension("/../x"));
        assert!(!is_safe_extension("a.b"));
    }

    #[test]
    fn atomic_write_leaves_no_file_on_failure() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let target = dir.path().join("out.bin");

        let result = write_atomically(&target, |_| Err(StegoError::Cancelled));
        assert!(matches!(result, Err(StegoError::Cancelled)));
        assert_eq!(fs::read_dir(dir.path())?.count(), 0);

        let written = write_atomically(&target, |w| {
            w.write_all(b"hello").map_err(|e| StegoError::io("mem", e))
        })?;
        assert_eq!(written, target);
        assert_eq!(fs::read(&target)?, b"hello");
        Ok(())
    }

    #[test]
    fn read_chunks_stops_at_eof() -> anyhow::Result<()> {
        let cancel = CancellationToken::new();
        let mut scope = ProgressScope::new(None, &cancel, 80);
        let mut reader: &[u8] = &[1, 2, 3, 4, 5];
        let data = read_chunks(&mut reader, 10, 2, &mut scope, Path::new("mem"))?;
        assert_eq!(data, vec![1, 2, 3, 4, 5]);
        Ok(())
    }
}
