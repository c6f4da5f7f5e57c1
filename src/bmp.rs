//! # BMP 读写模块
//!
//! 手动以小端、无填充的方式编解码 14 字节文件头和 40 字节信息头，
//! 然后分块读写像素数据。只接受未压缩的 24/32 位 BMP。

use std::fs::File;
use std::io::{self, BufReader, ErrorKind, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::debug;

use crate::constants::{
    BMP_HEADER_SIZE, BMP_MAGIC, HIDE_HEADER_SIZE, INFO_HEADER_SIZE, SUPPORTED_BIT_COUNTS,
};
use crate::error::{Result, StegoError};
use crate::files::{read_chunks, write_chunks};
use crate::progress::ProgressScope;

/// BITMAPFILEHEADER
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileHeader {
    pub file_type: u16,
    pub file_size: u32,
    pub reserved1: u16,
    pub reserved2: u16,
    pub offset_data: u32,
}

impl FileHeader {
    pub fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        Ok(Self {
            file_type: reader.read_u16::<LittleEndian>()?,
            file_size: reader.read_u32::<LittleEndian>()?,
            reserved1: reader.read_u16::<LittleEndian>()?,
            reserved2: reader.read_u16::<LittleEndian>()?,
            offset_data: reader.read_u32::<LittleEndian>()?,
        })
    }

    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u16::<LittleEndian>(self.file_type)?;
        writer.write_u32::<LittleEndian>(self.file_size)?;
        writer.write_u16::<LittleEndian>(self.reserved1)?;
        writer.write_u16::<LittleEndian>(self.reserved2)?;
        writer.write_u32::<LittleEndian>(self.offset_data)
    }
}

/// BITMAPINFOHEADER
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InfoHeader {
    pub size: u32,
    pub width: i32,
    pub height: i32,
    pub planes: u16,
    pub bit_count: u16,
    pub compression: u32,
    pub size_image: u32,
    pub x_pixels_per_meter: i32,
    pub y_pixels_per_meter: i32,
    pub colors_used: u32,
    pub colors_important: u32,
}

impl InfoHeader {
    pub fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        Ok(Self {
            size: reader.read_u32::<LittleEndian>()?,
            width: reader.read_i32::<LittleEndian>()?,
            height: reader.read_i32::<LittleEndian>()?,
            planes: reader.read_u16::<LittleEndian>()?,
            bit_count: reader.read_u16::<LittleEndian>()?,
            compression: reader.read_u32::<LittleEndian>()?,
            size_image: reader.read_u32::<LittleEndian>()?,
            x_pixels_per_meter: reader.read_i32::<LittleEndian>()?,
            y_pixels_per_meter: reader.read_i32::<LittleEndian>()?,
            colors_used: reader.read_u32::<LittleEndian>()?,
            colors_important: reader.read_u32::<LittleEndian>()?,
        })
    }

    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(self.size)?;
        writer.write_i32::<LittleEndian>(self.width)?;
        writer.write_i32::<LittleEndian>(self.height)?;
        writer.write_u16::<LittleEndian>(self.planes)?;
        writer.write_u16::<LittleEndian>(self.bit_count)?;
        writer.write_u32::<LittleEndian>(self.compression)?;
        writer.write_u32::<LittleEndian>(self.size_image)?;
        writer.write_i32::<LittleEndian>(self.x_pixels_per_meter)?;
        writer.write_i32::<LittleEndian>(self.y_pixels_per_meter)?;
        writer.write_u32::<LittleEndian>(self.colors_used)?;
        writer.write_u32::<LittleEndian>(self.colors_important)
    }
}

/// 内存中的 BMP 文件。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BmpFile {
    pub file_header: FileHeader,
    pub info_header: InfoHeader,
    /// 两个头部之后、像素数据之前的字节 (更大的 DIB 头、颜色掩码等)，原样保留
    pub gap: Vec<u8>,
    pub image_data: Vec<u8>,
}

impl BmpFile {
    /// 可用于隐写的 bit 数，每个像素字节 1 bit: `width * |height| * bit_count / 8`，
    /// 且不超过实际读到的像素字节数。
    pub fn available_bits(&self) -> u64 {
        let info = &self.info_header;
        // 头部里的尺寸不可信，在 u128 中计算避免溢出
        let geometric = u128::from(info.width.unsigned_abs())
            * u128::from(info.height.unsigned_abs())
            * u128::from(info.bit_count)
            / 8;
        geometric.min(self.image_data.len() as u128) as u64
    }

    /// 去掉 20 字节数据头后可隐藏的最大载荷字节数。
    pub fn capacity(&self) -> u64 {
        (self.available_bits() / 8).saturating_sub(HIDE_HEADER_SIZE as u64)
    }

    /// 从任意 reader 解析 BMP，像素数据按 `chunk_size` 分块读取。
    pub fn read_from<R: Read>(
        reader: &mut R,
        chunk_size: usize,
        scope: &mut ProgressScope,
        path: &Path,
    ) -> Result<Self> {
        let file_header = FileHeader::read_from(reader).map_err(|e| header_error(path, e))?;
        scope.set(0.2);

        if file_header.file_type != BMP_MAGIC {
            return Err(StegoError::Format(format!(
                "'{}' is not a BMP file (magic {:#06x})",
                path.display(),
                file_header.file_type
            )));
        }

        let info_header = InfoHeader::read_from(reader).map_err(|e| header_error(path, e))?;
        scope.set(0.4);

        validate(&file_header, &info_header)?;

        let gap_len = u64::from(file_header.offset_data) - BMP_HEADER_SIZE as u64;
        let mut gap = Vec::new();
        reader
            .by_ref()
            .take(gap_len)
            .read_to_end(&mut gap)
            .map_err(|e| StegoError::io(path, e))?;
        if (gap.len() as u64) < gap_len {
            return Err(StegoError::Format(format!(
                "'{}' ends before its pixel data offset {}",
                path.display(),
                file_header.offset_data
            )));
        }

        let data_len = (file_header.file_size - file_header.offset_data) as usize;
        let mut data_scope = scope.sub(0.4, 0.6);
        let image_data = read_chunks(reader, data_len, chunk_size, &mut data_scope, path)?;

        debug!(
            "read '{}': {}x{} {}bpp, {} pixel bytes",
            path.display(),
            info_header.width,
            info_header.height,
            info_header.bit_count,
            image_data.len()
        );

        Ok(Self {
            file_header,
            info_header,
            gap,
            image_data,
        })
    }

    /// 原样写出两个头部、间隙和像素数据。
    pub fn write_to(
        &self,
        writer: &mut dyn Write,
        chunk_size: usize,
        scope: &mut ProgressScope,
        path: &Path,
    ) -> Result<()> {
        self.file_header
            .write_to(writer)
            .map_err(|e| StegoError::io(path, e))?;
        scope.set(0.2);

        self.info_header
            .write_to(writer)
            .and_then(|()| writer.write_all(&self.gap))
            .map_err(|e| StegoError::io(path, e))?;
        scope.set(0.4);

        let mut data_scope = scope.sub(0.4, 0.6);
        write_chunks(writer, &self.image_data, chunk_size, &mut data_scope, path)
    }
}

/// 打开并读取 BMP 文件。
pub fn read_bmp(path: &Path, chunk_size: usize, scope: &mut ProgressScope) -> Result<BmpFile> {
    let file = File::open(path).map_err(|e| StegoError::io(path, e))?;
    let mut reader = BufReader::new(file);
    BmpFile::read_from(&mut reader, chunk_size, scope, path)
}

fn header_error(path: &Path, err: io::Error) -> StegoError {
    if err.kind() == ErrorKind::UnexpectedEof {
        StegoError::Format(format!(
            "'{}' is too short to be a BMP file",
            path.display()
        ))
    } else {
        StegoError::io(path, err)
    }
}

fn validate(file: &FileHeader, info: &InfoHeader) -> Result<()> {
    if !SUPPORTED_BIT_COUNTS.contains(&info.bit_count) {
        return Err(StegoError::Format(format!(
            "only 24/32-bit BMP files are supported, found {}-bit",
            info.bit_count
        )));
    }
    if info.compression != 0 {
        return Err(StegoError::Format(format!(
            "compressed BMP files are not supported (compression {})",
            info.compression
        )));
    }
    if (info.size as usize) < INFO_HEADER_SIZE {
        return Err(StegoError::Format(format!(
            "unsupported DIB header of {} bytes",
            info.size
        )));
    }
    if info.width <= 0 || info.height == 0 {
        return Err(StegoError::Format(format!(
            "invalid image dimensions {}x{}",
            info.width, info.height
        )));
    }
    if (file.offset_data as usize) < BMP_HEADER_SIZE || file.file_size < file.offset_data {
        return Err(StegoError::Format(format!(
            "inconsistent header: file size {}, pixel data offset {}",
            file.file_size, file.offset_data
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::CancellationToken;
    use std::io::Cursor;

    fn raw_bmp(width: i32, height: i32, bit_count: u16, compression: u32) -> Vec<u8> {
        let data_len = (width * height.abs()) as u32 * u32::from(bit_count) / 8;
        let mut buf = Vec::new();
        FileHeader {
            file_type: BMP_MAGIC,
            file_size: BMP_HEADER_SIZE as u32 + data_len,
            reserved1: 0,
            reserved2: 0,
            offset_data: BMP_HEADER_SIZE as u32,
        }
        .write_to(&mut buf)
        .unwrap();
        InfoHeader {
            size: INFO_HEADER_SIZE as u32,
            width,
            height,
            planes: 1,
            bit_count,
            compression,
            size_image: data_len,
            ..Default::default()
        }
        .write_to(&mut buf)
        .unwrap();
        buf.extend((0..data_len).map(|i| i as u8));
        buf
    }

    fn parse(bytes: &[u8]) -> Result<BmpFile> {
        let cancel = CancellationToken::new();
        let mut scope = ProgressScope::new(None, &cancel, 80);
        BmpFile::read_from(&mut Cursor::new(bytes), 7, &mut scope, Path::new("test.bmp"))
    }

    #[test]
    fn headers_are_packed_little_endian() {
        let bytes = raw_bmp(2, 2, 24, 0);
        assert_eq!(&bytes[0..2], b"BM");
        assert_eq!(&bytes[2..6], &(54u32 + 12).to_le_bytes());
        assert_eq!(&bytes[10..14], &54u32.to_le_bytes());
        assert_eq!(&bytes[14..18], &40u32.to_le_bytes());
        assert_eq!(&bytes[28..30], &24u16.to_le_bytes());
        assert_eq!(bytes.len(), 54 + 12);
    }

    #[test]
    fn read_then_write_is_byte_identical() {
        let bytes = raw_bmp(5, -3, 32, 0);
        let bmp = parse(&bytes).unwrap();
        assert_eq!(bmp.image_data.len(), 60);
        assert_eq!(bmp.available_bits(), 60);
        assert_eq!(bmp.capacity(), 0);

        let cancel = CancellationToken::new();
        let mut scope = ProgressScope::new(None, &cancel, 80);
        let mut out = Vec::new();
        bmp.write_to(&mut out, 7, &mut scope, Path::new("out.bmp"))
            .unwrap();
        assert_eq!(out, bytes);
    }

    #[test]
    fn gap_before_pixel_data_is_preserved() {
        let mut bytes = raw_bmp(4, 4, 24, 0);
        // 在头部之后插入 12 字节，并相应调整偏移和文件大小
        bytes.splice(54..54, [0xAA; 12]);
        let total = bytes.len() as u32;
        bytes[2..6].copy_from_slice(&total.to_le_bytes());
        bytes[10..14].copy_from_slice(&66u32.to_le_bytes());

        let bmp = parse(&bytes).unwrap();
        assert_eq!(bmp.gap, vec![0xAA; 12]);
        assert_eq!(bmp.image_data.len(), 48);
    }

    #[test]
    fn extreme_dimensions_are_capped_by_pixel_bytes() {
        let mut bytes = raw_bmp(40, 25, 24, 0);
        bytes[18..22].copy_from_slice(&i32::MAX.to_le_bytes());
        bytes[22..26].copy_from_slice(&i32::MIN.to_le_bytes());

        let bmp = parse(&bytes).unwrap();
        assert_eq!(bmp.image_data.len(), 3000);
        assert_eq!(bmp.available_bits(), 3000);
        assert_eq!(bmp.capacity(), 3000 / 8 - 20);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = raw_bmp(4, 4, 24, 0);
        bytes[0] = b'P';
        assert!(matches!(parse(&bytes), Err(StegoError::Format(_))));
    }

    #[test]
    fn rejects_short_file_as_format_error() {
        assert!(matches!(parse(b"BM"), Err(StegoError::Format(_))));
        assert!(matches!(parse(b""), Err(StegoError::Format(_))));
    }

    #[test]
    fn rejects_unsupported_bit_depth_and_compression() {
        assert!(matches!(
            parse(&raw_bmp(4, 4, 16, 0)),
            Err(StegoError::Format(_))
        ));
        assert!(matches!(
            parse(&raw_bmp(4, 4, 8, 0)),
            Err(StegoError::Format(_))
        ));
        assert!(matches!(
            parse(&raw_bmp(4, 4, 32, 3)),
            Err(StegoError::Format(_))
        ));
    }

    #[test]
    fn truncated_pixel_data_caps_available_bits() {
        let mut bytes = raw_bmp(10, 10, 24, 0);
        bytes.truncate(54 + 100);
        let bmp = parse(&bytes).unwrap();
        assert_eq!(bmp.image_data.len(), 100);
        assert_eq!(bmp.available_bits(), 100);
    }
}
