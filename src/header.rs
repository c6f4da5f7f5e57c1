//! # 隐写数据头模块
//!
//! 20 字节的元数据记录，写在像素数据最前面的 160 个最低位中:
//!
//! | 偏移 | 长度 | 内容                                   |
//! |------|------|----------------------------------------|
//! | 0    | 4    | 载荷长度 (u32, 小端)                   |
//! | 4    | 8    | 标识 `SDSC0623`，没有 NUL 结尾          |
//! | 12   | 8    | 扩展名 (ASCII，最多 7 个字符，以 0 填充) |
//!
//! 标识是唯一的完整性检查，没有校验和。像素最低位恰好组成该标识的图像会被误判为有效。

use byteorder::{ByteOrder, LittleEndian};

use crate::bits::bits_to_bytes;
use crate::constants::{EXTENSION_FIELD_SIZE, HIDE_HEADER_BITS, HIDE_HEADER_SIZE, HIDE_MAGIC};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HideDataHeader {
    pub size: u32,
    pub id: [u8; 8],
    pub extension: [u8; EXTENSION_FIELD_SIZE],
}

impl HideDataHeader {
    /// 为载荷构建数据头。扩展名最多保留 7 个字符，大小写不变，非 ASCII 字符写为 `?`。
    pub fn new(extension: &str, size: u32) -> Self {
        let mut field = [0u8; EXTENSION_FIELD_SIZE];
        extension
            .chars()
            .take(EXTENSION_FIELD_SIZE - 1)
            .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
            .zip(field.iter_mut())
            .for_each(|(byte, slot)| *slot = byte);

        Self {
            size,
            id: HIDE_MAGIC,
            extension: field,
        }
    }

    pub fn to_bytes(&self) -> [u8; HIDE_HEADER_SIZE] {
        let mut buf = [0u8; HIDE_HEADER_SIZE];
        LittleEndian::write_u32(&mut buf[0..4], self.size);
        buf[4..12].copy_from_slice(&self.id);
        buf[12..20].copy_from_slice(&self.extension);
        buf
    }

    pub fn from_bytes(buf: &[u8; HIDE_HEADER_SIZE]) -> Self {
        let mut id = [0u8; 8];
        let mut extension = [0u8; EXTENSION_FIELD_SIZE];
        id.copy_from_slice(&buf[4..12]);
        extension.copy_from_slice(&buf[12..20]);

        Self {
            size: LittleEndian::read_u32(&buf[0..4]),
            id,
            extension,
        }
    }

    /// 把 bit 序列的前 160 位解释为数据头，不足 160 位时返回 `None`。
    pub fn parse(bits: &[bool]) -> Option<Self> {
        let bits = bits.get(..HIDE_HEADER_BITS)?;
        let bytes: [u8; HIDE_HEADER_SIZE] = bits_to_bytes(bits).try_into().ok()?;
        Some(Self::from_bytes(&bytes))
    }

    /// 标识逐字节等于 `SDSC0623` 时有效。
    pub fn is_valid(&self) -> bool {
        self.id == HIDE_MAGIC
    }

    /// 第一个 NUL 之前的扩展名。
    pub fn extension(&self) -> String {
        let end = self
            .extension
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(EXTENSION_FIELD_SIZE);
        String::from_utf8_lossy(&self.extension[..end]).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::bytes_to_bits;

    #[test]
    fn layout_keeps_magic_unterminated() {
        let header = HideDataHeader::new("txt", 50);
        let bytes = header.to_bytes();

        assert_eq!(&bytes[0..4], &[50, 0, 0, 0]);
        assert_eq!(&bytes[4..12], b"SDSC0623");
        // 扩展名紧跟在第 12 字节，标识后面没有额外的结尾字节
        assert_eq!(&bytes[12..20], b"txt\0\0\0\0\0");
    }

    #[test]
    fn extension_is_truncated_to_seven_chars() {
        let header = HideDataHeader::new("Markdown", 1);
        assert_eq!(&header.extension, b"Markdow\0");
        assert_eq!(header.extension(), "Markdow");
    }

    #[test]
    fn empty_extension_is_all_zero() {
        let header = HideDataHeader::new("", 7);
        assert_eq!(header.extension, [0u8; 8]);
        assert_eq!(header.extension(), "");
    }

    #[test]
    fn parse_reads_the_first_160_bits() {
        let header = HideDataHeader::new("PNG", 0xDEAD_BEEF);
        let mut bits = bytes_to_bits(&header.to_bytes());
        bits.extend([true; 40]);

        let parsed = HideDataHeader::parse(&bits).expect("enough bits");
        assert_eq!(parsed, header);
        assert!(parsed.is_valid());
        assert_eq!(parsed.extension(), "PNG");
    }

    #[test]
    fn parse_needs_a_full_header() {
        assert!(HideDataHeader::parse(&[false; 159]).is_none());
    }

    #[test]
    fn validation_is_exact_and_case_sensitive() {
        let mut header = HideDataHeader::new("bin", 3);
        header.id = *b"sdsc0623";
        assert!(!header.is_valid());
        header.id = *b"SDSC0623";
        assert!(header.is_valid());
    }
}
