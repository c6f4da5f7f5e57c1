//! # 位平面打包模块
//!
//! 字节与 bit 序列之间的转换。每个字节按 **低位在前** 的顺序展开，
//! 提取时依赖完全相同的顺序，不能改动。

/// 按低位在前的顺序惰性展开字节序列。
pub fn bits(bytes: &[u8]) -> impl Iterator<Item = bool> + '_ {
    bytes
        .iter()
        .flat_map(|&byte| (0..8).map(move |i| (byte >> i) & 1 == 1))
}

pub fn bytes_to_bits(bytes: &[u8]) -> Vec<bool> {
    bits(bytes).collect()
}

/// `bytes_to_bits` 的逆操作，最后不足 8 位的一组以 0 补齐。
pub fn bits_to_bytes(bits: &[bool]) -> Vec<u8> {
    bits.chunks(8)
        .map(|group| {
            group
                .iter()
                .enumerate()
                .fold(0u8, |byte, (i, &bit)| byte | ((bit as u8) << i))
        })
        .collect()
}

/// 清除最低位后写入新的 bit。
#[inline]
pub fn embed_bit(value: u8, bit: bool) -> u8 {
    (value & 0xFE) | bit as u8
}

#[inline]
pub fn extract_bit(value: u8) -> bool {
    value & 0x01 == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_are_lsb_first() {
        assert_eq!(
            bytes_to_bits(&[0b0000_0110]),
            vec![false, true, true, false, false, false, false, false]
        );
        assert_eq!(bytes_to_bits(&[0x80]).last(), Some(&true));
    }

    #[test]
    fn bits_to_bytes_inverts_bytes_to_bits() {
        let data: Vec<u8> = (0..=255).collect();
        assert_eq!(bits_to_bytes(&bytes_to_bits(&data)), data);
    }

    #[test]
    fn partial_group_is_zero_padded() {
        assert_eq!(bits_to_bytes(&[true, false, true]), vec![0b101]);
        assert!(bits_to_bytes(&[]).is_empty());
    }

    #[test]
    fn embed_and_extract_touch_only_the_lsb() {
        assert_eq!(embed_bit(0xFF, false), 0xFE);
        assert_eq!(embed_bit(0x00, true), 0x01);
        assert_eq!(embed_bit(0xAB, true), 0xAB);
        assert!(extract_bit(0x03));
        assert!(!extract_bit(0xFE));
    }
}
