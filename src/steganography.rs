//! # LSB 传输循环
//!
//! 每个像素字节的最低位承载 1 bit。循环按批处理，每批结束时报告进度、
//! 检查取消并让出时间片，批次数大致固定，与载荷大小无关。

use crate::bits::{embed_bit, extract_bit};
use crate::error::Result;
use crate::progress::ProgressScope;

/// 依次把 `bits` 写入 `slots` 中每个字节的最低位。
///
/// `slots` 的长度决定写入的 bit 数，调用方负责保证 `bits` 至少有这么多个。
pub fn embed_bits<I>(slots: &mut [u8], bits: I, scope: &mut ProgressScope) -> Result<()>
where
    I: IntoIterator<Item = bool>,
{
    let total = slots.len();
    let batch = scope.batch_size(total);
    let mut bits = bits.into_iter();

    for (done, chunk) in slots.chunks_mut(batch).enumerate() {
        for (slot, bit) in chunk.iter_mut().zip(bits.by_ref()) {
            *slot = embed_bit(*slot, bit);
        }
        scope.report(((done + 1) * batch).min(total) as f64 / total as f64);
        scope.checkpoint()?;
    }

    scope.finish();
    Ok(())
}

/// 读出 `slots` 中每个字节的最低位。
pub fn extract_bits(slots: &[u8], scope: &mut ProgressScope) -> Result<Vec<bool>> {
    let total = slots.len();
    let batch = scope.batch_size(total);
    let mut bits = Vec::with_capacity(total);

    for (done, chunk) in slots.chunks(batch).enumerate() {
        bits.extend(chunk.iter().map(|&byte| extract_bit(byte)));
        scope.report(((done + 1) * batch).min(total) as f64 / total as f64);
        scope.checkpoint()?;
    }

    scope.finish();
    Ok(bits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::{bits, bits_to_bytes};
    use crate::error::StegoError;
    use crate::progress::{CancellationToken, Progress};
    use std::sync::Mutex;

    #[test]
    fn embedded_bits_come_back_out() {
        let cancel = CancellationToken::new();
        let mut scope = ProgressScope::new(None, &cancel, 80);
        let payload = b"hidden in plain sight";
        let mut pixels = vec![0xA5u8; payload.len() * 8 + 17];

        embed_bits(&mut pixels[..payload.len() * 8], bits(payload), &mut scope).unwrap();
        let recovered = extract_bits(&pixels[..payload.len() * 8], &mut scope).unwrap();

        assert_eq!(bits_to_bytes(&recovered), payload);
        // 未使用的字节保持原样
        assert!(pixels[payload.len() * 8..].iter().all(|&b| b == 0xA5));
    }

    #[test]
    fn only_least_significant_bits_change() {
        let cancel = CancellationToken::new();
        let mut scope = ProgressScope::new(None, &cancel, 80);
        let original: Vec<u8> = (0..=255).collect();
        let mut pixels = original.clone();

        embed_bits(&mut pixels, std::iter::repeat(true), &mut scope).unwrap();

        for (before, after) in original.iter().zip(&pixels) {
            assert_eq!(before & 0xFE, after & 0xFE);
            assert_eq!(after & 1, 1);
        }
    }

    #[test]
    fn progress_updates_are_bounded() {
        let events = Mutex::new(0usize);
        let handler = |event: Progress| {
            if matches!(event, Progress::Percent(_)) {
                *events.lock().unwrap() += 1;
            }
        };
        let cancel = CancellationToken::new();
        let mut scope = ProgressScope::new(Some(&handler), &cancel, 80);
        let mut pixels = vec![0u8; 1_000_000];

        embed_bits(&mut pixels, std::iter::repeat(false), &mut scope).unwrap();

        let count = *events.lock().unwrap();
        assert!(count > 10 && count <= 82, "unexpected update count {count}");
    }

    #[test]
    fn cancellation_stops_the_loop() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut scope = ProgressScope::new(None, &cancel, 80);
        let mut pixels = vec![0u8; 1000];

        let result = embed_bits(&mut pixels, std::iter::repeat(true), &mut scope);
        assert!(matches!(result, Err(StegoError::Cancelled)));
    }
}
