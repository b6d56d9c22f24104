//! # SO-ARM Protocol
//!
//! 机械臂串行总线协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `registers`: 舵机控制表寄存器常量
//! - `packet`: 指令帧构建 / 应答帧解析
//!
//! ## 帧格式
//!
//! 总线为半双工请求/应答模式，使用 SCS 系列舵机的帧格式：
//!
//! ```text
//! 指令帧: [0xFF, 0xFF, id, len, instr, params.., checksum]
//! 应答帧: [0xFF, 0xFF, id, len, error, params.., checksum]
//! ```
//!
//! `len = params.len() + 2`，`checksum = !(id + len + instr + Σparams)`。
//!
//! ## 字节序
//!
//! 16 位寄存器在线缆上低字节在前。本模块提供了字对齐转换工具函数。

pub mod packet;
pub mod registers;

// 重新导出常用类型
pub use packet::*;
pub use registers::*;

use thiserror::Error;

/// 帧头（两个 0xFF）
pub const HEADER: [u8; 2] = [0xFF, 0xFF];

/// 广播 ID（所有舵机响应，但不回复应答帧）
pub const BROADCAST_ID: u8 = 0xFE;

/// 协议解析错误类型
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid frame header")]
    InvalidHeader,

    #[error("Truncated frame: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("Checksum mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    #[error("Unexpected servo id: expected {expected}, got {actual}")]
    UnexpectedId { expected: u8, actual: u8 },
}

/// 字节序转换工具函数
///
/// 总线上 16 位值低字节在前，这些函数用于收发时的字对齐转换。
///
/// u16 转总线字节序
pub fn word_to_bytes(value: u16) -> [u8; 2] {
    [(value & 0xFF) as u8, (value >> 8) as u8]
}

/// 总线字节序转 u16
pub fn bytes_to_word(lo: u8, hi: u8) -> u16 {
    (lo as u16) | ((hi as u16) << 8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_to_bytes() {
        assert_eq!(word_to_bytes(0x0812), [0x12, 0x08]);
        assert_eq!(word_to_bytes(2048), [0x00, 0x08]);
    }

    #[test]
    fn test_bytes_to_word() {
        assert_eq!(bytes_to_word(0x12, 0x08), 0x0812);
        assert_eq!(bytes_to_word(0xFF, 0x0F), 4095);
    }

    #[test]
    fn test_roundtrip_word() {
        for value in [0u16, 1, 250, 2048, 4095, u16::MAX] {
            let [lo, hi] = word_to_bytes(value);
            assert_eq!(bytes_to_word(lo, hi), value);
        }
    }
}
