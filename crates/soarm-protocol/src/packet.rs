//! 指令帧构建与应答帧解析
//!
//! 纯函数实现，不做任何 I/O。总线层负责把这里构建的字节串写到
//! 串口，并把读回的字节串交给 [`StatusPacket::parse`]。
//!
//! # 设计目的
//!
//! 编码 / 解码与传输解耦之后，帧格式可以在没有硬件的情况下
//! 完整测试，总线层只处理超时和半双工时序。

use crate::{HEADER, ProtocolError, word_to_bytes};

/// PING 指令（探测舵机是否在线）
pub const INSTR_PING: u8 = 0x01;

/// READ 指令（读取控制表寄存器）
pub const INSTR_READ: u8 = 0x02;

/// WRITE 指令（写入控制表寄存器）
pub const INSTR_WRITE: u8 = 0x03;

/// 应答帧的固定开销：帧头(2) + id + len + error + checksum
pub const STATUS_OVERHEAD: usize = 6;

/// 计算校验和
///
/// 输入为帧头之后、校验和之前的全部字节（id、len、instr/error、params）。
pub fn checksum(payload: &[u8]) -> u8 {
    let sum: u32 = payload.iter().map(|&b| b as u32).sum();
    !(sum as u8)
}

/// 通用指令帧构建
fn encode(id: u8, instruction: u8, params: &[u8]) -> Vec<u8> {
    let len = params.len() as u8 + 2;
    let mut frame = Vec::with_capacity(params.len() + STATUS_OVERHEAD);
    frame.extend_from_slice(&HEADER);
    frame.push(id);
    frame.push(len);
    frame.push(instruction);
    frame.extend_from_slice(params);
    frame.push(checksum(&frame[2..]));
    frame
}

/// 构建 PING 帧
pub fn encode_ping(id: u8) -> Vec<u8> {
    encode(id, INSTR_PING, &[])
}

/// 构建寄存器读取帧
///
/// `count` 为要读取的字节数（1 字节寄存器传 1，2 字节寄存器传 2）。
pub fn encode_read(id: u8, register: u8, count: u8) -> Vec<u8> {
    encode(id, INSTR_READ, &[register, count])
}

/// 构建单字节寄存器写入帧
pub fn encode_write_u8(id: u8, register: u8, value: u8) -> Vec<u8> {
    encode(id, INSTR_WRITE, &[register, value])
}

/// 构建双字节寄存器写入帧（低字节在前）
pub fn encode_write_u16(id: u8, register: u8, value: u16) -> Vec<u8> {
    let [lo, hi] = word_to_bytes(value);
    encode(id, INSTR_WRITE, &[register, lo, hi])
}

/// 解析后的应答帧
///
/// `flags` 是舵机的错误状态位（过压、过热、过载等），非零不代表
/// 通讯失败，只代表舵机在报告自身状态；由上层决定是否关心。
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatusPacket {
    /// 应答来源的舵机 ID
    pub id: u8,
    /// 舵机错误状态位
    pub flags: u8,
    /// 应答参数（READ 的寄存器内容；WRITE/PING 为空）
    pub params: Vec<u8>,
}

impl StatusPacket {
    /// 携带 `param_count` 字节参数的应答帧的总长度
    pub fn wire_len(param_count: usize) -> usize {
        STATUS_OVERHEAD + param_count
    }

    /// 解析应答帧
    ///
    /// # 错误
    ///
    /// - [`ProtocolError::InvalidHeader`]: 帧头不是 `FF FF`
    /// - [`ProtocolError::Truncated`]: 字节数不足 len 字段声明的长度
    /// - [`ProtocolError::ChecksumMismatch`]: 校验和不符（线路噪声）
    pub fn parse(buf: &[u8]) -> Result<Self, ProtocolError> {
        if buf.len() < STATUS_OVERHEAD {
            return Err(ProtocolError::Truncated {
                expected: STATUS_OVERHEAD,
                actual: buf.len(),
            });
        }
        if buf[0..2] != HEADER {
            return Err(ProtocolError::InvalidHeader);
        }

        let declared = buf[3] as usize + 4;
        if buf.len() < declared {
            return Err(ProtocolError::Truncated {
                expected: declared,
                actual: buf.len(),
            });
        }

        let expected = checksum(&buf[2..declared - 1]);
        let actual = buf[declared - 1];
        if expected != actual {
            return Err(ProtocolError::ChecksumMismatch { expected, actual });
        }

        Ok(StatusPacket {
            id: buf[2],
            flags: buf[4],
            params: buf[5..declared - 1].to_vec(),
        })
    }

    /// 取双字节应答参数（低字节在前）
    ///
    /// 参数不足两字节时返回 `None`。
    pub fn param_u16(&self) -> Option<u16> {
        match self.params.as_slice() {
            [lo, hi, ..] => Some(crate::bytes_to_word(*lo, *hi)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::{GOAL_POSITION, TORQUE_ENABLE};

    #[test]
    fn test_checksum() {
        // id=1, len=4, instr=WRITE, params=[40, 1] -> sum=0x31 -> !0x31=0xCE
        assert_eq!(checksum(&[0x01, 0x04, 0x03, 40, 1]), 0xCE);
    }

    #[test]
    fn test_encode_write_u8() {
        let frame = encode_write_u8(1, TORQUE_ENABLE, 1);
        assert_eq!(frame, vec![0xFF, 0xFF, 0x01, 0x04, 0x03, 40, 1, 0xCE]);
    }

    #[test]
    fn test_encode_write_u16_low_byte_first() {
        let frame = encode_write_u16(2, GOAL_POSITION, 2048);
        // params = [42, 0x00, 0x08]
        assert_eq!(frame[5..8], [42, 0x00, 0x08]);
        assert_eq!(frame[3], 5); // len = 3 params + 2
    }

    #[test]
    fn test_encode_read() {
        let frame = encode_read(3, 56, 2);
        assert_eq!(frame[2], 3);
        assert_eq!(frame[4], INSTR_READ);
        assert_eq!(frame[5..7], [56, 2]);
    }

    #[test]
    fn test_encode_ping() {
        let frame = encode_ping(1);
        assert_eq!(frame.len(), STATUS_OVERHEAD);
        assert_eq!(frame[4], INSTR_PING);
    }

    /// 手工构造一个合法应答帧
    fn status_frame(id: u8, flags: u8, params: &[u8]) -> Vec<u8> {
        let mut buf = vec![0xFF, 0xFF, id, params.len() as u8 + 2, flags];
        buf.extend_from_slice(params);
        buf.push(checksum(&buf[2..]));
        buf
    }

    #[test]
    fn test_parse_status_with_value() {
        let buf = status_frame(1, 0, &[0x00, 0x08]);
        let status = StatusPacket::parse(&buf).unwrap();
        assert_eq!(status.id, 1);
        assert_eq!(status.flags, 0);
        assert_eq!(status.param_u16(), Some(2048));
    }

    #[test]
    fn test_parse_status_empty_params() {
        let buf = status_frame(4, 0, &[]);
        let status = StatusPacket::parse(&buf).unwrap();
        assert_eq!(status.params, Vec::<u8>::new());
        assert_eq!(status.param_u16(), None);
    }

    #[test]
    fn test_parse_invalid_header() {
        let mut buf = status_frame(1, 0, &[]);
        buf[0] = 0x00;
        assert_eq!(
            StatusPacket::parse(&buf),
            Err(ProtocolError::InvalidHeader)
        );
    }

    #[test]
    fn test_parse_truncated() {
        let buf = status_frame(1, 0, &[0x00, 0x08]);
        let err = StatusPacket::parse(&buf[..5]).unwrap_err();
        assert!(matches!(err, ProtocolError::Truncated { .. }));
    }

    #[test]
    fn test_parse_checksum_mismatch() {
        let mut buf = status_frame(1, 0, &[0x00, 0x08]);
        let last = buf.len() - 1;
        buf[last] ^= 0xFF;
        assert!(matches!(
            StatusPacket::parse(&buf),
            Err(ProtocolError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_parse_reports_servo_flags() {
        // 过载位被置起，通讯本身仍然成功
        let buf = status_frame(6, 0b0010_0000, &[]);
        let status = StatusPacket::parse(&buf).unwrap();
        assert_eq!(status.flags, 0b0010_0000);
    }

    #[test]
    fn test_wire_len() {
        assert_eq!(StatusPacket::wire_len(0), 6);
        assert_eq!(StatusPacket::wire_len(2), 8);
    }
}
