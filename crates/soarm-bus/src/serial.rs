//! 串口总线适配器实现
//!
//! 基于 `serialport` crate，支持 Linux / macOS / Windows 下的
//! USB 转 TTL 串口。
//!
//! ## 半双工时序
//!
//! 总线上请求与应答共用一对数据线。每次事务：
//!
//! 1. 清空输入缓冲（丢弃上一次事务可能残留的字节）
//! 2. 写出完整指令帧
//! 3. 阻塞读取定长应答帧，超时即认为目标舵机不在线
//!
//! ## 连接语义
//!
//! 一个 [`SerialBus`] 独占一个物理串口。[`SerialBus::close`] 是幂等的，
//! 关闭后的任何事务返回 [`BusError::PortUnavailable`]。

use crate::{Bus, BusError};
use serialport::{ClearBuffer, SerialPort};
use soarm_protocol::{ProtocolError, StatusPacket, packet};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// 默认单次事务应答超时
///
/// 1 Mbps 下一个应答帧不足 0.1ms，超时余量主要覆盖 USB 调度延迟。
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_millis(50);

/// 串口总线适配器
///
/// # 示例
///
/// ```no_run
/// use soarm_bus::{Bus, SerialBus, DEFAULT_BAUD};
///
/// let mut bus = SerialBus::open("/dev/ttyUSB0", DEFAULT_BAUD)?;
/// let position = bus.read_u16(1, soarm_protocol::registers::PRESENT_POSITION)?;
/// bus.close();
/// # Ok::<(), soarm_bus::BusError>(())
/// ```
pub struct SerialBus {
    /// 串口句柄；`None` 表示已关闭
    port: Option<Box<dyn SerialPort>>,
    /// 串口路径（用于日志和错误信息）
    path: String,
    /// 应答超时
    reply_timeout: Duration,
}

impl SerialBus {
    /// 打开串口
    ///
    /// # 错误
    ///
    /// - [`BusError::PortUnavailable`]: 串口不存在、被占用或权限不足
    pub fn open(path: impl Into<String>, baud: u32) -> Result<Self, BusError> {
        let path = path.into();
        let port = serialport::new(&path, baud)
            .timeout(DEFAULT_REPLY_TIMEOUT)
            .open()
            .map_err(|e| BusError::PortUnavailable {
                port: path.clone(),
                reason: e.to_string(),
            })?;

        debug!(port = %path, baud, "serial bus opened");
        Ok(Self {
            port: Some(port),
            path,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
        })
    }

    /// 关闭串口（幂等）
    pub fn close(&mut self) {
        if self.port.take().is_some() {
            debug!(port = %self.path, "serial bus closed");
        }
    }

    /// 串口是否仍然打开
    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    /// 串口路径
    pub fn path(&self) -> &str {
        &self.path
    }

    /// 当前应答超时
    pub fn reply_timeout(&self) -> Duration {
        self.reply_timeout
    }

    /// 执行一次请求/应答事务
    ///
    /// `reply_params` 为期望的应答参数字节数（WRITE/PING 为 0，
    /// 读 N 字节寄存器为 N）。
    fn transact(&mut self, request: &[u8], reply_params: usize) -> Result<StatusPacket, BusError> {
        let id = request[2];
        let port = self.port.as_mut().ok_or_else(|| BusError::PortUnavailable {
            port: self.path.clone(),
            reason: "port is closed".into(),
        })?;

        port.clear(ClearBuffer::Input)
            .map_err(|e| BusError::Io(std::io::Error::other(e)))?;
        port.write_all(request)?;
        port.flush()?;

        let mut buf = vec![0u8; StatusPacket::wire_len(reply_params)];
        match port.read_exact(&mut buf) {
            Ok(()) => {},
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::TimedOut | std::io::ErrorKind::UnexpectedEof
                ) =>
            {
                trace!(id, "no reply within timeout");
                return Err(BusError::NoResponse { id });
            },
            Err(e) => return Err(BusError::Io(e)),
        }

        let status = StatusPacket::parse(&buf)?;
        if status.id != id {
            return Err(BusError::Malformed(ProtocolError::UnexpectedId {
                expected: id,
                actual: status.id,
            }));
        }
        if status.flags != 0 {
            warn!(id, flags = status.flags, "servo reports error flags");
        }
        Ok(status)
    }
}

impl Bus for SerialBus {
    fn write_u8(&mut self, id: u8, register: u8, value: u8) -> Result<(), BusError> {
        self.transact(&packet::encode_write_u8(id, register, value), 0)?;
        Ok(())
    }

    fn write_u16(&mut self, id: u8, register: u8, value: u16) -> Result<(), BusError> {
        self.transact(&packet::encode_write_u16(id, register, value), 0)?;
        Ok(())
    }

    fn read_u16(&mut self, id: u8, register: u8) -> Result<u16, BusError> {
        let status = self.transact(&packet::encode_read(id, register, 2), 2)?;
        status.param_u16().ok_or(BusError::Malformed(ProtocolError::Truncated {
            expected: StatusPacket::wire_len(2),
            actual: StatusPacket::wire_len(status.params.len()),
        }))
    }

    fn ping(&mut self, id: u8) -> Result<(), BusError> {
        self.transact(&packet::encode_ping(id), 0)?;
        Ok(())
    }

    fn set_reply_timeout(&mut self, timeout: Duration) {
        self.reply_timeout = timeout;
        if let Some(port) = self.port.as_mut() {
            if let Err(e) = port.set_timeout(timeout) {
                warn!(port = %self.path, error = %e, "failed to update reply timeout");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_bus_rejects_transactions() {
        // 不依赖硬件：直接构造已关闭状态
        let mut bus = SerialBus {
            port: None,
            path: "/dev/null".into(),
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
        };
        assert!(!bus.is_open());

        let err = bus.read_u16(1, soarm_protocol::registers::PRESENT_POSITION).unwrap_err();
        assert!(matches!(err, BusError::PortUnavailable { .. }));
        assert!(err.is_fatal());

        // close 幂等
        bus.close();
        bus.close();
    }
}
