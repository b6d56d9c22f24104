//! # SO-ARM Bus Adapter Layer
//!
//! 串行总线硬件抽象层，提供统一的总线接口抽象。
//!
//! 总线是半双工的请求/应答模式：每次操作写出一个指令帧，然后
//! 阻塞等待目标舵机的应答帧（或超时）。同一条总线上**同一时刻
//! 只能有一个事务在进行**——`Bus` 的所有方法都取 `&mut self`，
//! 独占访问由所有权保证，不需要运行时加锁。

use std::time::Duration;

pub use soarm_protocol::ProtocolError;
pub use soarm_protocol::registers::DEFAULT_BAUD;

pub mod serial;
pub use serial::SerialBus;

#[cfg(any(test, feature = "mock"))]
pub mod mock;
#[cfg(any(test, feature = "mock"))]
pub use mock::{MockBus, MockWrite};

use thiserror::Error;

/// 总线层统一错误类型
///
/// 两类故障必须区分开：
///
/// - **可恢复**（单个关节的问题）：[`BusError::NoResponse`] 舵机不应答
///   （断线 / 未上电），[`BusError::Malformed`] 应答帧损坏（接线 / 噪声）。
///   调用方跳过该关节继续工作。
/// - **致命**（连接本身的问题）：[`BusError::PortUnavailable`]、
///   [`BusError::Io`]。调用方应中止当前序列。
#[derive(Error, Debug)]
pub enum BusError {
    /// 串口无法打开或已关闭
    #[error("serial port '{port}' unavailable: {reason}")]
    PortUnavailable { port: String, reason: String },

    /// 串口级 IO 错误（连接已失效）
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 舵机在超时时间内没有应答
    #[error("no response from servo {id}")]
    NoResponse { id: u8 },

    /// 应答帧损坏
    #[error("malformed response: {0}")]
    Malformed(#[from] ProtocolError),
}

impl BusError {
    /// 是否为致命错误（连接失效，序列应当中止）
    pub fn is_fatal(&self) -> bool {
        matches!(self, BusError::PortUnavailable { .. } | BusError::Io(_))
    }
}

/// 半双工串行总线的统一抽象
///
/// 所有操作同步阻塞，直到收到应答或协议级超时。实现方负责
/// 半双工时序（写前清空残留输入、写后读取定长应答帧）。
pub trait Bus {
    /// 写单字节寄存器
    fn write_u8(&mut self, id: u8, register: u8, value: u8) -> Result<(), BusError>;

    /// 写双字节寄存器
    fn write_u16(&mut self, id: u8, register: u8, value: u16) -> Result<(), BusError>;

    /// 读双字节寄存器
    fn read_u16(&mut self, id: u8, register: u8) -> Result<u16, BusError>;

    /// 探测舵机是否在线
    fn ping(&mut self, id: u8) -> Result<(), BusError>;

    /// 设置单次事务的应答超时
    fn set_reply_timeout(&mut self, _timeout: Duration) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        let port_gone = BusError::PortUnavailable {
            port: "/dev/ttyUSB0".into(),
            reason: "port is closed".into(),
        };
        assert!(port_gone.is_fatal());
        assert!(BusError::Io(std::io::Error::other("gone")).is_fatal());

        assert!(!BusError::NoResponse { id: 3 }.is_fatal());
        assert!(!BusError::Malformed(ProtocolError::InvalidHeader).is_fatal());
    }
}
