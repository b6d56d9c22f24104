//! Mock 总线实现（无硬件依赖）
//!
//! 用内存寄存器表代替真实舵机，用于客户端层的测试：
//!
//! - 预置 / 读取任意寄存器
//! - 按舵机 ID 注入静默（不应答）或损坏（坏帧）故障
//! - 记录全部写事务，供断言检查
//!
//! 与真实总线一致：读取从未写入过的舵机按不应答处理。

use crate::{Bus, BusError};
use soarm_protocol::ProtocolError;
use soarm_protocol::registers::PRESENT_POSITION;
use std::collections::{BTreeMap, BTreeSet};

/// 一次写事务的记录
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockWrite {
    U8 { id: u8, register: u8, value: u8 },
    U16 { id: u8, register: u8, value: u16 },
}

/// Mock 总线
#[derive(Debug, Default)]
pub struct MockBus {
    /// (id, register) -> 当前值
    registers: BTreeMap<(u8, u8), u16>,
    /// 注入静默故障的舵机
    silent: BTreeSet<u8>,
    /// 注入坏帧故障的舵机
    garbled: BTreeSet<u8>,
    /// 整条连接已失效（致命故障）
    dead: bool,
    /// 全部写事务，按发生顺序
    writes: Vec<MockWrite>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置各舵机的当前位置
    pub fn with_positions(positions: &[(u8, u16)]) -> Self {
        let mut bus = Self::new();
        for &(id, position) in positions {
            bus.set_register(id, PRESENT_POSITION, position);
        }
        bus
    }

    /// 预置任意寄存器
    pub fn set_register(&mut self, id: u8, register: u8, value: u16) {
        self.registers.insert((id, register), value);
    }

    /// 读取寄存器当前值（测试断言用，不经过 `Bus` 的故障注入）
    pub fn register(&self, id: u8, register: u8) -> Option<u16> {
        self.registers.get(&(id, register)).copied()
    }

    /// 让一个舵机停止应答
    pub fn silence(&mut self, id: u8) {
        self.silent.insert(id);
    }

    /// 让一个舵机返回损坏的应答帧
    pub fn corrupt(&mut self, id: u8) {
        self.garbled.insert(id);
    }

    /// 清除一个舵机上注入的故障
    pub fn restore(&mut self, id: u8) {
        self.silent.remove(&id);
        self.garbled.remove(&id);
    }

    /// 让整条连接失效（之后所有事务返回致命 IO 错误）
    pub fn kill(&mut self) {
        self.dead = true;
    }

    /// 全部写事务
    pub fn writes(&self) -> &[MockWrite] {
        &self.writes
    }

    /// 某个舵机某个寄存器收到的全部 16 位写入值
    pub fn writes_to(&self, id: u8, register: u8) -> Vec<u16> {
        self.writes
            .iter()
            .filter_map(|w| match *w {
                MockWrite::U16 { id: i, register: r, value } if i == id && r == register => {
                    Some(value)
                },
                _ => None,
            })
            .collect()
    }

    fn gate(&self, id: u8) -> Result<(), BusError> {
        if self.dead {
            return Err(BusError::Io(std::io::Error::other("bus connection lost")));
        }
        if self.silent.contains(&id) {
            return Err(BusError::NoResponse { id });
        }
        if self.garbled.contains(&id) {
            return Err(BusError::Malformed(ProtocolError::ChecksumMismatch {
                expected: 0x5A,
                actual: 0xA5,
            }));
        }
        Ok(())
    }
}

impl Bus for MockBus {
    fn write_u8(&mut self, id: u8, register: u8, value: u8) -> Result<(), BusError> {
        self.gate(id)?;
        self.writes.push(MockWrite::U8 { id, register, value });
        self.registers.insert((id, register), value as u16);
        Ok(())
    }

    fn write_u16(&mut self, id: u8, register: u8, value: u16) -> Result<(), BusError> {
        self.gate(id)?;
        self.writes.push(MockWrite::U16 { id, register, value });
        self.registers.insert((id, register), value);
        Ok(())
    }

    fn read_u16(&mut self, id: u8, register: u8) -> Result<u16, BusError> {
        self.gate(id)?;
        self.registers
            .get(&(id, register))
            .copied()
            .ok_or(BusError::NoResponse { id })
    }

    fn ping(&mut self, id: u8) -> Result<(), BusError> {
        self.gate(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soarm_protocol::registers::GOAL_POSITION;

    #[test]
    fn test_preloaded_positions() {
        let mut bus = MockBus::with_positions(&[(1, 2048), (2, 1500)]);
        assert_eq!(bus.read_u16(1, PRESENT_POSITION).unwrap(), 2048);
        assert_eq!(bus.read_u16(2, PRESENT_POSITION).unwrap(), 1500);
    }

    #[test]
    fn test_unknown_servo_is_silent() {
        let mut bus = MockBus::new();
        assert!(matches!(
            bus.read_u16(5, PRESENT_POSITION),
            Err(BusError::NoResponse { id: 5 })
        ));
    }

    #[test]
    fn test_write_log() {
        let mut bus = MockBus::new();
        bus.write_u16(1, GOAL_POSITION, 2100).unwrap();
        bus.write_u8(1, 40, 1).unwrap();

        assert_eq!(bus.writes().len(), 2);
        assert_eq!(bus.writes_to(1, GOAL_POSITION), vec![2100]);
        assert_eq!(bus.register(1, GOAL_POSITION), Some(2100));
    }

    #[test]
    fn test_fault_injection() {
        let mut bus = MockBus::with_positions(&[(1, 2048)]);

        bus.silence(1);
        assert!(matches!(
            bus.read_u16(1, PRESENT_POSITION),
            Err(BusError::NoResponse { .. })
        ));
        assert!(bus.write_u16(1, GOAL_POSITION, 2100).is_err());
        assert!(bus.writes().is_empty());

        bus.restore(1);
        bus.corrupt(1);
        let err = bus.ping(1).unwrap_err();
        assert!(matches!(err, BusError::Malformed(_)));
        assert!(!err.is_fatal());

        bus.restore(1);
        assert_eq!(bus.read_u16(1, PRESENT_POSITION).unwrap(), 2048);
    }
}
