//! 总线诊断
//!
//! 逐个关节探测可达性并分类，用于排查接线 / 供电问题。只复用
//! 总线抽象和关节注册表，不触碰运动执行路径，因此对着 mock
//! 总线也能完整测试。

use crate::registry::Joint;
use crate::types::Position;
use serde::{Deserialize, Serialize};
use soarm_bus::{Bus, BusError};
use soarm_protocol::registers::PRESENT_POSITION;
use tracing::error;

/// 单个关节的探测结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JointHealth {
    /// 正常应答，附当前位置
    Responding { position: Position },
    /// 超时无应答（断线 / 未上电）
    Silent,
    /// 应答帧损坏（接线 / 噪声）
    Garbled,
}

/// 一条总线的探测报告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusReport {
    pub joints: Vec<JointReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JointReport {
    pub joint: Joint,
    pub health: JointHealth,
}

impl BusReport {
    /// 应答的关节数
    pub fn responding(&self) -> usize {
        self.joints
            .iter()
            .filter(|report| matches!(report.health, JointHealth::Responding { .. }))
            .count()
    }

    /// 六个关节是否全部应答
    pub fn all_responding(&self) -> bool {
        self.responding() == Joint::COUNT
    }

    /// 是否至少有一个关节应答
    pub fn any_responding(&self) -> bool {
        self.responding() > 0
    }
}

/// 逐个关节探测可达性
///
/// 对每个关节读一次当前位置寄存器并分类结果。连接级的致命故障
/// 不中止探测（剩余关节照常尝试并记为无应答），诊断的意义正是
/// 在故障现场跑完全程。
pub fn probe<B: Bus>(bus: &mut B) -> BusReport {
    let joints = Joint::ALL
        .into_iter()
        .map(|joint| {
            let health = match bus.read_u16(joint.bus_id(), PRESENT_POSITION) {
                Ok(position) => JointHealth::Responding { position },
                Err(BusError::Malformed(_)) => JointHealth::Garbled,
                Err(e) => {
                    if e.is_fatal() {
                        error!(joint = %joint, error = %e, "bus failure during probe");
                    }
                    JointHealth::Silent
                },
            };
            JointReport { joint, health }
        })
        .collect();
    BusReport { joints }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soarm_bus::MockBus;

    #[test]
    fn test_probe_classification() {
        let mut bus = MockBus::with_positions(&[
            (1, 2048),
            (2, 1500),
            (3, 2200),
            (4, 1800),
            (5, 2048),
            (6, 2500),
        ]);
        bus.silence(2);
        bus.corrupt(5);

        let report = probe(&mut bus);
        assert_eq!(report.joints.len(), Joint::COUNT);
        assert_eq!(report.responding(), 4);
        assert!(!report.all_responding());
        assert!(report.any_responding());

        assert_eq!(
            report.joints[0].health,
            JointHealth::Responding { position: 2048 }
        );
        assert_eq!(report.joints[1].health, JointHealth::Silent);
        assert_eq!(report.joints[4].health, JointHealth::Garbled);
    }

    #[test]
    fn test_probe_dead_bus() {
        let mut bus = MockBus::new();
        for joint in Joint::ALL {
            bus.silence(joint.bus_id());
        }

        let report = probe(&mut bus);
        assert_eq!(report.responding(), 0);
        assert!(!report.any_responding());
    }
}
