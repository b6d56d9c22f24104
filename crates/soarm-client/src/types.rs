//! 客户端层的值类型
//!
//! [`Configuration`] 是一次移动请求的目标位置集合，[`ArmState`]
//! 是状态读取器产出的带时间戳快照。两者都只覆盖部分关节时语义
//! 明确：Configuration 缺席的关节保持不动，ArmState 缺席的关节
//! 代表本次总线读取没有得到应答。

use crate::registry::Joint;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// 舵机位置（0-4095 对应一整圈，2048 为名义中心）
pub type Position = u16;

/// 部分关节到目标位置的映射
///
/// 用固定 6 槽数组实现，迭代顺序恒为总线地址顺序。构建后按值
/// 传递，一次移动消费一份，不会被回放修改。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Configuration {
    slots: [Option<Position>; Joint::COUNT],
}

impl Configuration {
    /// 空配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 所有六个关节都设为同一位置
    pub fn uniform(position: Position) -> Self {
        Self {
            slots: [Some(position); Joint::COUNT],
        }
    }

    /// 链式设置一个关节的目标位置
    pub fn with(mut self, joint: Joint, position: Position) -> Self {
        self.slots[joint.index()] = Some(position);
        self
    }

    /// 设置一个关节的目标位置
    pub fn set(&mut self, joint: Joint, position: Position) {
        self.slots[joint.index()] = Some(position);
    }

    /// 某个关节的位置（未覆盖时为 `None`）
    pub fn get(&self, joint: Joint) -> Option<Position> {
        self.slots[joint.index()]
    }

    /// 是否覆盖了某个关节
    pub fn contains(&self, joint: Joint) -> bool {
        self.slots[joint.index()].is_some()
    }

    /// 覆盖的关节数
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|slot| slot.is_none())
    }

    /// 按总线地址顺序迭代 (关节, 位置)
    pub fn iter(&self) -> impl Iterator<Item = (Joint, Position)> + '_ {
        Joint::ALL
            .into_iter()
            .filter_map(move |joint| self.get(joint).map(|position| (joint, position)))
    }

    /// 按总线地址顺序迭代覆盖的关节
    pub fn joints(&self) -> impl Iterator<Item = Joint> + '_ {
        self.iter().map(|(joint, _)| joint)
    }

    /// 同时被两个配置覆盖的关节
    pub fn common_joints(&self, other: &Configuration) -> impl Iterator<Item = Joint> + '_ {
        let other = *other;
        self.joints().filter(move |&joint| other.contains(joint))
    }
}

impl FromIterator<(Joint, Position)> for Configuration {
    fn from_iter<I: IntoIterator<Item = (Joint, Position)>>(iter: I) -> Self {
        let mut config = Configuration::new();
        for (joint, position) in iter {
            config.set(joint, position);
        }
        config
    }
}

/// 机械臂状态快照
///
/// 只包含本次读取实际应答的关节。`positions.len() < 6` 表示总线
/// 读取降级（某些关节没有应答），但不是错误。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArmState {
    /// 应答关节的当前位置
    pub positions: Configuration,
    /// 当前速度（仅完整读取时填充，原始寄存器值）
    pub speeds: Option<Configuration>,
    /// 当前负载（仅完整读取时填充，原始寄存器值）
    pub loads: Option<Configuration>,
    /// 采集时刻
    pub timestamp: SystemTime,
}

impl ArmState {
    /// 是否有关节没有应答
    pub fn degraded(&self) -> bool {
        self.positions.len() < Joint::COUNT
    }
}
