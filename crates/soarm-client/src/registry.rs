//! 关节注册表
//!
//! 逻辑关节名到总线地址的映射，以及每个关节的安全位置范围。
//! 纯查表，无 I/O；初始化后只读，可以跨线程自由共享。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// 机械臂的六个逻辑关节
///
/// 关节集合是封闭的：名字和总线地址（1-6）在连接的生命周期内
/// 是稳定的双射。来自外部输入的关节名通过 [`FromStr`] 解析，
/// 解析失败是调用方的编程错误（[`UnknownJoint`]），不做重试。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Joint {
    ShoulderPan,
    ShoulderLift,
    ElbowFlex,
    WristFlex,
    WristRoll,
    Gripper,
}

impl Joint {
    /// 关节数量
    pub const COUNT: usize = 6;

    /// 全部关节，按总线地址顺序
    pub const ALL: [Joint; Joint::COUNT] = [
        Joint::ShoulderPan,
        Joint::ShoulderLift,
        Joint::ElbowFlex,
        Joint::WristFlex,
        Joint::WristRoll,
        Joint::Gripper,
    ];

    /// 总线地址（1-6）
    pub fn bus_id(self) -> u8 {
        self.index() as u8 + 1
    }

    /// 数组下标（0-5）
    pub fn index(self) -> usize {
        self as usize
    }

    /// 逻辑关节名
    pub fn name(self) -> &'static str {
        match self {
            Joint::ShoulderPan => "shoulder_pan",
            Joint::ShoulderLift => "shoulder_lift",
            Joint::ElbowFlex => "elbow_flex",
            Joint::WristFlex => "wrist_flex",
            Joint::WristRoll => "wrist_roll",
            Joint::Gripper => "gripper",
        }
    }
}

impl fmt::Display for Joint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 未知关节名（编程错误，不可重试）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown joint name: '{0}'")]
pub struct UnknownJoint(pub String);

impl FromStr for Joint {
    type Err = UnknownJoint;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Joint::ALL
            .into_iter()
            .find(|joint| joint.name() == s)
            .ok_or_else(|| UnknownJoint(s.to_string()))
    }
}

/// 编译期内置的默认安全范围（舵机单位）
///
/// 肩 / 肘 / 腕关节 [500, 3500]，夹爪 [1000, 3000]。
/// 全部是 [0, 4095] 的真子集。
const DEFAULT_LIMITS: [(u16, u16); Joint::COUNT] = [
    (500, 3500),  // shoulder_pan
    (500, 3500),  // shoulder_lift
    (500, 3500),  // elbow_flex
    (500, 3500),  // wrist_flex
    (500, 3500),  // wrist_roll
    (1000, 3000), // gripper
];

/// 关节安全范围注册表
///
/// [`Registry::clamp`] 实施"有损但安全"策略：越界目标被钳位到
/// 最近的边界后照常下发，这不是错误，只在 debug 级别留一条日志。
/// 越界值**永远不会**到达总线。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registry {
    limits: [(u16, u16); Joint::COUNT],
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            limits: DEFAULT_LIMITS,
        }
    }
}

impl Registry {
    /// 关节的安全范围 (min, max)
    pub fn safe_range(&self, joint: Joint) -> (u16, u16) {
        self.limits[joint.index()]
    }

    /// 把目标位置钳位进关节的安全范围
    pub fn clamp(&self, joint: Joint, position: u16) -> u16 {
        let (min, max) = self.safe_range(joint);
        let clamped = position.clamp(min, max);
        if clamped != position {
            debug!(joint = %joint, requested = position, sent = clamped, "position clamped to safe range");
        }
        clamped
    }
}
