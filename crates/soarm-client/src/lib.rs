//! 客户端接口模块
//!
//! 本模块提供 SO-ARM 机械臂的运动规划与执行接口，包括：
//!
//! - 关节注册表与安全范围钳位（[`registry`]）
//! - 轨迹生成（线性 / 缓动 / 梯形速度，[`trajectory`]）
//! - 运动执行器（流式 / 原生两种模式，[`arm`]）
//! - 双臂同步协调（[`dual`]）
//! - 总线诊断（[`diagnostics`]）
//!
//! # 开环设计
//!
//! 本层只负责在正确的时刻把正确的目标位置写上总线；舵机自带
//! 位置伺服，主机侧不做到位检测。所有"完成"都是按时间推定的，
//! 调用方需要确认实际位置时应在运动后调用
//! [`Arm::read_state`](arm::Arm::read_state)。

pub mod arm;
pub mod diagnostics;
pub mod dual;
pub mod error;
pub mod registry;
pub mod trajectory;
pub mod types;

// 重新导出常用类型
pub use arm::{Arm, DEFAULT_SPEED, estimate_settle};
pub use dual::DualArm;
pub use error::ClientError;
pub use registry::{Joint, Registry, UnknownJoint};
pub use trajectory::{Profile, Trajectory};
pub use types::{ArmState, Configuration, Position};
