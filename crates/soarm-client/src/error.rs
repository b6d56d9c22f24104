//! 客户端层错误类型定义

use crate::registry::UnknownJoint;
use soarm_bus::BusError;
use thiserror::Error;

/// 客户端层错误类型
///
/// 可恢复的单关节故障不会出现在这里——它们在执行器内部按关节
/// 记日志并跳过（见 [`crate::arm`]），移动后的状态快照可以检查
/// 每个关节的实际落点。到达这里的都是值得中止当前操作的故障。
#[derive(Error, Debug)]
pub enum ClientError {
    /// 总线连接级故障
    #[error(transparent)]
    Bus(#[from] BusError),

    /// 关节名不在固定集合内（编程错误，不重试）
    #[error(transparent)]
    UnknownJoint(#[from] UnknownJoint),

    /// 移动请求没有覆盖任何关节
    #[error("move request covers no joints")]
    EmptyMove,

    /// 双臂操作中某一条臂失败（屏障汇合后的聚合错误）
    #[error("{arm} arm move failed: {source}")]
    Arm {
        arm: &'static str,
        #[source]
        source: Box<ClientError>,
    },

    /// 双臂操作中某一条臂的任务 panic
    #[error("{arm} arm task panicked")]
    ArmPanicked { arm: &'static str },
}
