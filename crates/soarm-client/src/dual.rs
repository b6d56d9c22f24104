//! 双臂同步协调器
//!
//! 组合两个各自独立寻址的 [`Arm`]，提供屏障同步的成对操作：
//! 两条臂的任务都派发之后才开始等待，两条都结束调用才返回。
//!
//! # 并发模型
//!
//! 每条臂有自己的串口连接和自己的线程，协调器不会在两条总线
//! 之间交错写入（它们是物理上独立的连接）。作用域线程保证两个
//! 任务的执行窗口重叠而不是串行。
//!
//! # 连接语义
//!
//! [`DualArm::connect`] 只有在两个串口都打开成功时才返回实例；
//! 半连接状态在类型上不可表示，任何一条臂打开失败都不会启动
//! 任何移动任务。

use crate::arm::Arm;
use crate::error::ClientError;
use crate::registry::Joint;
use crate::trajectory::Profile;
use crate::types::{ArmState, Configuration};
use soarm_bus::{Bus, SerialBus};
use std::time::Duration;
use tracing::{info, warn};

/// 双臂协调器
pub struct DualArm<B: Bus = SerialBus> {
    leader: Arm<B>,
    follower: Arm<B>,
}

impl<B: Bus> std::fmt::Debug for DualArm<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DualArm").finish_non_exhaustive()
    }
}

impl DualArm<SerialBus> {
    /// 打开两条臂的串口
    ///
    /// 任何一个串口打开失败整个构造失败（已打开的那个随 Drop
    /// 关闭），不会出现只有一条臂可用的实例。
    pub fn connect(leader_port: &str, follower_port: &str) -> Result<Self, ClientError> {
        let leader = Arm::connect(leader_port)?;
        let follower = Arm::connect(follower_port)?;
        info!(leader_port, follower_port, "both arms connected");
        Ok(Self { leader, follower })
    }

    /// 关闭两条臂的串口（幂等）
    pub fn disconnect(&mut self) {
        self.leader.disconnect();
        self.follower.disconnect();
    }
}

impl<B: Bus + Send> DualArm<B> {
    /// 用两条已打开的总线组装协调器
    pub fn from_arms(leader: Arm<B>, follower: Arm<B>) -> Self {
        Self { leader, follower }
    }

    pub fn leader_mut(&mut self) -> &mut Arm<B> {
        &mut self.leader
    }

    pub fn follower_mut(&mut self) -> &mut Arm<B> {
        &mut self.follower
    }

    /// 拆回两条臂（测试中检查各自的总线用）
    pub fn into_arms(self) -> (Arm<B>, Arm<B>) {
        (self.leader, self.follower)
    }

    /// 读取两条臂的状态快照
    pub fn read_both(&mut self) -> (ArmState, ArmState) {
        (self.leader.read_state(), self.follower.read_state())
    }

    /// 两条臂并发平滑移动到同一目标（镜像移动）
    ///
    /// 屏障汇合：两条臂都完成后才返回。任一条臂出错返回聚合
    /// 错误；两条都出错时返回 leader 的错误、follower 的记入日志。
    pub fn mirror_move(
        &mut self,
        target: &Configuration,
        duration: Duration,
        profile: Profile,
    ) -> Result<(), ClientError> {
        let Self { leader, follower } = self;
        join_pair(std::thread::scope(|scope| {
            let lead = scope.spawn(|| leader.move_smooth(target, duration, profile));
            let follow = scope.spawn(|| follower.move_smooth(target, duration, profile));
            (lead.join(), follow.join())
        }))
    }

    /// 两条臂同步挥手
    pub fn synchronized_wave(&mut self, cycles: usize) -> Result<(), ClientError> {
        const AMPLITUDE: u16 = 400;
        const PERIOD: Duration = Duration::from_millis(500);

        let Self { leader, follower } = self;
        join_pair(std::thread::scope(|scope| {
            let lead = scope.spawn(|| leader.wave(Joint::WristRoll, AMPLITUDE, cycles, PERIOD));
            let follow =
                scope.spawn(|| follower.wave(Joint::WristRoll, AMPLITUDE, cycles, PERIOD));
            (lead.join(), follow.join())
        }))
    }
}

type ArmOutcome = std::thread::Result<Result<(), ClientError>>;

/// 汇合两条臂的结果
fn join_pair((leader, follower): (ArmOutcome, ArmOutcome)) -> Result<(), ClientError> {
    let leader = flatten("leader", leader);
    let follower = flatten("follower", follower);
    match (leader, follower) {
        (Ok(()), Ok(())) => Ok(()),
        (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
        (Err(leader_err), Err(follower_err)) => {
            warn!(error = %follower_err, "follower arm also failed");
            Err(leader_err)
        },
    }
}

fn flatten(arm: &'static str, outcome: ArmOutcome) -> Result<(), ClientError> {
    match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(ClientError::Arm {
            arm,
            source: Box::new(e),
        }),
        Err(_) => Err(ClientError::ArmPanicked { arm }),
    }
}
