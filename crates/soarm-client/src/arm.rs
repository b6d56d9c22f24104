//! 运动执行器与状态读取器
//!
//! [`Arm`] 独占一条总线连接，把轨迹 / 目标位置翻译成限速下发的
//! 寄存器写入。两种工作模式：
//!
//! - **流式模式**（[`Arm::execute`]）：主机按固定节拍逐个下发
//!   航点，速度整形完全由主机侧的轨迹决定
//! - **原生模式**（[`Arm::move_to`]）：一次性写入目标位置和舵机
//!   板载速度，由舵机自行插值，主机按估算时间等待
//!
//! # 故障策略
//!
//! 单个关节的可恢复故障（不应答 / 坏帧）记日志后跳过，其余关节
//! 和后续航点照常进行；连接级的致命故障中止剩余序列并向上传播。
//! 越界目标一律先经注册表钳位，越界值永远不会到达总线。
//!
//! # 开环时序
//!
//! 每个关节在一次移动中经历 Idle → TorqueEnabled → Moving →
//! Settled：Settled 由时间推定（显式等待、估算等待或航点耗尽），
//! 没有"到位"检测。需要确认实际位置时在移动后调用
//! [`Arm::read_state`]。

use crate::error::ClientError;
use crate::registry::{Joint, Registry};
use crate::trajectory::Profile;
use crate::types::{ArmState, Configuration};
use soarm_bus::{Bus, BusError, SerialBus};
use soarm_protocol::registers;
use spin_sleep::SpinSleeper;
use std::time::{Duration, SystemTime};
use tracing::{debug, error, info, warn};

/// 默认运行速度（0-1023 编码，0 = 不限速）
///
/// 250 足够平稳又不拖沓，对应实测约 500 位置单位/秒的行程速度。
pub const DEFAULT_SPEED: u16 = 250;

/// [`DEFAULT_SPEED`] 下的实测行程速度（位置单位/秒）
pub const TRAVEL_UNITS_PER_SECOND: f64 = 500.0;

/// 估算等待的上限
///
/// 估算只依赖一个经验常数，上限防止估算失准时无限阻塞调用方。
pub const MAX_SETTLE: Duration = Duration::from_secs(3);

/// 流式模式的航点下发频率（Hz）
pub const STREAM_RATE_HZ: f64 = 50.0;

/// 流式移动的最少步数
pub const MIN_STREAM_STEPS: usize = 10;

/// 挥手手势用的舵机速度
const WAVE_SPEED: u16 = 400;

/// 估算一次原生模式移动的静置等待时间
///
/// 纯函数，与实际睡眠分离，可独立测试。模型：
/// `(Δ / 500) · (250 / speed) + 0.1s`，上限 [`MAX_SETTLE`]。
pub fn estimate_settle(max_delta: u16, speed: u16) -> Duration {
    let speed = speed.max(1) as f64;
    let seconds =
        (max_delta as f64 / TRAVEL_UNITS_PER_SECOND) * (DEFAULT_SPEED as f64 / speed) + 0.1;
    Duration::from_secs_f64(seconds.min(MAX_SETTLE.as_secs_f64()))
}

/// 单臂运动执行器
///
/// 独占总线句柄：一个 [`Arm`] 的生命周期内只有它在驱动这条连接，
/// 单写者由所有权保证，不需要运行时加锁。
pub struct Arm<B: Bus> {
    bus: B,
    registry: Registry,
    sleeper: SpinSleeper,
}

impl Arm<SerialBus> {
    /// 打开串口并创建执行器
    pub fn connect(port: &str) -> Result<Self, ClientError> {
        let bus = SerialBus::open(port, registers::DEFAULT_BAUD)?;
        info!(port, "arm connected");
        Ok(Self::new(bus))
    }

    /// 关闭串口（幂等）
    pub fn disconnect(&mut self) {
        self.bus.close();
    }
}

impl<B: Bus> Arm<B> {
    /// 用默认安全范围包装一条已打开的总线
    pub fn new(bus: B) -> Self {
        Self::with_registry(bus, Registry::default())
    }

    pub fn with_registry(bus: B, registry: Registry) -> Self {
        Self {
            bus,
            registry,
            sleeper: SpinSleeper::default(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// 读取全部关节的当前位置快照
    ///
    /// 逐个关节读取当前位置寄存器；读取失败的关节从快照中省略，
    /// 不会让整次读取失败——一个接头松动不应该挡住其余五个关节
    /// 的状态上报。
    pub fn read_state(&mut self) -> ArmState {
        let positions = self.read_register_sweep(registers::PRESENT_POSITION);
        ArmState {
            positions,
            speeds: None,
            loads: None,
            timestamp: SystemTime::now(),
        }
    }

    /// 读取位置、速度、负载的完整快照
    pub fn read_state_full(&mut self) -> ArmState {
        let positions = self.read_register_sweep(registers::PRESENT_POSITION);
        let speeds = self.read_register_sweep(registers::PRESENT_SPEED);
        let loads = self.read_register_sweep(registers::PRESENT_LOAD);
        ArmState {
            positions,
            speeds: Some(speeds),
            loads: Some(loads),
            timestamp: SystemTime::now(),
        }
    }

    fn read_register_sweep(&mut self, register: u8) -> Configuration {
        let mut values = Configuration::new();
        for joint in Joint::ALL {
            match self.bus.read_u16(joint.bus_id(), register) {
                Ok(value) => values.set(joint, value),
                Err(e) if e.is_fatal() => {
                    error!(joint = %joint, error = %e, "bus failure during state read");
                },
                Err(e) => {
                    warn!(joint = %joint, error = %e, "joint omitted from snapshot");
                },
            }
        }
        values
    }

    /// 使能 / 释放关节力矩
    pub fn set_torque(&mut self, joints: &[Joint], on: bool) -> Result<(), ClientError> {
        let value = u8::from(on);
        for &joint in joints {
            self.write_u8_forgiving(joint, registers::TORQUE_ENABLE, value)?;
        }
        Ok(())
    }

    /// 设置关节的板载运行速度（0-1023，0 = 不限速）
    pub fn set_speed(&mut self, joints: &[Joint], speed: u16) -> Result<(), ClientError> {
        let speed = speed.min(registers::SPEED_MAX);
        for &joint in joints {
            self.write_u16_forgiving(joint, registers::MOVING_SPEED, speed)?;
        }
        Ok(())
    }

    /// 移动单个关节（原生模式，不等待）
    pub fn move_joint(&mut self, joint: Joint, position: u16, speed: u16) -> Result<(), ClientError> {
        let goal = self.registry.clamp(joint, position);
        self.write_u16_forgiving(joint, registers::MOVING_SPEED, speed.min(registers::SPEED_MAX))?;
        self.write_u16_forgiving(joint, registers::GOAL_POSITION, goal)?;
        Ok(())
    }

    /// 原生模式移动：单次下发目标 + 板载速度
    ///
    /// 每个目标先经安全范围钳位，然后写运行速度和目标位置各一次，
    /// 由舵机板载速度环完成插值。之后等待 `wait`（未提供时按最大
    /// 位移和速度估算，见 [`estimate_settle`]）。
    ///
    /// # 错误
    ///
    /// - [`ClientError::EmptyMove`]: 目标配置为空
    /// - [`ClientError::Bus`]: 连接级致命故障
    pub fn move_to(
        &mut self,
        target: &Configuration,
        speed: Option<u16>,
        wait: Option<Duration>,
    ) -> Result<(), ClientError> {
        if target.is_empty() {
            return Err(ClientError::EmptyMove);
        }
        let speed = speed.unwrap_or(DEFAULT_SPEED);

        // 估算要用移动前的位置
        let before = match wait {
            Some(_) => None,
            None => Some(self.read_state()),
        };

        for (joint, position) in target.iter() {
            self.move_joint(joint, position, speed)?;
        }

        let wait = wait.unwrap_or_else(|| {
            let current = before.as_ref().map(|s| s.positions).unwrap_or_default();
            let max_delta = target
                .iter()
                .filter_map(|(joint, position)| {
                    let goal = self.registry.clamp(joint, position);
                    current
                        .get(joint)
                        .map(|now| (goal as i32 - now as i32).unsigned_abs() as u16)
                })
                .max()
                .unwrap_or(0);
            estimate_settle(max_delta, speed)
        });
        debug!(wait_ms = wait.as_millis() as u64, "settling");
        std::thread::sleep(wait);
        Ok(())
    }

    /// 流式模式：按固定节拍逐个下发航点
    ///
    /// 先对目标关节使能力矩、解除板载限速（节拍由主机控制），
    /// 然后严格按序下发每个航点并睡 `dt`。单关节写失败跳过该
    /// 关节的这个航点，其余照常；致命故障中止剩余序列。
    pub fn execute(&mut self, trajectory: &[Configuration], dt: Duration) -> Result<(), ClientError> {
        let Some(first) = trajectory.first() else {
            return Ok(());
        };
        let joints: Vec<Joint> = first.joints().collect();
        if joints.is_empty() {
            return Err(ClientError::EmptyMove);
        }

        self.set_torque(&joints, true)?;
        self.set_speed(&joints, 0)?;

        for waypoint in trajectory {
            for (joint, position) in waypoint.iter() {
                let goal = self.registry.clamp(joint, position);
                self.write_u16_forgiving(joint, registers::GOAL_POSITION, goal)?;
            }
            self.sleeper.sleep(dt);
        }
        Ok(())
    }

    /// 平滑移动：读取当前状态，生成轨迹并流式执行
    ///
    /// 步数按 50Hz 节拍从 `duration` 推出，最少
    /// [`MIN_STREAM_STEPS`] 步。
    pub fn move_smooth(
        &mut self,
        target: &Configuration,
        duration: Duration,
        profile: Profile,
    ) -> Result<(), ClientError> {
        if target.is_empty() {
            return Err(ClientError::EmptyMove);
        }

        let current = self.read_state();
        let steps = ((duration.as_secs_f64() * STREAM_RATE_HZ) as usize).max(MIN_STREAM_STEPS);
        let dt = duration.div_f64(steps as f64);

        let trajectory = profile.plan(&current.positions, target, steps);
        if trajectory.first().map_or(true, |w| w.is_empty()) {
            // 目标关节一个都没读到当前位置，没有可走的轨迹
            return Err(ClientError::EmptyMove);
        }
        debug!(steps, dt_ms = dt.as_millis() as u64, "streaming trajectory");
        self.execute(&trajectory, dt)
    }

    /// 全部关节回到名义中心（2048）
    pub fn go_home(&mut self, speed: Option<u16>) -> Result<(), ClientError> {
        let home = Configuration::uniform(registers::POSITION_CENTER);
        self.move_to(&home, speed, None)
    }

    /// 挥手手势：关节围绕当前位置做正弦摆动
    ///
    /// 结束后回到摆动中心并释放该关节的力矩。
    pub fn wave(
        &mut self,
        joint: Joint,
        amplitude: u16,
        cycles: usize,
        period: Duration,
    ) -> Result<(), ClientError> {
        let state = self.read_state();
        let center = state
            .positions
            .get(joint)
            .unwrap_or(registers::POSITION_CENTER) as i32;

        self.set_torque(&[joint], true)?;
        self.set_speed(&[joint], WAVE_SPEED)?;

        let steps_per_cycle = ((period.as_secs_f64() * STREAM_RATE_HZ) as usize).max(4);
        let dt = period.div_f64(steps_per_cycle as f64);

        for _ in 0..cycles {
            for i in 0..steps_per_cycle {
                let t = i as f64 / steps_per_cycle as f64;
                let offset = (amplitude as f64 * (std::f64::consts::TAU * t).sin()).round() as i32;
                let goal = self
                    .registry
                    .clamp(joint, (center + offset).clamp(0, registers::POSITION_MAX as i32) as u16);
                self.write_u16_forgiving(joint, registers::GOAL_POSITION, goal)?;
                self.sleeper.sleep(dt);
            }
        }

        let rest = self.registry.clamp(joint, center as u16);
        self.write_u16_forgiving(joint, registers::GOAL_POSITION, rest)?;
        std::thread::sleep(Duration::from_millis(300));
        self.set_torque(&[joint], false)
    }

    /// 单关节写入，可恢复故障跳过，致命故障传播
    fn write_u16_forgiving(
        &mut self,
        joint: Joint,
        register: u8,
        value: u16,
    ) -> Result<(), ClientError> {
        match self.bus.write_u16(joint.bus_id(), register, value) {
            Ok(()) => Ok(()),
            Err(e) => self.forgive(joint, e),
        }
    }

    fn write_u8_forgiving(
        &mut self,
        joint: Joint,
        register: u8,
        value: u8,
    ) -> Result<(), ClientError> {
        match self.bus.write_u8(joint.bus_id(), register, value) {
            Ok(()) => Ok(()),
            Err(e) => self.forgive(joint, e),
        }
    }

    fn forgive(&self, joint: Joint, e: BusError) -> Result<(), ClientError> {
        if e.is_fatal() {
            error!(joint = %joint, error = %e, "bus failure, aborting sequence");
            Err(e.into())
        } else {
            warn!(joint = %joint, error = %e, "write failed, joint skipped");
            Ok(())
        }
    }
}
