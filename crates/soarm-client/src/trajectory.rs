//! 轨迹生成器
//!
//! 纯函数实现，无 I/O，给定输入完全确定。
//!
//! # 算法
//!
//! 三种速度整形策略都把归一化时间 `t = i/steps` 映射为归一化
//! 行程 `s ∈ [0, 1]`，再按 `start + s·(end − start)` 就近取整：
//!
//! - **Linear**: `s = t`，恒速直线插值
//! - **Eased**: smoothstep `s = 3t² − 2t³`，端点速度为零，
//!   避免起停冲击
//! - **Trapezoidal**: 对称的加速 / 匀速 / 减速三段；二次加速段
//!   的峰值速度取 `1/(1 − f)`（f 为加速段占比），使速度在两个
//!   相位边界上一阶连续
//!
//! # 端点不变量
//!
//! 三种策略的 0 号航点都**精确**等于起点、`steps` 号航点都精确
//! 等于终点，不允许累计舍入误差把终点推偏——这是执行器敢于直接
//! 下发最后一个航点的前提。

use crate::registry::Joint;
use crate::types::{Configuration, Position};
use serde::{Deserialize, Serialize};

/// 航点序列：`steps + 1` 个配置，0 号为起点，最后一个为终点。
///
/// 生成后被运动执行器消费一次即丢弃，不做回放。
pub type Trajectory = Vec<Configuration>;

/// 速度整形策略
///
/// 封闭的枚举集合：不存在"未知 profile"的运行时失败路径，
/// 各策略自带参数。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    /// 恒速直线插值
    Linear,
    /// smoothstep 缓动，端点速度为零
    Eased,
    /// 梯形速度曲线
    Trapezoidal {
        /// 加速段占总步数的比例，(0, 0.5]；减速段与之对称
        accel_fraction: f64,
    },
}

impl Default for Profile {
    fn default() -> Self {
        Profile::Eased
    }
}

impl Profile {
    /// 梯形曲线的默认加速段占比
    pub const DEFAULT_ACCEL_FRACTION: f64 = 0.25;

    /// 默认参数的梯形曲线
    pub fn trapezoidal() -> Self {
        Profile::Trapezoidal {
            accel_fraction: Self::DEFAULT_ACCEL_FRACTION,
        }
    }

    /// 生成从 `start` 到 `end` 的航点序列
    ///
    /// 只覆盖同时出现在 `start` 和 `end` 中的关节。`steps` 最小
    /// 按 1 处理，返回序列长度恒为 `steps + 1`。
    pub fn plan(&self, start: &Configuration, end: &Configuration, steps: usize) -> Trajectory {
        let steps = steps.max(1);
        let joints: Vec<Joint> = start.common_joints(end).collect();

        let mut waypoints = Vec::with_capacity(steps + 1);
        for i in 0..=steps {
            let mut waypoint = Configuration::new();
            for &joint in &joints {
                let (Some(a), Some(b)) = (start.get(joint), end.get(joint)) else {
                    continue;
                };
                // 端点直接取原值，中间点走整形插值
                let position = if i == 0 {
                    a
                } else if i == steps {
                    b
                } else {
                    interpolate(a, b, self.shape(i, steps))
                };
                waypoint.set(joint, position);
            }
            waypoints.push(waypoint);
        }
        waypoints
    }

    /// 归一化行程 `s(i) ∈ [0, 1]`
    fn shape(&self, i: usize, steps: usize) -> f64 {
        let t = i as f64 / steps as f64;
        match *self {
            Profile::Linear => t,
            Profile::Eased => t * t * (3.0 - 2.0 * t),
            Profile::Trapezoidal { accel_fraction } => trapezoid_shape(i, steps, accel_fraction),
        }
    }
}

fn interpolate(a: Position, b: Position, s: f64) -> Position {
    let (a, b) = (a as f64, b as f64);
    (a + s * (b - a)).round() as Position
}

/// 梯形速度曲线的归一化行程
///
/// 加速段步数取 `round(steps · accel_fraction)`，并钳位进
/// `[1, (steps − 1) / 2]`，保证匀速段至少保留一步；`steps < 3`
/// 时不存在合法的三段划分，退化为线性。
fn trapezoid_shape(i: usize, steps: usize, accel_fraction: f64) -> f64 {
    let accel_fraction = accel_fraction.clamp(0.0, 0.5);
    let accel_steps =
        (((steps as f64) * accel_fraction).round() as usize).min((steps - 1) / 2);

    let u = i as f64 / steps as f64;
    if accel_steps == 0 {
        return u;
    }

    let f = accel_steps as f64 / steps as f64;
    let peak = 1.0 / (1.0 - f);
    if u <= f {
        // 加速段：速度从 0 线性升到 peak
        peak * u * u / (2.0 * f)
    } else if u < 1.0 - f {
        // 匀速段
        peak * (f / 2.0 + (u - f))
    } else {
        // 减速段，与加速段对称
        1.0 - peak * (1.0 - u) * (1.0 - u) / (2.0 * f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(joint: Joint, position: Position) -> Configuration {
        Configuration::new().with(joint, position)
    }

    const ALL_PROFILES: [Profile; 3] = [
        Profile::Linear,
        Profile::Eased,
        Profile::Trapezoidal {
            accel_fraction: Profile::DEFAULT_ACCEL_FRACTION,
        },
    ];

    #[test]
    fn test_linear_scenario() {
        let start = single(Joint::ShoulderPan, 2048);
        let end = single(Joint::ShoulderPan, 2448);
        let trajectory = Profile::Linear.plan(&start, &end, 4);

        let positions: Vec<Position> = trajectory
            .iter()
            .map(|w| w.get(Joint::ShoulderPan).unwrap())
            .collect();
        assert_eq!(positions, vec![2048, 2148, 2248, 2348, 2448]);
    }

    #[test]
    fn test_length_is_steps_plus_one() {
        let start = single(Joint::ElbowFlex, 1000);
        let end = single(Joint::ElbowFlex, 3000);
        for profile in ALL_PROFILES {
            for steps in [1, 2, 5, 50] {
                assert_eq!(profile.plan(&start, &end, steps).len(), steps + 1);
            }
        }
    }

    #[test]
    fn test_exact_endpoints() {
        // 故意选不整除的距离，端点仍须精确
        let start = Configuration::new()
            .with(Joint::ShoulderLift, 1003)
            .with(Joint::WristRoll, 3777);
        let end = Configuration::new()
            .with(Joint::ShoulderLift, 2991)
            .with(Joint::WristRoll, 612);

        for profile in ALL_PROFILES {
            for steps in [1, 3, 7, 33] {
                let trajectory = profile.plan(&start, &end, steps);
                let first = trajectory.first().unwrap();
                let last = trajectory.last().unwrap();
                for joint in [Joint::ShoulderLift, Joint::WristRoll] {
                    assert_eq!(first.get(joint), start.get(joint));
                    assert_eq!(last.get(joint), end.get(joint));
                }
            }
        }
    }

    #[test]
    fn test_zero_steps_coerced_to_one() {
        let start = single(Joint::Gripper, 1500);
        let end = single(Joint::Gripper, 2500);
        let trajectory = Profile::Eased.plan(&start, &end, 0);
        assert_eq!(trajectory.len(), 2);
        assert_eq!(trajectory[1].get(Joint::Gripper), Some(2500));
    }

    #[test]
    fn test_eased_midpoint_strictly_between() {
        let start = single(Joint::WristFlex, 1000);
        let end = single(Joint::WristFlex, 2000);
        let trajectory = Profile::Eased.plan(&start, &end, 10);

        let mid = trajectory[5].get(Joint::WristFlex).unwrap();
        assert!(mid > 1000 && mid < 2000);
        // smoothstep(0.5) = 0.5
        assert_eq!(mid, 1500);
    }

    #[test]
    fn test_eased_monotonic() {
        let start = single(Joint::ShoulderPan, 600);
        let end = single(Joint::ShoulderPan, 3400);
        let trajectory = Profile::Eased.plan(&start, &end, 40);

        let positions: Vec<Position> = trajectory
            .iter()
            .map(|w| w.get(Joint::ShoulderPan).unwrap())
            .collect();
        assert!(positions.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    /// 航点序列的一阶差分（每步的位移）
    fn first_differences(trajectory: &Trajectory, joint: Joint) -> Vec<i32> {
        let positions: Vec<i32> = trajectory
            .iter()
            .map(|w| w.get(joint).unwrap() as i32)
            .collect();
        positions.windows(2).map(|pair| pair[1] - pair[0]).collect()
    }

    #[test]
    fn test_trapezoid_velocity_continuous_at_phase_boundary() {
        let start = single(Joint::ElbowFlex, 500);
        let end = single(Joint::ElbowFlex, 3500);
        let steps = 40;
        let trajectory = Profile::trapezoidal().plan(&start, &end, steps);
        let diffs = first_differences(&trajectory, Joint::ElbowFlex);

        // accel_fraction 0.25、40 步 -> 加速段 10 步，匀速段 [10, 30)
        let accel_steps = 10;
        let cruise = diffs[steps / 2];
        assert!((diffs[accel_steps] - cruise).abs() <= 1);
        assert!((diffs[steps - accel_steps - 1] - cruise).abs() <= 1);
    }

    #[test]
    fn test_trapezoid_velocity_ramps() {
        let start = single(Joint::ShoulderLift, 500);
        let end = single(Joint::ShoulderLift, 3500);
        let trajectory = Profile::trapezoidal().plan(&start, &end, 40);
        let diffs = first_differences(&trajectory, Joint::ShoulderLift);

        // 加速段位移递增，减速段位移递减（容许取整造成的 ±1 抖动）
        for pair in diffs[..10].windows(2) {
            assert!(pair[1] >= pair[0] - 1);
        }
        for pair in diffs[30..].windows(2) {
            assert!(pair[1] <= pair[0] + 1);
        }
        // 起步和收尾都显著慢于匀速段
        assert!(diffs[0] < diffs[20] / 2);
        assert!(*diffs.last().unwrap() < diffs[20] / 2);
    }

    #[test]
    fn test_trapezoid_symmetry() {
        let start = single(Joint::WristRoll, 1000);
        let end = single(Joint::WristRoll, 3000);
        let steps = 20;
        let trajectory = Profile::trapezoidal().plan(&start, &end, steps);

        for i in 0..=steps {
            let forward = trajectory[i].get(Joint::WristRoll).unwrap() as i32 - 1000;
            let backward = 3000 - trajectory[steps - i].get(Joint::WristRoll).unwrap() as i32;
            assert!((forward - backward).abs() <= 1, "asymmetric at step {i}");
        }
    }

    #[test]
    fn test_trapezoid_small_step_counts_degrade_to_linear() {
        let start = single(Joint::Gripper, 1000);
        let end = single(Joint::Gripper, 3000);
        for steps in [1, 2] {
            let trapezoid = Profile::trapezoidal().plan(&start, &end, steps);
            let linear = Profile::Linear.plan(&start, &end, steps);
            assert_eq!(trapezoid, linear);
        }
    }

    #[test]
    fn test_plan_covers_joint_intersection_only() {
        let start = Configuration::new()
            .with(Joint::ShoulderPan, 2048)
            .with(Joint::ShoulderLift, 1500);
        let end = Configuration::new()
            .with(Joint::ShoulderLift, 2200)
            .with(Joint::Gripper, 2500);

        let trajectory = Profile::Linear.plan(&start, &end, 5);
        for waypoint in &trajectory {
            let joints: Vec<Joint> = waypoint.joints().collect();
            assert_eq!(joints, vec![Joint::ShoulderLift]);
        }
    }

    #[test]
    fn test_stationary_move() {
        let start = single(Joint::WristFlex, 2048);
        let end = single(Joint::WristFlex, 2048);
        for profile in ALL_PROFILES {
            let trajectory = profile.plan(&start, &end, 8);
            assert!(trajectory
                .iter()
                .all(|w| w.get(Joint::WristFlex) == Some(2048)));
        }
    }
}
