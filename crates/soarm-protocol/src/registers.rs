//! 舵机控制表寄存器常量
//!
//! 地址来自 SCS 系列总线舵机的控制表。只列出运动控制实际用到的
//! 寄存器；完整控制表见舵机手册。

/// 力矩使能（1 字节，0 = 释放，1 = 锁定）
pub const TORQUE_ENABLE: u8 = 40;

/// 目标位置（2 字节，0-4095 对应一整圈）
pub const GOAL_POSITION: u8 = 42;

/// 运行速度（2 字节，0-1023，0 = 不限速）
pub const MOVING_SPEED: u8 = 46;

/// 当前位置（2 字节，只读）
pub const PRESENT_POSITION: u8 = 56;

/// 当前速度（2 字节，只读）
pub const PRESENT_SPEED: u8 = 58;

/// 当前负载（2 字节，只读）
pub const PRESENT_LOAD: u8 = 60;

/// 位置编码的最大值（一整圈）
pub const POSITION_MAX: u16 = 4095;

/// 位置编码的名义中心
pub const POSITION_CENTER: u16 = 2048;

/// 速度编码的最大值
pub const SPEED_MAX: u16 = 1023;

/// 总线默认波特率
pub const DEFAULT_BAUD: u32 = 1_000_000;
