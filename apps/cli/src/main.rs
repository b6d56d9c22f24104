//! # SO-ARM CLI
//!
//! Command-line interface for SO-ARM robot arm control.
//!
//! ```bash
//! # 配置两条臂的串口
//! soarm-cli config set --leader /dev/ttyUSB0 --follower /dev/ttyUSB1
//!
//! # 查状态、回中、移动（内部：连接 -> 操作 -> 断开）
//! soarm-cli status
//! soarm-cli home
//! soarm-cli move shoulder_pan=2448 gripper=2500 --duration 1.5
//!
//! # 原生模式（舵机侧插值）
//! soarm-cli move wrist_flex=1600 --native --speed 80
//!
//! # 双臂镜像移动 / 逐关节诊断
//! soarm-cli mirror shoulder_lift=1500
//! soarm-cli diagnose
//! ```

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use crossbeam_channel::RecvTimeoutError;
use soarm_bus::SerialBus;
use soarm_client::diagnostics::{self, BusReport, JointHealth};
use soarm_client::{Arm, ArmState, Configuration, DualArm, Joint, Profile};
use std::time::Duration;
use tracing::info;

mod config;

use config::CliConfig;

/// SO-ARM CLI - 机械臂命令行工具
#[derive(Parser, Debug)]
#[command(name = "soarm-cli")]
#[command(about = "Command-line interface for SO-ARM robot arm control", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 查询当前关节位置
    Status {
        #[arg(long, value_enum, default_value_t)]
        arm: ArmSide,
        /// 额外读取速度和负载
        #[arg(long)]
        full: bool,
        /// 以 JSON 输出
        #[arg(long)]
        json: bool,
    },

    /// 全部关节回到中心位置
    Home {
        #[arg(long, value_enum, default_value_t)]
        arm: ArmSide,
        /// 运行速度（0-1023）
        #[arg(long)]
        speed: Option<u16>,
    },

    /// 移动关节到目标位置
    Move {
        /// joint=position 对，如 shoulder_pan=2448
        #[arg(required = true)]
        targets: Vec<String>,
        #[arg(long, value_enum, default_value_t)]
        arm: ArmSide,
        /// 原生模式：单次下发目标，由舵机板载速度环插值
        #[arg(long)]
        native: bool,
        /// 原生模式的运行速度（0-1023）
        #[arg(long)]
        speed: Option<u16>,
        /// 平滑移动时长（秒）
        #[arg(long, default_value_t = 1.0)]
        duration: f64,
        #[arg(long, value_enum, default_value_t)]
        profile: ProfileArg,
        /// 外部记录用的标签（仅写入日志）
        #[arg(long)]
        label: Option<String>,
    },

    /// 关节挥手手势
    Wave {
        #[arg(long, value_enum, default_value_t)]
        arm: ArmSide,
        #[arg(long, default_value = "wrist_roll")]
        joint: String,
        /// 摆动幅度（舵机单位）
        #[arg(long, default_value_t = 400)]
        amplitude: u16,
        #[arg(long, default_value_t = 3)]
        cycles: usize,
        /// 单个周期时长（秒）
        #[arg(long, default_value_t = 0.5)]
        period: f64,
    },

    /// 双臂镜像移动到同一目标
    Mirror {
        /// joint=position 对
        #[arg(required = true)]
        targets: Vec<String>,
        #[arg(long, default_value_t = 1.0)]
        duration: f64,
        #[arg(long, value_enum, default_value_t)]
        profile: ProfileArg,
    },

    /// 双臂同步挥手
    SyncWave {
        #[arg(long, default_value_t = 3)]
        cycles: usize,
    },

    /// 逐关节探测两条臂的可达性
    Diagnose {
        /// 以 JSON 输出
        #[arg(long)]
        json: bool,
    },

    /// 周期刷新状态，Ctrl-C 退出
    Monitor {
        #[arg(long, value_enum, default_value_t)]
        arm: ArmSide,
        /// 更新频率（Hz）
        #[arg(long, default_value_t = 10)]
        frequency: u32,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// 写入串口配置
    Set {
        #[arg(long)]
        leader: Option<String>,
        #[arg(long)]
        follower: Option<String>,
    },
    /// 显示当前配置
    Show,
}

/// 操作哪条臂
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum ArmSide {
    Leader,
    #[default]
    Follower,
}

impl std::fmt::Display for ArmSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ArmSide::Leader => "leader",
            ArmSide::Follower => "follower",
        })
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum ProfileArg {
    Linear,
    #[default]
    Eased,
    Trapezoid,
}

impl std::fmt::Display for ProfileArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ProfileArg::Linear => "linear",
            ProfileArg::Eased => "eased",
            ProfileArg::Trapezoid => "trapezoid",
        })
    }
}

impl From<ProfileArg> for Profile {
    fn from(arg: ProfileArg) -> Self {
        match arg {
            ProfileArg::Linear => Profile::Linear,
            ProfileArg::Eased => Profile::Eased,
            ProfileArg::Trapezoid => Profile::trapezoidal(),
        }
    }
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = CliConfig::load()?;

    match cli.command {
        Commands::Config(command) => run_config(command, config),
        Commands::Status { arm, full, json } => {
            let mut arm = open_arm(&config, arm)?;
            let state = if full {
                arm.read_state_full()
            } else {
                arm.read_state()
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&state)?);
            } else {
                print_state(&state);
            }
            arm.disconnect();
            Ok(())
        },
        Commands::Home { arm, speed } => {
            let mut arm = open_arm(&config, arm)?;
            arm.go_home(speed)?;
            arm.disconnect();
            Ok(())
        },
        Commands::Move {
            targets,
            arm,
            native,
            speed,
            duration,
            profile,
            label,
        } => {
            let target = parse_targets(&targets)?;
            if let Some(label) = label {
                info!(label = %label, "move requested");
            }
            let mut arm = open_arm(&config, arm)?;
            if native {
                arm.move_to(&target, speed, None)?;
            } else {
                arm.move_smooth(&target, secs(duration)?, profile.into())?;
            }
            // 移动后回读，让钳位 / 跳过的关节可检查
            print_state(&arm.read_state());
            arm.disconnect();
            Ok(())
        },
        Commands::Wave {
            arm,
            joint,
            amplitude,
            cycles,
            period,
        } => {
            let joint: Joint = joint.parse()?;
            let mut arm = open_arm(&config, arm)?;
            arm.wave(joint, amplitude, cycles, secs(period)?)?;
            arm.disconnect();
            Ok(())
        },
        Commands::Mirror {
            targets,
            duration,
            profile,
        } => {
            let target = parse_targets(&targets)?;
            let mut dual = open_both(&config)?;
            dual.mirror_move(&target, secs(duration)?, profile.into())?;
            dual.disconnect();
            Ok(())
        },
        Commands::SyncWave { cycles } => {
            let mut dual = open_both(&config)?;
            dual.synchronized_wave(cycles)?;
            dual.disconnect();
            Ok(())
        },
        Commands::Diagnose { json } => run_diagnose(&config, json),
        Commands::Monitor { arm, frequency } => run_monitor(&config, arm, frequency),
    }
}

fn run_config(command: ConfigCommand, mut config: CliConfig) -> Result<()> {
    match command {
        ConfigCommand::Set { leader, follower } => {
            if leader.is_none() && follower.is_none() {
                bail!("nothing to set: pass --leader and/or --follower");
            }
            if let Some(port) = leader {
                config.leader_port = Some(port);
            }
            if let Some(port) = follower {
                config.follower_port = Some(port);
            }
            let path = config.save()?;
            println!("config written to {}", path.display());
            Ok(())
        },
        ConfigCommand::Show => {
            println!("config file: {}", CliConfig::path()?.display());
            println!("leader:   {}", config.leader_port.as_deref().unwrap_or("(unset)"));
            println!("follower: {}", config.follower_port.as_deref().unwrap_or("(unset)"));
            Ok(())
        },
    }
}

fn run_diagnose(config: &CliConfig, json: bool) -> Result<()> {
    let arms = [
        ("leader", config.leader_port.as_deref()),
        ("follower", config.follower_port.as_deref()),
    ];

    let mut reports: Vec<(&str, Option<BusReport>)> = Vec::new();
    for (name, port) in arms {
        let Some(port) = port else {
            eprintln!("{name}: no port configured");
            reports.push((name, None));
            continue;
        };
        match SerialBus::open(port, soarm_bus::DEFAULT_BAUD) {
            Ok(mut bus) => {
                let report = diagnostics::probe(&mut bus);
                if !json {
                    print_report(name, port, &report);
                }
                reports.push((name, Some(report)));
                bus.close();
            },
            Err(e) => {
                eprintln!("{name} ({port}): cannot open port: {e}");
                reports.push((name, None));
            },
        }
    }

    if json {
        let value: serde_json::Map<String, serde_json::Value> = reports
            .into_iter()
            .map(|(name, report)| {
                let value = match report {
                    Some(report) => serde_json::to_value(report).unwrap_or(serde_json::Value::Null),
                    None => serde_json::Value::Null,
                };
                (name.to_string(), value)
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}

fn run_monitor(config: &CliConfig, side: ArmSide, frequency: u32) -> Result<()> {
    let mut arm = open_arm(config, side)?;
    let period = Duration::from_secs_f64(1.0 / frequency.max(1) as f64);

    let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })
    .context("failed to install Ctrl-C handler")?;

    println!("monitoring at {frequency} Hz, Ctrl-C to stop");
    loop {
        print_state(&arm.read_state());
        match stop_rx.recv_timeout(period) {
            Err(RecvTimeoutError::Timeout) => {},
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    arm.disconnect();
    Ok(())
}

/// 按配置打开一条臂
fn open_arm(config: &CliConfig, side: ArmSide) -> Result<Arm<SerialBus>> {
    let port = match side {
        ArmSide::Leader => config.leader_port.as_deref(),
        ArmSide::Follower => config.follower_port.as_deref(),
    }
    .with_context(|| {
        format!("no port configured for the {side} arm; run `soarm-cli config set` first")
    })?;
    Ok(Arm::connect(port)?)
}

fn open_both(config: &CliConfig) -> Result<DualArm> {
    let leader = config
        .leader_port
        .as_deref()
        .context("no leader port configured; run `soarm-cli config set --leader <port>`")?;
    let follower = config
        .follower_port
        .as_deref()
        .context("no follower port configured; run `soarm-cli config set --follower <port>`")?;
    Ok(DualArm::connect(leader, follower)?)
}

/// 解析 joint=position 对
fn parse_targets(pairs: &[String]) -> Result<Configuration> {
    let mut target = Configuration::new();
    for pair in pairs {
        let (name, value) = pair
            .split_once('=')
            .with_context(|| format!("expected joint=position, got '{pair}'"))?;
        let joint: Joint = name.parse()?;
        let position: u16 = value
            .parse()
            .with_context(|| format!("invalid position '{value}' for joint '{name}'"))?;
        target.set(joint, position);
    }
    Ok(target)
}

fn print_state(state: &ArmState) {
    for joint in Joint::ALL {
        match state.positions.get(joint) {
            Some(position) => {
                print!("  [{}] {:<13} {:>4}", joint.bus_id(), joint.name(), position);
                if let Some(speed) = state.speeds.as_ref().and_then(|s| s.get(joint)) {
                    print!("  speed {speed:>4}");
                }
                if let Some(load) = state.loads.as_ref().and_then(|l| l.get(joint)) {
                    print!("  load {load:>4}");
                }
                println!();
            },
            None => println!("  [{}] {:<13} (no response)", joint.bus_id(), joint.name()),
        }
    }
    if state.degraded() {
        println!("  warning: {}/6 joints responding", state.positions.len());
    }
}

fn print_report(name: &str, port: &str, report: &BusReport) {
    println!("{name} ({port}): {}/6 responding", report.responding());
    for entry in &report.joints {
        match entry.health {
            JointHealth::Responding { position } => {
                println!("  [{}] {:<13} position {position}", entry.joint.bus_id(), entry.joint.name());
            },
            JointHealth::Silent => {
                println!("  [{}] {:<13} silent", entry.joint.bus_id(), entry.joint.name());
            },
            JointHealth::Garbled => {
                println!("  [{}] {:<13} garbled reply", entry.joint.bus_id(), entry.joint.name());
            },
        }
    }
}

fn secs(value: f64) -> Result<Duration> {
    if !value.is_finite() || value <= 0.0 {
        bail!("duration must be a positive number of seconds, got {value}");
    }
    Ok(Duration::from_secs_f64(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_targets() {
        let target =
            parse_targets(&["shoulder_pan=2448".into(), "gripper=2500".into()]).unwrap();
        assert_eq!(target.get(Joint::ShoulderPan), Some(2448));
        assert_eq!(target.get(Joint::Gripper), Some(2500));
        assert_eq!(target.len(), 2);
    }

    #[test]
    fn test_parse_targets_rejects_bad_input() {
        assert!(parse_targets(&["shoulder_pan".into()]).is_err());
        assert!(parse_targets(&["elbow=100".into()]).is_err());
        assert!(parse_targets(&["gripper=abc".into()]).is_err());
        assert!(parse_targets(&["gripper=70000".into()]).is_err());
    }

    #[test]
    fn test_profile_arg_mapping() {
        assert_eq!(Profile::from(ProfileArg::Linear), Profile::Linear);
        assert_eq!(Profile::from(ProfileArg::Eased), Profile::Eased);
        assert!(matches!(
            Profile::from(ProfileArg::Trapezoid),
            Profile::Trapezoidal { .. }
        ));
    }

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
