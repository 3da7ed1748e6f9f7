//! # fit 子命令 CLI 定义
//!
//! 读取扫描表 CSV，拟合状态方程并绘图
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/fit.rs`

use super::common::{FitOptionArgs, PlotArgs, StructureArgs};

use clap::Args;
use std::path::PathBuf;

/// fit 子命令参数
#[derive(Args, Debug)]
pub struct FitArgs {
    /// Sweep table produced by `eosweep sweep`
    #[arg(short, long)]
    pub input: PathBuf,

    #[command(flatten)]
    pub fit: FitOptionArgs,

    // 用于由 V0 换算 a0
    #[command(flatten)]
    pub structure: StructureArgs,

    /// TOML config file providing [structure] defaults
    #[arg(long, env = "EOSWEEP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write the fit summary as TOML
    #[arg(short, long)]
    pub summary: Option<PathBuf>,

    /// Isolated-atom energy in eV; adds the cohesive energy to the report
    #[arg(long)]
    pub atom_energy: Option<f64>,

    /// Energy-volume plot (.png or .svg)
    #[arg(long, default_value = "eos_volume.png")]
    pub plot: PathBuf,

    /// Energy-lattice-parameter plot (.png or .svg)
    #[arg(long, default_value = "eos_lattice.png")]
    pub lattice_plot: PathBuf,

    #[command(flatten)]
    pub plot_options: PlotArgs,
}
