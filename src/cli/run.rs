//! # run 子命令 CLI 定义
//!
//! 完整流程：扫描、拟合、孤立原子参考、绘图
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/run.rs`

use super::common::{AtomArgs, FitOptionArgs, PlotArgs, SolverArgs, StructureArgs, SweepRangeArgs};

use clap::Args;
use std::path::PathBuf;

/// run 子命令参数
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub sweep: SweepRangeArgs,

    #[command(flatten)]
    pub structure: StructureArgs,

    #[command(flatten)]
    pub solver: SolverArgs,

    #[command(flatten)]
    pub fit: FitOptionArgs,

    /// Also run the isolated atom and report the cohesive energy
    #[arg(long, default_value_t = false)]
    pub with_atom: bool,

    #[command(flatten)]
    pub atom: AtomArgs,

    /// Directory for sweep.csv, fit.toml and plots
    #[arg(short, long, default_value = "eos_results")]
    pub output_dir: PathBuf,

    /// Plot format
    #[arg(long, default_value = "png", value_parser = ["png", "svg"])]
    pub plot_format: String,

    #[command(flatten)]
    pub plot_options: PlotArgs,
}
