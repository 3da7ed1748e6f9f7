//! # sweep 子命令 CLI 定义
//!
//! 对一组晶格常数调用外部求解器，输出扫描表 CSV
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/sweep.rs`

use super::common::{SolverArgs, StructureArgs, SweepRangeArgs};

use clap::Args;
use std::path::PathBuf;

/// sweep 子命令参数
#[derive(Args, Debug)]
pub struct SweepArgs {
    #[command(flatten)]
    pub sweep: SweepRangeArgs,

    #[command(flatten)]
    pub structure: StructureArgs,

    #[command(flatten)]
    pub solver: SolverArgs,

    /// Output CSV file
    #[arg(short, long, default_value = "sweep.csv")]
    pub output: PathBuf,
}
