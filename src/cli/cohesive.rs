//! # cohesive 子命令 CLI 定义
//!
//! 计算孤立原子能量，并结合体相能量给出结合能
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/cohesive.rs`

use super::common::{AtomArgs, SolverArgs, StructureArgs};

use clap::Args;
use std::path::PathBuf;

/// cohesive 子命令参数
#[derive(Args, Debug)]
pub struct CohesiveArgs {
    /// Bulk energy per atom in eV
    #[arg(long, conflicts_with = "from_sweep")]
    pub bulk_energy: Option<f64>,

    /// Take the bulk energy per atom from a sweep CSV (fitted E0, or the lowest sample)
    #[arg(long)]
    pub from_sweep: Option<PathBuf>,

    #[command(flatten)]
    pub atom: AtomArgs,

    #[command(flatten)]
    pub structure: StructureArgs,

    #[command(flatten)]
    pub solver: SolverArgs,
}
