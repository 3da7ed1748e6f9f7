//! # geometry 子命令 CLI 定义
//!
//! 为单个晶格常数写出结构文件
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/geometry.rs`

use super::common::StructureArgs;
use crate::parsers::StructureFormat;

use clap::Args;
use std::path::PathBuf;

/// geometry 子命令参数
#[derive(Args, Debug)]
pub struct GeometryArgs {
    /// Lattice parameter in Å
    #[arg(short = 'a', long)]
    pub lattice: f64,

    #[command(flatten)]
    pub structure: StructureArgs,

    /// Output format
    #[arg(short, long, value_enum, default_value = "poscar")]
    pub format: StructureFormat,

    /// Output file (default: POSCAR, <seed>.cell or <seed>.xyz in the current directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Add KPOINTS_MP_GRID to .cell output, e.g. '6,6,6'
    #[arg(long)]
    pub kpoints: Option<String>,

    /// TOML config file providing [structure] defaults
    #[arg(long, env = "EOSWEEP_CONFIG")]
    pub config: Option<PathBuf>,
}
