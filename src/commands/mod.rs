//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `config.rs`, `solver/`, `fitting/`, `models/`, `utils/`
//! - 子模块: geometry, sweep, fit, cohesive, run

pub mod cohesive;
pub mod fit;
pub mod geometry;
pub mod run;
pub mod sweep;

use crate::cli::Commands;
use crate::error::Result;

/// 执行命令
pub fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Geometry(args) => geometry::execute(args),
        Commands::Sweep(args) => sweep::execute(args),
        Commands::Fit(args) => fit::execute(args),
        Commands::Cohesive(args) => cohesive::execute(args),
        Commands::Run(args) => run::execute(args),
    }
}
