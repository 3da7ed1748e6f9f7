//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `geometry`: 生成单个晶格常数的结构文件
//! - `sweep`: 晶格常数扫描，调用外部求解器
//! - `fit`: 对扫描结果拟合状态方程
//! - `cohesive`: 孤立原子参考能量与结合能
//! - `run`: 扫描 + 拟合 + 结合能 + 绘图
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: common, geometry, sweep, fit, cohesive, run

pub mod cohesive;
pub mod common;
pub mod fit;
pub mod geometry;
pub mod run;
pub mod sweep;

use clap::{Parser, Subcommand};

/// eosweep - 晶格常数扫描与状态方程拟合
#[derive(Parser)]
#[command(name = "eosweep")]
#[command(author = "Changjiang Wu")]
#[command(version)]
#[command(
    about = "Lattice-parameter sweeps and equation-of-state fits on top of external DFT codes",
    long_about = None
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Write the crystal geometry for one lattice parameter
    Geometry(geometry::GeometryArgs),

    /// Run the external solver over a sweep of lattice parameters
    Sweep(sweep::SweepArgs),

    /// Fit an equation of state to a sweep table
    Fit(fit::FitArgs),

    /// Compute the isolated-atom energy and the cohesive energy
    Cohesive(cohesive::CohesiveArgs),

    /// Sweep, fit, cohesive energy and plots in one go
    Run(run::RunArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_with_overrides() {
        let cli = Cli::try_parse_from([
            "eosweep",
            "run",
            "--solver",
            "vasp",
            "--np",
            "8",
            "--lattice",
            "5.3,5.4,5.5,5.6",
            "--with-atom",
            "--kpoints",
            "8x8x8",
        ])
        .unwrap();

        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.solver.np, Some(8));
                assert_eq!(args.sweep.lattice.as_deref(), Some("5.3,5.4,5.5,5.6"));
                assert!(args.with_atom);
                assert_eq!(args.solver.kpoints.as_deref(), Some("8x8x8"));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_fit_requires_input() {
        assert!(Cli::try_parse_from(["eosweep", "fit"]).is_err());
    }
}
