//! # eosweep - 晶格常数扫描与状态方程拟合
//!
//! 在外部电子结构程序之上完成一次完整的状态方程研究：
//! 扫描晶格常数，逐点计算总能，拟合 E(V)，得到平衡晶格常数、
//! 体弹模量及其压强导数，并可计算结合能。
//!
//! ## 子命令
//! - `geometry` - 写出单个晶格常数的结构文件
//! - `sweep`    - 晶格常数扫描
//! - `fit`      - 状态方程拟合与绘图
//! - `cohesive` - 孤立原子与结合能
//! - `run`      - 以上全部
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   │     ├── solver/    (外部求解器)
//!   │     ├── fitting/   (状态方程与 LM 拟合)
//!   │     ├── parsers/   (结构与输出文件读写)
//!   │     ├── models/    (数据模型)
//!   │     └── plot.rs    (图表)
//!   ├── config.rs   (TOML 配置)
//!   ├── utils/      (工具函数)
//!   └── error.rs    (错误处理)
//! ```

mod cli;
mod commands;
mod config;
mod error;
mod fitting;
mod models;
mod parsers;
mod plot;
mod solver;
mod utils;

use clap::Parser;
use cli::Cli;

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();

    if let Err(e) = commands::run(cli.command) {
        utils::output::print_error(&format!("{}", e));
        std::process::exit(1);
    }
}
