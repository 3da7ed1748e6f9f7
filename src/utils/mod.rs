//! # 工具函数
//!
//! 终端状态行、进度条与 Slurm 作业脚本。
//!
//! ## 依赖关系
//! - 被 `commands/`, `solver/` 使用
//! - 子模块: output, progress, slurm

pub mod output;
pub mod progress;
pub mod slurm;
