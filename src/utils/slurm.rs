//! # Slurm 脚本生成工具
//!
//! 为单次求解器运行生成 sbatch 脚本。脚本通过 `sbatch --wait` 提交，
//! 调用方阻塞直到作业结束。
//!
//! ## 依赖关系
//! - 被 `solver/mod.rs` 使用
//! - 无外部模块依赖

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Slurm 作业配置（对应配置文件中的 `[slurm]`）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlurmConfig {
    pub partition: String,
    pub constraint: Option<String>,
    pub nodes: u32,
    /// 不设置时跟随 `solver.mpi_procs`
    pub ntasks: Option<u32>,
    pub cpus_per_task: u32,
    pub mem_per_cpu: String,
    pub time_limit: String,
    pub modules: Vec<String>,
}

impl Default for SlurmConfig {
    fn default() -> Self {
        SlurmConfig {
            partition: "cpu".to_string(),
            constraint: None,
            nodes: 1,
            ntasks: None,
            cpus_per_task: 1,
            mem_per_cpu: "3G".to_string(),
            time_limit: "04:00:00".to_string(),
            modules: vec![],
        }
    }
}

impl SlurmConfig {
    /// 未显式设置 `ntasks` 时按 MPI 进程数申请
    pub fn with_mpi_procs(&self, mpi_procs: u32) -> Self {
        SlurmConfig {
            ntasks: Some(self.ntasks.unwrap_or(mpi_procs.max(1))),
            ..self.clone()
        }
    }
}

/// 生成 sbatch 脚本内容
///
/// `exec_cmd` 的标准输出与标准错误分别写入运行目录下的 `stdout_file`、`stderr_file`。
pub fn generate_sbatch_script(
    config: &SlurmConfig,
    job_name: &str,
    workdir: &Path,
    exec_cmd: &str,
    stdout_file: &str,
    stderr_file: &str,
) -> String {
    let module_loads = config
        .modules
        .iter()
        .map(|m| format!("module load {}", m))
        .collect::<Vec<_>>()
        .join("\n");

    let constraint = config
        .constraint
        .as_ref()
        .map(|c| format!("#SBATCH --constraint \"{}\"\n", c))
        .unwrap_or_default();

    format!(
        r#"#!/bin/bash
{}#SBATCH --partition {}
#SBATCH --nodes={}
#SBATCH --mem-per-cpu {}
#SBATCH --time {}
#SBATCH -c {}
#SBATCH -n {}
#SBATCH -J {}
#SBATCH -o slurm-%j.out
#SBATCH -e slurm-%j.err

set -euo pipefail

module purge 2>&1
{}

cd "{}"
echo "Running: {}"
{} > {} 2> {}
"#,
        constraint,
        config.partition,
        config.nodes,
        config.mem_per_cpu,
        config.time_limit,
        config.cpus_per_task,
        config.ntasks.unwrap_or(1),
        job_name,
        module_loads,
        workdir.display(),
        exec_cmd,
        exec_cmd,
        stdout_file,
        stderr_file,
    )
}
