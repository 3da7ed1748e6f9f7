//! # 外部电子结构求解器
//!
//! 把一个结构交给外部程序，读回一个总能 (eV)。求解器本身是黑盒，
//! 这里只负责准备运行目录、启动进程和提取能量。
//!
//! ## 实现
//! - `CommandSolver`: 任意命令模板 + 正则提取能量
//! - `VaspSolver`: 生成 VASP 输入并解析 OUTCAR
//! - `CastepSolver`: 生成 CASTEP 输入并解析 .castep
//!
//! ## 依赖关系
//! - 被 `commands/` 使用
//! - 使用 `parsers/` 写结构、读输出
//! - 使用 `utils/slurm.rs` 生成作业脚本

pub mod castep;
pub mod command;
pub mod vasp;

pub use castep::CastepSolver;
pub use command::CommandSolver;
pub use vasp::VaspSolver;

use crate::config::{SolverConfig, SolverKind};
use crate::error::{EosError, Result};
use crate::models::Crystal;
use crate::utils::slurm::{generate_sbatch_script, SlurmConfig};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// 求解器标准输出文件名
pub const STDOUT_FILE: &str = "solver.out";
/// 求解器标准错误文件名
pub const STDERR_FILE: &str = "solver.err";
/// 运行目录中记录计算方法的文件名
pub const OPTIONS_FILE: &str = "options.toml";

/// 电子结构求解器接口
pub trait EnergySolver {
    /// 求解器名称（用于输出）
    fn name(&self) -> &str;

    /// 计算结构的总能 (eV)
    ///
    /// `label` 决定运行目录名，同一个 label 的重复调用会落在同一目录。
    fn total_energy(&self, crystal: &Crystal, label: &str, method: &MethodOptions) -> Result<f64>;
}

/// 计算方法选项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MethodOptions {
    /// 交换关联泛函
    pub functional: String,

    /// 基组（平面波代码可留空）
    pub basis: String,

    /// Monkhorst-Pack k 点网格
    pub kpoints: [u32; 3],

    /// 平面波截断能 (eV)
    pub cutoff_ev: Option<f64>,

    /// 展宽 (eV)
    pub smearing_ev: Option<f64>,

    /// 是否自旋极化
    pub spin_polarized: bool,

    /// 其他代码专用参数，原样传给求解器
    pub extra: BTreeMap<String, String>,
}

impl Default for MethodOptions {
    fn default() -> Self {
        MethodOptions {
            functional: "PBE".to_string(),
            basis: String::new(),
            kpoints: [6, 6, 6],
            cutoff_ev: None,
            smearing_ev: None,
            spin_polarized: false,
            extra: BTreeMap::new(),
        }
    }
}

impl MethodOptions {
    /// 命令模板占位符
    pub fn placeholders(&self) -> Vec<(&'static str, String)> {
        let [k1, k2, k3] = self.kpoints;
        vec![
            ("{functional}", self.functional.clone()),
            ("{basis}", self.basis.clone()),
            ("{kpoints}", format!("{} {} {}", k1, k2, k3)),
            ("{k1}", k1.to_string()),
            ("{k2}", k2.to_string()),
            ("{k3}", k3.to_string()),
            (
                "{cutoff}",
                self.cutoff_ev.map(|c| c.to_string()).unwrap_or_default(),
            ),
            (
                "{smearing}",
                self.smearing_ev.map(|s| s.to_string()).unwrap_or_default(),
            ),
            (
                "{spin}",
                if self.spin_polarized { "1" } else { "0" }.to_string(),
            ),
        ]
    }
}

/// 能量单位
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnergyUnit {
    /// Electronvolt
    #[default]
    Ev,
    /// Hartree
    Hartree,
    /// Rydberg
    Rydberg,
    /// kJ/mol
    KjMol,
}

impl EnergyUnit {
    /// 换算到 eV 的系数
    pub fn to_ev(self) -> f64 {
        match self {
            EnergyUnit::Ev => 1.0,
            EnergyUnit::Hartree => 27.211386245988,
            EnergyUnit::Rydberg => 13.605693122994,
            EnergyUnit::KjMol => 0.010364269656262175,
        }
    }
}

/// 进程启动方式
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Launcher {
    /// Run the command directly in the run directory
    #[default]
    Direct,
    /// Submit through `sbatch --wait`
    Slurm,
}

/// 在运行目录中执行命令
#[derive(Debug, Clone)]
pub struct Runner {
    pub launcher: Launcher,
    pub slurm: SlurmConfig,
}

impl Runner {
    pub fn new(launcher: Launcher, slurm: SlurmConfig) -> Self {
        Runner { launcher, slurm }
    }

    /// 执行 shell 命令，stdout/stderr 写入运行目录
    pub fn run(&self, command: &str, run_dir: &Path, job_name: &str) -> Result<()> {
        match self.launcher {
            Launcher::Direct => run_direct(command, run_dir),
            Launcher::Slurm => self.run_slurm(command, run_dir, job_name),
        }
    }

    fn run_slurm(&self, command: &str, run_dir: &Path, job_name: &str) -> Result<()> {
        let absolute = fs::canonicalize(run_dir).map_err(|e| EosError::read(run_dir, e))?;
        let script = generate_sbatch_script(
            &self.slurm,
            job_name,
            &absolute,
            command,
            STDOUT_FILE,
            STDERR_FILE,
        );
        let script_path = run_dir.join("submit.sbatch");
        fs::write(&script_path, script).map_err(|e| EosError::write(&script_path, e))?;

        let out = Command::new("sbatch")
            .arg("--wait")
            .arg("submit.sbatch")
            .current_dir(run_dir)
            .output()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => EosError::CommandNotFound {
                    command: "sbatch".to_string(),
                },
                _ => EosError::Other(format!("Failed to run sbatch: {}", e)),
            })?;

        if !out.status.success() {
            return Err(EosError::CommandFailed {
                command: format!("sbatch --wait ({})", command),
                stderr: tail(&read_or_fallback(&run_dir.join(STDERR_FILE), &out.stderr), 20),
            });
        }
        Ok(())
    }
}

fn run_direct(command: &str, run_dir: &Path) -> Result<()> {
    let out = Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(run_dir)
        .output()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => EosError::CommandNotFound {
                command: "sh".to_string(),
            },
            _ => EosError::Other(format!("Failed to start '{}': {}", command, e)),
        })?;

    let stdout_path = run_dir.join(STDOUT_FILE);
    fs::write(&stdout_path, &out.stdout).map_err(|e| EosError::write(&stdout_path, e))?;
    let stderr_path = run_dir.join(STDERR_FILE);
    fs::write(&stderr_path, &out.stderr).map_err(|e| EosError::write(&stderr_path, e))?;

    match out.status.code() {
        Some(0) => Ok(()),
        // sh: command not found
        Some(127) => Err(EosError::CommandNotFound {
            command: command
                .split_whitespace()
                .next()
                .unwrap_or(command)
                .to_string(),
        }),
        _ => Err(EosError::CommandFailed {
            command: command.to_string(),
            stderr: tail(&String::from_utf8_lossy(&out.stderr), 20),
        }),
    }
}

fn read_or_fallback(path: &Path, fallback: &[u8]) -> String {
    fs::read_to_string(path).unwrap_or_else(|_| String::from_utf8_lossy(fallback).into_owned())
}

/// 保留最后 n 行
fn tail(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}

/// 创建运行目录 `work_dir/<label>`
pub fn prepare_run_dir(work_dir: &Path, label: &str) -> Result<PathBuf> {
    let dir = work_dir.join(label);
    fs::create_dir_all(&dir).map_err(|e| EosError::write(&dir, e))?;
    Ok(dir)
}

/// 记录本次运行使用的方法选项
pub fn write_options(run_dir: &Path, method: &MethodOptions) -> Result<()> {
    let path = run_dir.join(OPTIONS_FILE);
    let text = toml::to_string(method)?;
    fs::write(&path, text).map_err(|e| EosError::write(&path, e))
}

/// 写文本文件
pub(crate) fn write_file(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).map_err(|e| EosError::write(path, e))
}

/// 根据配置构造求解器
pub fn from_config(config: &SolverConfig, slurm: &SlurmConfig) -> Result<Box<dyn EnergySolver>> {
    let runner = Runner::new(config.launcher, slurm.with_mpi_procs(config.mpi_procs));
    let solver: Box<dyn EnergySolver> = match config.kind {
        SolverKind::Command => Box::new(CommandSolver::from_config(config, runner)?),
        SolverKind::Vasp => Box::new(VaspSolver::from_config(config, runner)),
        SolverKind::Castep => Box::new(CastepSolver::from_config(config, runner)),
    };
    Ok(solver)
}

/// 带 MPI 前缀的可执行命令
pub(crate) fn mpi_command(executable: &str, mpi_procs: u32, args: &str) -> String {
    let base = if mpi_procs > 1 {
        format!("mpirun -np {} {}", mpi_procs, executable)
    } else {
        executable.to_string()
    };
    if args.is_empty() {
        base
    } else {
        format!("{} {}", base, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_energy_unit_conversion() {
        assert_eq!(EnergyUnit::Ev.to_ev(), 1.0);
        assert!((EnergyUnit::Hartree.to_ev() / EnergyUnit::Rydberg.to_ev() - 2.0).abs() < 1e-9);
        // 1 eV = 96.485 kJ/mol
        assert!((1.0 / EnergyUnit::KjMol.to_ev() - 96.485).abs() < 1e-2);
    }

    #[test]
    fn test_tail_keeps_last_lines() {
        assert_eq!(tail("a\nb\nc\nd", 2), "c\nd");
        assert_eq!(tail("a", 5), "a");
    }

    #[test]
    fn test_mpi_command() {
        assert_eq!(mpi_command("vasp_std", 1, ""), "vasp_std");
        assert_eq!(
            mpi_command("castep.mpi", 16, "eos"),
            "mpirun -np 16 castep.mpi eos"
        );
    }

    #[test]
    fn test_write_options_toml() {
        let dir = tempfile::tempdir().unwrap();
        let method = MethodOptions {
            cutoff_ev: Some(400.0),
            ..MethodOptions::default()
        };
        write_options(dir.path(), &method).unwrap();

        let text = std::fs::read_to_string(dir.path().join(OPTIONS_FILE)).unwrap();
        let back: MethodOptions = toml::from_str(&text).unwrap();
        assert_eq!(back, method);
    }

    #[cfg(unix)]
    #[test]
    fn test_run_direct_failure_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Runner::new(Launcher::Direct, SlurmConfig::default());

        runner.run("echo hello", dir.path(), "t").unwrap();
        let out = std::fs::read_to_string(dir.path().join(STDOUT_FILE)).unwrap();
        assert_eq!(out.trim(), "hello");

        let err = runner
            .run("echo oops >&2; exit 3", dir.path(), "t")
            .unwrap_err();
        match err {
            EosError::CommandFailed { stderr, .. } => assert_eq!(stderr, "oops"),
            other => panic!("unexpected error: {:?}", other),
        }

        let err = runner
            .run("definitely-not-a-solver-xyz --in POSCAR", dir.path(), "t")
            .unwrap_err();
        assert!(matches!(err, EosError::CommandNotFound { command } if command == "definitely-not-a-solver-xyz"));
    }
}
