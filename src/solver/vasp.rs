//! # VASP 求解器
//!
//! 每个运行目录写入 POSCAR / INCAR / KPOINTS / POTCAR，执行 VASP，
//! 从 OUTCAR 读取最后的 `energy(sigma->0)`。
//!
//! INCAR、KPOINTS 可以由模板提供；没有模板时根据 `MethodOptions` 生成
//! 单点计算输入。
//!
//! ## 依赖关系
//! - 被 `solver/mod.rs` 构造
//! - 使用 `parsers/poscar.rs`, `parsers/outcar.rs`

use super::{mpi_command, prepare_run_dir, write_file, write_options, EnergySolver, MethodOptions, Runner};
use crate::config::SolverConfig;
use crate::error::{EosError, Result};
use crate::models::Crystal;
use crate::parsers::{outcar, poscar};
use crate::utils::output;

use std::fs;
use std::path::{Path, PathBuf};

/// 可执行文件默认名，可用环境变量 `EOSWEEP_VASP` 覆盖
pub const DEFAULT_VASP_EXEC: &str = "vasp_std";

/// VASP 求解器
pub struct VaspSolver {
    executable: String,
    mpi_procs: u32,
    incar_template: Option<PathBuf>,
    kpoints_template: Option<PathBuf>,
    potcar: Option<PathBuf>,
    work_dir: PathBuf,
    reuse: bool,
    runner: Runner,
}

impl VaspSolver {
    pub fn from_config(config: &SolverConfig, runner: Runner) -> Self {
        VaspSolver {
            executable: config
                .executable
                .clone()
                .or_else(|| std::env::var("EOSWEEP_VASP").ok())
                .unwrap_or_else(|| DEFAULT_VASP_EXEC.to_string()),
            mpi_procs: config.mpi_procs,
            incar_template: config.incar_template.clone(),
            kpoints_template: config.kpoints_template.clone(),
            potcar: config.potcar.clone(),
            work_dir: config.work_dir.clone(),
            reuse: config.reuse,
            runner,
        }
    }

    /// 读取 OUTCAR 中已完成、且属于 `crystal` 的计算能量
    fn finished_energy(outcar_path: &Path, crystal: &Crystal) -> Result<f64> {
        outcar::parse_outcar(outcar_path)?.energy_for(crystal, outcar_path)
    }

    fn write_inputs(&self, dir: &Path, crystal: &Crystal, method: &MethodOptions) -> Result<()> {
        write_file(&dir.join("POSCAR"), &poscar::to_poscar_string(crystal))?;

        let incar = match self.incar_template {
            Some(ref t) => fs::read_to_string(t).map_err(|e| EosError::read(t, e))?,
            None => generate_incar(&crystal.name, method),
        };
        write_file(&dir.join("INCAR"), &incar)?;

        let kpoints = match self.kpoints_template {
            Some(ref t) => fs::read_to_string(t).map_err(|e| EosError::read(t, e))?,
            None => generate_kpoints(method.kpoints),
        };
        write_file(&dir.join("KPOINTS"), &kpoints)?;

        let potcar_dst = dir.join("POTCAR");
        if !potcar_dst.exists() {
            match self.potcar {
                Some(ref src) => {
                    let src = if src.is_dir() { src.join("POTCAR") } else { src.clone() };
                    fs::copy(&src, &potcar_dst).map_err(|e| EosError::read(&src, e))?;
                }
                None => output::print_warning(&format!(
                    "No POTCAR given for {}, VASP will fail unless one is present",
                    dir.display()
                )),
            }
        }

        write_options(dir, method)
    }
}

impl EnergySolver for VaspSolver {
    fn name(&self) -> &str {
        "vasp"
    }

    fn total_energy(&self, crystal: &Crystal, label: &str, method: &MethodOptions) -> Result<f64> {
        let dir = prepare_run_dir(&self.work_dir, label)?;
        let outcar_path = dir.join("OUTCAR");

        if self.reuse && outcar_path.exists() {
            if let Ok(energy) = Self::finished_energy(&outcar_path, crystal) {
                output::print_skip(&format!("{}: reusing {}", label, outcar_path.display()));
                return Ok(energy);
            }
        }

        self.write_inputs(&dir, crystal, method)?;
        let cmd = mpi_command(&self.executable, self.mpi_procs, "");
        self.runner.run(&cmd, &dir, label)?;

        Self::finished_energy(&outcar_path, crystal)
    }
}

/// 由方法选项生成单点 INCAR
pub fn generate_incar(system: &str, method: &MethodOptions) -> String {
    let mut lines = vec![
        format!("SYSTEM = {}", system),
        "PREC = Accurate".to_string(),
        "IBRION = -1".to_string(),
        "NSW = 0".to_string(),
        "EDIFF = 1E-6".to_string(),
        "ISMEAR = 0".to_string(),
        format!("SIGMA = {}", method.smearing_ev.unwrap_or(0.05)),
        format!("ISPIN = {}", if method.spin_polarized { 2 } else { 1 }),
        "LWAVE = .FALSE.".to_string(),
        "LCHARG = .FALSE.".to_string(),
    ];

    if let Some(cutoff) = method.cutoff_ev {
        lines.push(format!("ENCUT = {}", cutoff));
    }

    // LDA 由 POTCAR 决定，不写 GGA 标签
    match method.functional.to_lowercase().as_str() {
        "lda" | "" => {}
        "pbe" => lines.push("GGA = PE".to_string()),
        "pbesol" => lines.push("GGA = PS".to_string()),
        "rpbe" => lines.push("GGA = RP".to_string()),
        "pw91" => lines.push("GGA = 91".to_string()),
        other => lines.push(format!("GGA = {}", other.to_uppercase())),
    }

    for (key, value) in &method.extra {
        lines.push(format!("{} = {}", key, value));
    }

    lines.join("\n") + "\n"
}

/// Gamma 中心自动网格
pub fn generate_kpoints(grid: [u32; 3]) -> String {
    format!(
        "Automatic mesh\n0\nGamma\n{} {} {}\n0 0 0\n",
        grid[0], grid[1], grid[2]
    )
}
