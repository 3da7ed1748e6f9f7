//! # 配置文件
//!
//! 可选的 TOML 配置文件，命令行参数覆盖其中的值。
//!
//! ```toml
//! [structure]
//! element = "Si"
//! prototype = "diamond"
//! cell = "primitive"
//! lattice = "5.23:5.63:0.05"
//!
//! [solver]
//! kind = "command"
//! command = "python3 ../../run_pyscf.py {input} --xc {functional} --basis {basis}"
//! input_format = "xyz"
//! energy_unit = "hartree"
//! work_dir = "eos_runs"
//! reuse = true
//!
//! [method]
//! functional = "PBE"
//! basis = "gth-szv"
//! kpoints = [4, 4, 4]
//!
//! [atom]
//! box_edge = 12.0
//! spin_polarized = true
//!
//! [slurm]
//! partition = "cpu"
//! modules = ["vasp/6.4"]
//! # ntasks 默认等于 solver.mpi_procs
//! ntasks = 16
//! ```
//!
//! ## 依赖关系
//! - 被 `commands/` 与 `solver/` 使用
//! - 使用 `toml` + `serde`

use crate::cli::common::{AtomArgs, SolverArgs, StructureArgs};
use crate::error::{EosError, Result};
use crate::models::{CellSetting, Prototype};
use crate::parsers::StructureFormat;
use crate::solver::{EnergyUnit, Launcher, MethodOptions};
use crate::utils::slurm::SlurmConfig;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 默认扫描：硅的实验晶格常数 5.431 Å 附近 ±0.2 Å
pub const DEFAULT_LATTICE_SWEEP: &str = "5.23:5.63:0.05";

/// 求解器类型
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SolverKind {
    /// Arbitrary shell command; energy read from its stdout by regex
    #[default]
    Command,
    /// VASP (OUTCAR)
    Vasp,
    /// CASTEP (.castep)
    Castep,
}

impl std::fmt::Display for SolverKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolverKind::Command => write!(f, "command"),
            SolverKind::Vasp => write!(f, "vasp"),
            SolverKind::Castep => write!(f, "castep"),
        }
    }
}

/// `[structure]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureConfig {
    pub element: String,
    pub prototype: Prototype,
    pub cell: CellSetting,
    pub lattice: String,
}

impl Default for StructureConfig {
    fn default() -> Self {
        StructureConfig {
            element: "Si".to_string(),
            prototype: Prototype::Diamond,
            cell: CellSetting::Primitive,
            lattice: DEFAULT_LATTICE_SWEEP.to_string(),
        }
    }
}

/// `[solver]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub kind: SolverKind,
    /// 命令模板（command 求解器）
    pub command: Option<String>,
    pub input_format: StructureFormat,
    pub energy_regex: Option<String>,
    pub energy_unit: EnergyUnit,
    /// VASP/CASTEP 可执行文件
    pub executable: Option<String>,
    pub mpi_procs: u32,
    pub incar_template: Option<PathBuf>,
    pub kpoints_template: Option<PathBuf>,
    pub potcar: Option<PathBuf>,
    pub param_template: Option<PathBuf>,
    pub work_dir: PathBuf,
    pub reuse: bool,
    pub launcher: Launcher,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            kind: SolverKind::Command,
            command: None,
            input_format: StructureFormat::Poscar,
            energy_regex: None,
            energy_unit: EnergyUnit::Ev,
            executable: None,
            mpi_procs: 1,
            incar_template: None,
            kpoints_template: None,
            potcar: None,
            param_template: None,
            work_dir: PathBuf::from("eos_runs"),
            reuse: false,
            launcher: Launcher::Direct,
        }
    }
}

/// `[atom]`：孤立原子参考计算
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtomConfig {
    /// 立方盒子边长 (Å)
    pub box_edge: f64,
    /// 盒子畸变比例
    pub distortion: f64,
    /// 覆盖 `[method].spin_polarized`
    pub spin_polarized: Option<bool>,
    /// 覆盖 `[method].kpoints`
    pub kpoints: [u32; 3],
}

impl Default for AtomConfig {
    fn default() -> Self {
        AtomConfig {
            box_edge: 12.0,
            distortion: 0.0,
            spin_polarized: Some(true),
            kpoints: [1, 1, 1],
        }
    }
}

impl AtomConfig {
    /// 孤立原子计算使用的方法选项
    pub fn method_for_atom(&self, bulk: &MethodOptions) -> MethodOptions {
        MethodOptions {
            kpoints: self.kpoints,
            spin_polarized: self.spin_polarized.unwrap_or(bulk.spin_polarized),
            ..bulk.clone()
        }
    }
}

/// 完整配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EosConfig {
    pub structure: StructureConfig,
    pub solver: SolverConfig,
    pub method: MethodOptions,
    pub atom: AtomConfig,
    pub slurm: SlurmConfig,
}

impl EosConfig {
    /// 读取配置文件；未指定路径时返回默认配置
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(EosConfig::default());
        };
        if !path.exists() {
            return Err(EosError::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let text = fs::read_to_string(path).map_err(|e| EosError::read(path, e))?;
        Self::from_toml(&text, &path.display().to_string())
    }

    pub fn from_toml(text: &str, origin: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| EosError::ConfigError {
            path: origin.to_string(),
            reason: e.to_string(),
        })
    }

    /// 读取配置并应用命令行覆盖
    pub fn resolve(solver: &SolverArgs, structure: &StructureArgs) -> Result<Self> {
        let mut config = Self::load(solver.config.as_deref())?;
        config.apply_structure_args(structure);
        config.apply_solver_args(solver)?;
        Ok(config)
    }

    pub fn apply_structure_args(&mut self, args: &StructureArgs) {
        let s = &mut self.structure;
        if let Some(ref element) = args.element {
            s.element = element.clone();
        }
        if let Some(prototype) = args.prototype {
            s.prototype = prototype;
        }
        if let Some(cell) = args.cell {
            s.cell = cell;
        }
    }

    pub fn apply_atom_args(&mut self, args: &AtomArgs) {
        let a = &mut self.atom;
        if let Some(edge) = args.box_edge {
            a.box_edge = edge;
        }
        if let Some(d) = args.box_distortion {
            a.distortion = d;
        }
        if args.no_atom_spin {
            a.spin_polarized = Some(false);
        }
    }

    pub fn apply_solver_args(&mut self, args: &SolverArgs) -> Result<()> {
        let s = &mut self.solver;
        if let Some(kind) = args.solver {
            s.kind = kind;
        }
        if let Some(ref command) = args.command {
            s.command = Some(command.clone());
        }
        if let Some(format) = args.input_format {
            s.input_format = format;
        }
        if let Some(ref re) = args.energy_regex {
            s.energy_regex = Some(re.clone());
        }
        if let Some(unit) = args.energy_unit {
            s.energy_unit = unit;
        }
        if let Some(ref exe) = args.executable {
            s.executable = Some(exe.clone());
        }
        if let Some(np) = args.np {
            s.mpi_procs = np;
        }
        if let Some(ref p) = args.incar_template {
            s.incar_template = Some(p.clone());
        }
        if let Some(ref p) = args.kpoints_template {
            s.kpoints_template = Some(p.clone());
        }
        if let Some(ref p) = args.potcar {
            s.potcar = Some(p.clone());
        }
        if let Some(ref p) = args.param_template {
            s.param_template = Some(p.clone());
        }
        if let Some(ref dir) = args.work_dir {
            s.work_dir = dir.clone();
        }
        if args.reuse {
            s.reuse = true;
        }
        if let Some(launcher) = args.launcher {
            s.launcher = launcher;
        }

        let m = &mut self.method;
        if let Some(ref f) = args.functional {
            m.functional = f.clone();
        }
        if let Some(ref b) = args.basis {
            m.basis = b.clone();
        }
        if let Some(ref k) = args.kpoints {
            m.kpoints = parse_kpoints(k)?;
        }
        if let Some(c) = args.cutoff {
            m.cutoff_ev = Some(c);
        }
        if let Some(s) = args.smearing {
            m.smearing_ev = Some(s);
        }
        if args.spin_polarized {
            m.spin_polarized = true;
        }
        Ok(())
    }
}

/// 解析 k 点网格 ("6,6,6" / "6x6x6" / "6")
pub fn parse_kpoints(expr: &str) -> Result<[u32; 3]> {
    let parts: Vec<u32> = expr
        .split(|c: char| c == ',' || c == 'x' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u32>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| EosError::InvalidArgument(format!("Invalid k-point grid '{}'", expr)))?;

    match parts.as_slice() {
        [k] if *k > 0 => Ok([*k; 3]),
        [a, b, c] if *a > 0 && *b > 0 && *c > 0 => Ok([*a, *b, *c]),
        _ => Err(EosError::InvalidArgument(format!(
            "Invalid k-point grid '{}': expected 1 or 3 positive integers",
            expr
        ))),
    }
}
