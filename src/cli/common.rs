//! # 共享参数组
//!
//! 多个子命令共用的结构参数、求解器参数与拟合参数，通过
//! `#[command(flatten)]` 嵌入。未给出的参数取配置文件或默认值。
//!
//! ## 依赖关系
//! - 被 `cli/` 各子命令使用
//! - 由 `config.rs` 合并进 `EosConfig`

use crate::config::SolverKind;
use crate::fitting::EosModel;
use crate::models::{CellSetting, Prototype};
use crate::parsers::StructureFormat;
use crate::solver::{EnergyUnit, Launcher};

use clap::Args;
use std::path::PathBuf;

/// 晶体结构参数
#[derive(Args, Debug, Clone, Default)]
pub struct StructureArgs {
    /// Chemical element (default: Si)
    #[arg(long)]
    pub element: Option<String>,

    /// Crystal prototype (default: diamond)
    #[arg(long, value_enum)]
    pub prototype: Option<Prototype>,

    /// Cell setting (default: primitive)
    #[arg(long, value_enum)]
    pub cell: Option<CellSetting>,
}

/// 外部求解器与计算方法参数
#[derive(Args, Debug, Clone, Default)]
pub struct SolverArgs {
    /// TOML config file; command-line flags override its values
    #[arg(long, env = "EOSWEEP_CONFIG")]
    pub config: Option<PathBuf>,

    // ─────────────────────────────────────────────────────────────
    // 求解器
    // ─────────────────────────────────────────────────────────────
    /// Solver backend
    #[arg(long, value_enum)]
    pub solver: Option<SolverKind>,

    /// Command template for the `command` solver (placeholders: {input} {dir} {label} {functional} {basis} {kpoints} {cutoff} {spin})
    #[arg(long)]
    pub command: Option<String>,

    /// Geometry format handed to the `command` solver
    #[arg(long, value_enum)]
    pub input_format: Option<StructureFormat>,

    /// Regex with one capture group extracting the total energy from solver stdout
    #[arg(long)]
    pub energy_regex: Option<String>,

    /// Unit of the energy printed by the `command` solver
    #[arg(long, value_enum)]
    pub energy_unit: Option<EnergyUnit>,

    /// VASP/CASTEP executable
    #[arg(long)]
    pub executable: Option<String>,

    /// Number of MPI processes
    #[arg(long)]
    pub np: Option<u32>,

    /// VASP INCAR template (generated from method options if absent)
    #[arg(long)]
    pub incar_template: Option<PathBuf>,

    /// VASP KPOINTS template (generated from --kpoints if absent)
    #[arg(long)]
    pub kpoints_template: Option<PathBuf>,

    /// VASP POTCAR file or directory containing POTCAR
    #[arg(long)]
    pub potcar: Option<PathBuf>,

    /// CASTEP .param template (generated from method options if absent)
    #[arg(long)]
    pub param_template: Option<PathBuf>,

    /// Root directory for per-point run directories
    #[arg(long)]
    pub work_dir: Option<PathBuf>,

    /// Reuse finished outputs found in run directories
    #[arg(long, default_value_t = false)]
    pub reuse: bool,

    /// How to launch the solver
    #[arg(long, value_enum)]
    pub launcher: Option<Launcher>,

    // ─────────────────────────────────────────────────────────────
    // 计算方法
    // ─────────────────────────────────────────────────────────────
    /// Exchange-correlation functional (default: PBE)
    #[arg(long)]
    pub functional: Option<String>,

    /// Basis set (for Gaussian-basis codes)
    #[arg(long)]
    pub basis: Option<String>,

    /// Monkhorst-Pack grid, e.g. '6,6,6' or '6x6x6'
    #[arg(long)]
    pub kpoints: Option<String>,

    /// Plane-wave cutoff energy in eV
    #[arg(long)]
    pub cutoff: Option<f64>,

    /// Smearing width in eV
    #[arg(long)]
    pub smearing: Option<f64>,

    /// Spin-polarized bulk calculation
    #[arg(long, default_value_t = false)]
    pub spin_polarized: bool,
}

/// 晶格常数扫描参数
#[derive(Args, Debug, Clone, Default)]
pub struct SweepRangeArgs {
    /// Lattice parameters in Å: 'start:stop:step', 'start:stop' with --points, or 'a1,a2,...'
    #[arg(long)]
    pub lattice: Option<String>,

    /// Number of evenly spaced points for 'start:stop'
    #[arg(long)]
    pub points: Option<usize>,

    /// Skip failed points instead of aborting the sweep
    #[arg(long, default_value_t = false)]
    pub keep_going: bool,
}

/// 拟合参数
#[derive(Args, Debug, Clone)]
pub struct FitOptionArgs {
    /// Equation-of-state model
    #[arg(long, value_enum, default_value = "birch-murnaghan")]
    pub model: EosModel,

    /// Initial guess 'E0,V0,B0,B0p' (eV/atom, Å³/atom, eV/Å³, -); derived from a parabola if absent
    #[arg(long)]
    pub guess: Option<String>,

    /// Maximum Levenberg-Marquardt iterations
    #[arg(long, default_value_t = 200)]
    pub max_iter: usize,
}

/// 孤立原子参数
#[derive(Args, Debug, Clone, Default)]
pub struct AtomArgs {
    /// Edge of the cubic box around the isolated atom (Å)
    #[arg(long)]
    pub box_edge: Option<f64>,

    /// Fractional elongation of the box to break cubic symmetry
    #[arg(long)]
    pub box_distortion: Option<f64>,

    /// Run the isolated atom without spin polarization
    #[arg(long, default_value_t = false)]
    pub no_atom_spin: bool,
}

/// 绘图参数
#[derive(Args, Debug, Clone)]
pub struct PlotArgs {
    /// Skip plot generation
    #[arg(long, default_value_t = false)]
    pub no_plot: bool,

    /// Figure width in pixels
    #[arg(long, default_value_t = 1000)]
    pub width: u32,

    /// Figure height in pixels
    #[arg(long, default_value_t = 700)]
    pub height: u32,
}
