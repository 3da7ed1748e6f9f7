//! # 能量计算结果数据模型
//!
//! - `SolverOutput`: 从 VASP/CASTEP 输出中提取的信息，取能量前核对结构
//! - `EnergyPoint`: 扫描中单个晶格常数对应的总能
//! - 扫描表的 CSV 读写
//!
//! ## 依赖关系
//! - 被 `parsers/outcar.rs`, `parsers/castep_out.rs` 使用
//! - 被 `commands/` 使用

use super::structure::Crystal;
use crate::error::{EosError, Result};

use serde::{Deserialize, Serialize};
use std::path::Path;

/// DFT 计算代码类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DftCodeType {
    Vasp,
    Castep,
}

impl std::fmt::Display for DftCodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DftCodeType::Vasp => write!(f, "VASP"),
            DftCodeType::Castep => write!(f, "CASTEP"),
        }
    }
}

/// 输出体积与输入结构的相对容差（OUTCAR 只打印两位小数）
const VOLUME_TOLERANCE: f64 = 1e-3;

/// 单次 DFT 运行的输出摘要
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverOutput {
    /// 使用的 DFT 代码
    pub code: DftCodeType,

    /// 计算是否正常结束
    pub is_finished: bool,

    /// 总能 (eV)
    pub energy_ev: Option<f64>,

    /// 体积 (Å³)
    pub volume: Option<f64>,

    /// 原子数
    pub num_atoms: Option<usize>,
}

impl SolverOutput {
    pub fn new(code: DftCodeType) -> Self {
        SolverOutput {
            code,
            is_finished: false,
            energy_ev: None,
            volume: None,
            num_atoms: None,
        }
    }

    /// 已完成且与 `crystal` 对应的运行的总能
    ///
    /// 原子数或体积对不上时说明输出属于别的结构，
    /// 例如 `--reuse` 碰到旧目录。
    pub fn energy_for(&self, crystal: &Crystal, path: &Path) -> Result<f64> {
        let path_str = path.display().to_string();
        if !self.is_finished {
            return Err(EosError::SolverNotConverged { path: path_str });
        }

        if let Some(n) = self.num_atoms {
            if n != crystal.atoms.len() {
                return Err(EosError::OutputMismatch {
                    path: path_str,
                    reason: format!(
                        "{} run has {} atoms, structure has {}",
                        self.code,
                        n,
                        crystal.atoms.len()
                    ),
                });
            }
        }

        if let Some(v) = self.volume {
            let expected = crystal.lattice.volume().abs();
            if (v - expected).abs() > VOLUME_TOLERANCE * expected {
                return Err(EosError::OutputMismatch {
                    path: path_str,
                    reason: format!(
                        "{} cell volume {:.4} Å³, structure has {:.4} Å³",
                        self.code, v, expected
                    ),
                });
            }
        }

        self.energy_ev
            .ok_or(EosError::EnergyNotFound { path: path_str })
    }
}

/// 扫描中的一个采样点
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyPoint {
    /// 晶格常数 (Å)
    pub lattice_parameter: f64,

    /// 晶胞原子数
    pub n_atoms: usize,

    /// 晶胞体积 (Å³)
    pub cell_volume: f64,

    /// 总能 (eV)
    pub total_energy: f64,
}

impl EnergyPoint {
    pub fn volume_per_atom(&self) -> f64 {
        self.cell_volume / self.n_atoms as f64
    }

    pub fn energy_per_atom(&self) -> f64 {
        self.total_energy / self.n_atoms as f64
    }
}

/// CSV 中的一行（含派生列）
#[derive(Debug, Serialize, Deserialize)]
struct EnergyRecord {
    lattice_parameter: f64,
    n_atoms: usize,
    cell_volume: f64,
    volume_per_atom: f64,
    total_energy: f64,
    energy_per_atom: f64,
}

impl From<&EnergyPoint> for EnergyRecord {
    fn from(p: &EnergyPoint) -> Self {
        EnergyRecord {
            lattice_parameter: p.lattice_parameter,
            n_atoms: p.n_atoms,
            cell_volume: p.cell_volume,
            volume_per_atom: p.volume_per_atom(),
            total_energy: p.total_energy,
            energy_per_atom: p.energy_per_atom(),
        }
    }
}

/// 保存扫描表
pub fn write_sweep_csv(points: &[EnergyPoint], path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for p in points {
        wtr.serialize(EnergyRecord::from(p))?;
    }
    wtr.flush().map_err(|e| EosError::write(path, e))?;
    Ok(())
}

/// 读取扫描表，结果按晶格常数升序
///
/// 只使用原始列（lattice_parameter, n_atoms, cell_volume, total_energy），
/// 派生列在读取时重新计算。
pub fn read_sweep_csv(path: &Path) -> Result<Vec<EnergyPoint>> {
    if !path.exists() {
        return Err(EosError::FileNotFound {
            path: path.display().to_string(),
        });
    }

    let mut rdr = csv::Reader::from_path(path)?;
    let mut points = Vec::new();
    for record in rdr.deserialize() {
        let r: EnergyRecord = record?;
        if r.n_atoms == 0 {
            return Err(EosError::ParseError {
                format: "csv".to_string(),
                path: path.display().to_string(),
                reason: format!("row with a = {} has zero atoms", r.lattice_parameter),
            });
        }
        points.push(EnergyPoint {
            lattice_parameter: r.lattice_parameter,
            n_atoms: r.n_atoms,
            cell_volume: r.cell_volume,
            total_energy: r.total_energy,
        });
    }

    sort_points(&mut points);
    Ok(points)
}

/// 按晶格常数排序
pub fn sort_points(points: &mut [EnergyPoint]) {
    points.sort_by(|a, b| {
        a.lattice_parameter
            .partial_cmp(&b.lattice_parameter)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
