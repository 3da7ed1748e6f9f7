//! # 解析器模块
//!
//! 结构文件（POSCAR、.cell、.xyz）的读写，以及 DFT 输出的能量提取。
//!
//! ## 依赖关系
//! - 被 `solver/` 和 `commands/` 使用
//! - 使用 `models/` 数据模型
//! - 子模块: poscar, cell, xyz, outcar, castep_out

pub mod castep_out;
pub mod cell;
pub mod outcar;
pub mod poscar;
pub mod xyz;

use crate::error::{EosError, Result};
use crate::models::Crystal;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 结构文件格式
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StructureFormat {
    /// VASP POSCAR (VASP 5, direct coordinates)
    #[default]
    Poscar,
    /// CASTEP .cell
    Cell,
    /// Extended XYZ (Cartesian, Å)
    Xyz,
}

impl StructureFormat {
    /// 该格式的默认文件名
    pub fn file_name(self, seed: &str) -> String {
        match self {
            StructureFormat::Poscar => "POSCAR".to_string(),
            StructureFormat::Cell => format!("{}.cell", seed),
            StructureFormat::Xyz => format!("{}.xyz", seed),
        }
    }

    /// 从文件名推断格式
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|s| s.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "cell" => Some(StructureFormat::Cell),
            "xyz" => Some(StructureFormat::Xyz),
            "vasp" | "poscar" => Some(StructureFormat::Poscar),
            _ if name.starts_with("POSCAR") || name.starts_with("CONTCAR") => {
                Some(StructureFormat::Poscar)
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for StructureFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StructureFormat::Poscar => write!(f, "poscar"),
            StructureFormat::Cell => write!(f, "cell"),
            StructureFormat::Xyz => write!(f, "xyz"),
        }
    }
}

/// 从文件路径推断格式并解析
pub fn parse_structure_file(path: &Path) -> Result<Crystal> {
    match StructureFormat::from_path(path) {
        Some(StructureFormat::Poscar) => poscar::parse_poscar_file(path),
        Some(StructureFormat::Cell) => cell::parse_cell_file(path),
        Some(StructureFormat::Xyz) => xyz::parse_xyz_file(path),
        None => Err(EosError::UnsupportedFormat(format!(
            "Cannot determine format for: {}",
            path.display()
        ))),
    }
}

/// 将结构序列化为指定格式
pub fn format_structure(
    crystal: &Crystal,
    format: StructureFormat,
    kpoints: Option<[u32; 3]>,
) -> String {
    match format {
        StructureFormat::Poscar => poscar::to_poscar_string(crystal),
        StructureFormat::Cell => cell::to_cell_string(crystal, kpoints),
        StructureFormat::Xyz => xyz::to_xyz_string(crystal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            StructureFormat::from_path(&PathBuf::from("runs/a/POSCAR")),
            Some(StructureFormat::Poscar)
        );
        assert_eq!(
            StructureFormat::from_path(&PathBuf::from("si.cell")),
            Some(StructureFormat::Cell)
        );
        assert_eq!(
            StructureFormat::from_path(&PathBuf::from("si.XYZ")),
            Some(StructureFormat::Xyz)
        );
        assert_eq!(StructureFormat::from_path(&PathBuf::from("si.cif")), None);
    }
}
