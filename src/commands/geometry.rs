//! # geometry 命令实现
//!
//! 写出单个晶格常数下的结构文件，写完后重新读回校验体积。
//!
//! ## 依赖关系
//! - 使用 `cli/geometry.rs` 定义的参数
//! - 使用 `models/structure.rs`, `parsers/`

use crate::cli::geometry::GeometryArgs;
use crate::config::{parse_kpoints, EosConfig, StructureConfig};
use crate::error::{EosError, Result};
use crate::models::Crystal;
use crate::parsers::{self, StructureFormat};
use crate::utils::output;

use std::fs;
use std::path::{Path, PathBuf};

/// 执行 geometry 命令
pub fn execute(args: GeometryArgs) -> Result<()> {
    let mut config = EosConfig::load(args.config.as_deref())?;
    config.apply_structure_args(&args.structure);

    let kpoints = args.kpoints.as_deref().map(parse_kpoints).transpose()?;
    let crystal = build_geometry(&config.structure, args.lattice)?;

    let output_path = args
        .output
        .unwrap_or_else(|| PathBuf::from(args.format.file_name(&config.structure.element)));
    write_geometry(&crystal, args.format, kpoints, &output_path)?;

    output::print_success(&format!(
        "{} ({}, V/atom = {:.4} Å³) written to '{}'",
        crystal.name,
        crystal.formula(),
        crystal.volume_per_atom(),
        output_path.display()
    ));
    Ok(())
}

pub fn build_geometry(structure: &StructureConfig, a: f64) -> Result<Crystal> {
    structure.prototype.build(&structure.element, a, structure.cell)
}

/// 写结构文件并读回比对体积
pub fn write_geometry(
    crystal: &Crystal,
    format: StructureFormat,
    kpoints: Option<[u32; 3]>,
    path: &Path,
) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| EosError::write(parent, e))?;
    }
    let text = parsers::format_structure(crystal, format, kpoints);
    fs::write(path, text).map_err(|e| EosError::write(path, e))?;

    // 自定义文件名可能无法推断格式，此时不校验
    if StructureFormat::from_path(path) == Some(format) {
        let back = parsers::parse_structure_file(path)?;
        let expected = crystal.lattice.volume();
        if back.atoms.len() != crystal.atoms.len()
            || (back.lattice.volume() - expected).abs() > 1e-6 * expected
        {
            return Err(EosError::Other(format!(
                "'{}' does not read back as the written structure",
                path.display()
            )));
        }
    }
    Ok(())
}
