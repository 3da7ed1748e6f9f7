//! # Extended XYZ 格式读写
//!
//! 第二行以 `Lattice="..."` 记录晶格向量，坐标为笛卡尔 Å。
//! 分子类量化程序（PySCF、ORCA 等）的包装脚本通常读取这种格式。

use crate::error::{EosError, Result};
use crate::models::{Atom, Crystal, Lattice};

use regex::Regex;
use std::fs;
use std::path::Path;

/// 解析 .xyz 文件
pub fn parse_xyz_file(path: &Path) -> Result<Crystal> {
    let content = fs::read_to_string(path).map_err(|e| EosError::read(path, e))?;
    parse_xyz_content(
        &content,
        path.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown"),
    )
}

fn parse_error(name: &str, reason: impl Into<String>) -> EosError {
    EosError::ParseError {
        format: "xyz".to_string(),
        path: name.to_string(),
        reason: reason.into(),
    }
}

/// 从字符串内容解析 extended XYZ
pub fn parse_xyz_content(content: &str, default_name: &str) -> Result<Crystal> {
    let mut lines = content.lines();

    let count: usize = lines
        .next()
        .and_then(|l| l.trim().parse().ok())
        .ok_or_else(|| parse_error(default_name, "Missing atom count"))?;
    let comment = lines.next().unwrap_or_default();

    let lattice_re = Regex::new(r#"Lattice="([^"]+)""#)
        .map_err(|e| EosError::Other(e.to_string()))?;
    let values: Vec<f64> = lattice_re
        .captures(comment)
        .and_then(|c| c.get(1))
        .ok_or_else(|| parse_error(default_name, "Missing Lattice=\"...\" in comment line"))?
        .as_str()
        .split_whitespace()
        .filter_map(|s| s.parse().ok())
        .collect();
    if values.len() != 9 {
        return Err(parse_error(default_name, "Lattice needs 9 numbers"));
    }
    let lattice = Lattice::from_vectors([
        [values[0], values[1], values[2]],
        [values[3], values[4], values[5]],
        [values[6], values[7], values[8]],
    ]);

    let mut atoms = Vec::with_capacity(count);
    for line in lines.take(count) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let coords: Vec<f64> = parts
            .iter()
            .skip(1)
            .take(3)
            .filter_map(|s| s.parse().ok())
            .collect();
        if coords.len() < 3 {
            return Err(parse_error(default_name, format!("Invalid atom line: {}", line)));
        }
        let frac = lattice
            .cart_to_frac([coords[0], coords[1], coords[2]])
            .ok_or_else(|| parse_error(default_name, "Singular lattice"))?;
        atoms.push(Atom::new(parts[0], frac));
    }

    if atoms.len() != count {
        return Err(parse_error(default_name, "Fewer atoms than declared"));
    }

    Ok(Crystal::new(default_name, lattice, atoms))
}

/// 将 Crystal 转换为 extended XYZ 字符串
pub fn to_xyz_string(crystal: &Crystal) -> String {
    let lattice: Vec<String> = crystal
        .lattice
        .matrix
        .iter()
        .flatten()
        .map(|x| format!("{:.10}", x))
        .collect();

    let mut result = format!(
        "{}\nLattice=\"{}\" Properties=species:S:1:pos:R:3 pbc=\"T T T\" name={}\n",
        crystal.atoms.len(),
        lattice.join(" "),
        crystal.name
    );

    for atom in &crystal.atoms {
        let [x, y, z] = crystal.lattice.frac_to_cart(atom.position);
        result.push_str(&format!(
            "{:4} {:16.10} {:16.10} {:16.10}\n",
            atom.element, x, y, z
        ));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CellSetting, Prototype};

    #[test]
    fn test_xyz_cartesian_positions() {
        let crystal = Prototype::Diamond
            .build("Si", 5.4, CellSetting::Primitive)
            .unwrap();
        let text = to_xyz_string(&crystal);

        let line = text.lines().nth(3).unwrap();
        let coords: Vec<f64> = line
            .split_whitespace()
            .skip(1)
            .map(|s| s.parse().unwrap())
            .collect();
        assert_eq!(coords.len(), 3);
        assert!((coords[0] - 1.35).abs() < 1e-8);

        let parsed = parse_xyz_content(&text, "si").unwrap();
        assert!((parsed.atoms[1].position[2] - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_xyz_requires_lattice() {
        assert!(parse_xyz_content("1\nplain comment\nSi 0 0 0\n", "si").is_err());
    }
}
