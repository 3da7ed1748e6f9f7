//! # CASTEP .cell 格式读写
//!
//! ## .cell 格式说明
//! ```text
//! %BLOCK LATTICE_CART
//! ang
//! a1 a2 a3
//! b1 b2 b3
//! c1 c2 c3
//! %ENDBLOCK LATTICE_CART
//!
//! %BLOCK POSITIONS_FRAC
//! Element x y z
//! ...
//! %ENDBLOCK POSITIONS_FRAC
//!
//! KPOINTS_MP_GRID 6 6 6
//! ```
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs`、`solver/castep.rs` 使用
//! - 使用 `models/structure.rs`

use crate::error::{EosError, Result};
use crate::models::{Atom, Crystal, Lattice};
use std::fs;
use std::path::Path;

/// 解析 .cell 文件
pub fn parse_cell_file(path: &Path) -> Result<Crystal> {
    let content = fs::read_to_string(path).map_err(|e| EosError::read(path, e))?;

    parse_cell_content(
        &content,
        path.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown"),
    )
}

fn parse_error(name: &str, reason: impl Into<String>) -> EosError {
    EosError::ParseError {
        format: "cell".to_string(),
        path: name.to_string(),
        reason: reason.into(),
    }
}

/// 从字符串内容解析 .cell 格式
pub fn parse_cell_content(content: &str, default_name: &str) -> Result<Crystal> {
    let lattice = if let Some(rows) = block_rows(content, "LATTICE_CART") {
        let values: Vec<f64> = numbers(&rows);
        if values.len() < 9 {
            return Err(parse_error(default_name, "Incomplete LATTICE_CART block"));
        }
        Lattice::from_vectors([
            [values[0], values[1], values[2]],
            [values[3], values[4], values[5]],
            [values[6], values[7], values[8]],
        ])
    } else if let Some(rows) = block_rows(content, "LATTICE_ABC") {
        let p: Vec<f64> = numbers(&rows);
        if p.len() < 6 {
            return Err(parse_error(
                default_name,
                "Incomplete LATTICE_ABC block (need a b c alpha beta gamma)",
            ));
        }
        Lattice::from_parameters(p[0], p[1], p[2], p[3], p[4], p[5])
    } else {
        return Err(parse_error(
            default_name,
            "Missing LATTICE_CART or LATTICE_ABC block",
        ));
    };

    let (rows, absolute) = match block_rows(content, "POSITIONS_FRAC") {
        Some(rows) => (rows, false),
        None => (
            block_rows(content, "POSITIONS_ABS")
                .ok_or_else(|| parse_error(default_name, "Missing POSITIONS block"))?,
            true,
        ),
    };

    let mut atoms = Vec::new();
    for row in rows {
        let parts: Vec<&str> = row.split_whitespace().collect();
        if parts.len() < 4 {
            continue;
        }
        let coords: Vec<f64> = parts[1..4].iter().filter_map(|s| s.parse().ok()).collect();
        if coords.len() < 3 {
            return Err(parse_error(default_name, format!("Invalid position: {}", row)));
        }
        let raw = [coords[0], coords[1], coords[2]];
        let position = if absolute {
            lattice
                .cart_to_frac(raw)
                .ok_or_else(|| parse_error(default_name, "Singular lattice"))?
        } else {
            raw
        };
        atoms.push(Atom::new(parts[0], position));
    }

    Ok(Crystal::new(default_name, lattice, atoms))
}

/// 取出 %BLOCK NAME ... %ENDBLOCK NAME 之间的数据行（去掉注释与单位行）
fn block_rows<'a>(content: &'a str, block_name: &str) -> Option<Vec<&'a str>> {
    let mut lines = content.lines();
    lines.find(|l| {
        let upper = l.trim().to_uppercase();
        upper.starts_with("%BLOCK") && upper.split_whitespace().nth(1) == Some(block_name)
    })?;

    let rows = lines
        .map(str::trim)
        .take_while(|l| !l.to_uppercase().starts_with("%ENDBLOCK"))
        .filter(|l| !l.is_empty() && !l.starts_with('#') && !l.starts_with('!'))
        .filter(|l| {
            !["ang", "bohr", "nm"]
                .iter()
                .any(|unit| l.eq_ignore_ascii_case(unit))
        })
        .collect();
    Some(rows)
}

fn numbers(rows: &[&str]) -> Vec<f64> {
    rows.iter()
        .flat_map(|r| r.split_whitespace())
        .filter_map(|s| s.parse().ok())
        .collect()
}

/// 将 Crystal 转换为 .cell 格式字符串
pub fn to_cell_string(crystal: &Crystal, kpoints: Option<[u32; 3]>) -> String {
    let mut result = String::new();

    result.push_str("%BLOCK LATTICE_CART\nang\n");
    for row in &crystal.lattice.matrix {
        result.push_str(&format!(
            "{:16.10} {:16.10} {:16.10}\n",
            row[0], row[1], row[2]
        ));
    }
    result.push_str("%ENDBLOCK LATTICE_CART\n\n");

    result.push_str("%BLOCK POSITIONS_FRAC\n");
    for atom in &crystal.atoms {
        result.push_str(&format!(
            "{:4} {:16.10} {:16.10} {:16.10}\n",
            atom.element, atom.position[0], atom.position[1], atom.position[2]
        ));
    }
    result.push_str("%ENDBLOCK POSITIONS_FRAC\n");

    if let Some([k1, k2, k3]) = kpoints {
        result.push_str(&format!("\nKPOINTS_MP_GRID {} {} {}\n", k1, k2, k3));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CellSetting, Prototype};

    #[test]
    fn test_parse_cell_lattice_abc() {
        let content = r#"
%BLOCK LATTICE_ABC
ang
5.64 5.64 5.64
90.0 90.0 90.0
%ENDBLOCK LATTICE_ABC

%BLOCK POSITIONS_FRAC
Na 0.0 0.0 0.0
Cl 0.5 0.5 0.5
%ENDBLOCK POSITIONS_FRAC
"#;
        let crystal = parse_cell_content(content, "NaCl").unwrap();
        let (a, _, _, alpha, _, _) = crystal.lattice.parameters();

        assert_eq!(crystal.atoms.len(), 2);
        assert!((a - 5.64).abs() < 0.01);
        assert!((alpha - 90.0).abs() < 0.01);
    }

    #[test]
    fn test_cell_round_trip_with_kpoints() {
        let crystal = Prototype::Diamond
            .build("Si", 5.43, CellSetting::Primitive)
            .unwrap();

        let cell_str = to_cell_string(&crystal, Some([6, 6, 6]));
        assert!(cell_str.contains("KPOINTS_MP_GRID 6 6 6"));

        let parsed = parse_cell_content(&cell_str, "round_trip").unwrap();
        assert_eq!(parsed.atoms.len(), 2);
        assert!((parsed.atoms[1].position[0] - 0.25).abs() < 1e-6);
        assert!((parsed.lattice.volume() - crystal.lattice.volume()).abs() < 1e-6);
    }

    #[test]
    fn test_parse_cell_positions_abs_with_comments() {
        let content = r#"
# This is a comment
%BLOCK LATTICE_CART
ang
4.0 0.0 0.0
0.0 4.0 0.0
0.0 0.0 4.0
%ENDBLOCK LATTICE_CART

%BLOCK POSITIONS_ABS
! centre
Si 2.0 2.0 2.0
%ENDBLOCK POSITIONS_ABS
"#;
        let crystal = parse_cell_content(content, "Si").unwrap();
        assert_eq!(crystal.atoms.len(), 1);
        assert!((crystal.atoms[0].position[1] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_parse_cell_missing_lattice() {
        assert!(parse_cell_content("%BLOCK POSITIONS_FRAC\n%ENDBLOCK POSITIONS_FRAC\n", "x").is_err());
    }
}
