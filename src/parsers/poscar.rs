//! # VASP POSCAR 格式读写
//!
//! ## POSCAR 格式说明
//! ```text
//! Comment line (structure name)
//! 1.0                    # scaling factor (负值表示目标体积)
//! a1 a2 a3               # lattice vector a
//! b1 b2 b3               # lattice vector b
//! c1 c2 c3               # lattice vector c
//! Element1 Element2 ...  # element symbols (VASP 5+)
//! n1 n2 ...              # number of atoms per element
//! Selective dynamics     # optional
//! Direct/Cartesian       # coordinate type
//! x1 y1 z1               # atom positions
//! ...
//! ```
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs`、`solver/vasp.rs` 使用
//! - 使用 `models/structure.rs`

use crate::error::{EosError, Result};
use crate::models::{Atom, Crystal, Lattice};
use std::fs;
use std::path::Path;

/// 解析 POSCAR/CONTCAR 文件
pub fn parse_poscar_file(path: &Path) -> Result<Crystal> {
    let content = fs::read_to_string(path).map_err(|e| EosError::read(path, e))?;

    parse_poscar_content(
        &content,
        path.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown"),
    )
}

fn parse_error(name: &str, reason: impl Into<String>) -> EosError {
    EosError::ParseError {
        format: "poscar".to_string(),
        path: name.to_string(),
        reason: reason.into(),
    }
}

/// 从字符串内容解析 POSCAR 格式
pub fn parse_poscar_content(content: &str, default_name: &str) -> Result<Crystal> {
    let lines: Vec<&str> = content.lines().collect();

    if lines.len() < 8 {
        return Err(parse_error(default_name, "File too short"));
    }

    let name = match lines[0].trim() {
        "" => default_name.to_string(),
        n => n.to_string(),
    };

    let scale: f64 = lines[1]
        .split_whitespace()
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| parse_error(&name, "Invalid scaling factor"))?;

    let mut matrix = [[0.0; 3]; 3];
    for (i, row) in matrix.iter_mut().enumerate() {
        let parts: Vec<f64> = lines[2 + i]
            .split_whitespace()
            .filter_map(|s| s.parse().ok())
            .collect();
        if parts.len() < 3 {
            return Err(parse_error(
                &name,
                format!("Invalid lattice vector at line {}", 3 + i),
            ));
        }
        *row = [parts[0], parts[1], parts[2]];
    }

    // 负的缩放因子表示晶胞体积
    let raw = Lattice::from_vectors(matrix);
    let factor = if scale < 0.0 {
        (scale.abs() / raw.volume().abs()).cbrt()
    } else {
        scale
    };
    let lattice = Lattice::from_vectors(matrix.map(|row| row.map(|x| x * factor)));

    let line5_parts: Vec<&str> = lines[5].split_whitespace().collect();
    let first = line5_parts
        .first()
        .ok_or_else(|| parse_error(&name, "Missing species line"))?;
    let (elements, counts, mut coord_line) = if first.parse::<usize>().is_ok() {
        // VASP 4: 没有元素行
        let counts: Vec<usize> = line5_parts.iter().filter_map(|s| s.parse().ok()).collect();
        let elements: Vec<String> = (0..counts.len()).map(|i| format!("X{}", i + 1)).collect();
        (elements, counts, 6)
    } else {
        let elements: Vec<String> = line5_parts.iter().map(|s| s.to_string()).collect();
        let counts: Vec<usize> = lines[6]
            .split_whitespace()
            .filter_map(|s| s.parse().ok())
            .collect();
        (elements, counts, 7)
    };

    if elements.len() != counts.len() {
        return Err(parse_error(&name, "Species and count lines disagree"));
    }

    if lines.len() > coord_line
        && lines[coord_line]
            .trim()
            .to_lowercase()
            .starts_with('s')
    {
        coord_line += 1;
    }

    let coord_type = lines
        .get(coord_line)
        .ok_or_else(|| parse_error(&name, "Missing coordinate type line"))?
        .trim()
        .to_lowercase();
    let is_cartesian = coord_type.starts_with('c') || coord_type.starts_with('k');

    let mut atoms: Vec<Atom> = Vec::new();
    let mut position_lines = lines.iter().skip(coord_line + 1);

    for (elem, &count) in elements.iter().zip(counts.iter()) {
        for _ in 0..count {
            let line = position_lines
                .next()
                .ok_or_else(|| parse_error(&name, "Fewer positions than atom counts"))?;
            let parts: Vec<f64> = line
                .split_whitespace()
                .take(3)
                .filter_map(|s| s.parse().ok())
                .collect();
            if parts.len() < 3 {
                return Err(parse_error(&name, format!("Invalid position line: {}", line)));
            }

            let raw = [parts[0], parts[1], parts[2]];
            let position = if is_cartesian {
                lattice
                    .cart_to_frac(raw.map(|x| x * factor))
                    .ok_or_else(|| parse_error(&name, "Singular lattice"))?
            } else {
                raw
            };
            atoms.push(Atom::new(elem.clone(), position));
        }
    }

    Ok(Crystal::new(name, lattice, atoms))
}

/// 将 Crystal 转换为 POSCAR 格式字符串 (VASP 5, Direct)
pub fn to_poscar_string(crystal: &Crystal) -> String {
    let species = crystal.species();

    let mut result = format!("{}\n1.0\n", crystal.name);

    for row in &crystal.lattice.matrix {
        result.push_str(&format!(
            "  {:16.10}  {:16.10}  {:16.10}\n",
            row[0], row[1], row[2]
        ));
    }

    let counts: Vec<String> = species
        .iter()
        .map(|e| {
            crystal
                .atoms
                .iter()
                .filter(|a| &a.element == e)
                .count()
                .to_string()
        })
        .collect();
    result.push_str(&format!("   {}\n", species.join("   ")));
    result.push_str(&format!("   {}\n", counts.join("   ")));
    result.push_str("Direct\n");

    // 按元素分组输出，与计数行顺序一致
    for elem in &species {
        for atom in crystal.atoms.iter().filter(|a| &a.element == elem) {
            let p = atom.position;
            result.push_str(&format!(
                "  {:16.10}  {:16.10}  {:16.10}\n",
                p[0], p[1], p[2]
            ));
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CellSetting, Prototype};

    #[test]
    fn test_parse_poscar_vasp5() {
        let content = r#"NaCl
1.0
5.64 0.0 0.0
0.0 5.64 0.0
0.0 0.0 5.64
Na Cl
4 4
Direct
0.0 0.0 0.0
0.5 0.5 0.0
0.5 0.0 0.5
0.0 0.5 0.5
0.5 0.0 0.0
0.0 0.5 0.0
0.0 0.0 0.5
0.5 0.5 0.5
"#;
        let crystal = parse_poscar_content(content, "NaCl").unwrap();
        assert_eq!(crystal.name, "NaCl");
        assert_eq!(crystal.atoms.len(), 8);
        assert_eq!(crystal.atoms.iter().filter(|a| a.element == "Cl").count(), 4);
    }

    #[test]
    fn test_parse_poscar_negative_scale_is_volume() {
        let content = r#"Si
-64.0
1.0 0.0 0.0
0.0 1.0 0.0
0.0 0.0 1.0
Si
1
Cartesian
0.5 0.5 0.5
"#;
        let crystal = parse_poscar_content(content, "Si").unwrap();
        assert!((crystal.lattice.volume() - 64.0).abs() < 1e-9);
        // 笛卡尔坐标同样被缩放
        assert!((crystal.atoms[0].position[0] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_diamond_poscar_round_trip() {
        let crystal = Prototype::Diamond
            .build("Si", 5.43, CellSetting::Primitive)
            .unwrap();
        let text = to_poscar_string(&crystal);
        let parsed = parse_poscar_content(&text, "round_trip").unwrap();

        assert_eq!(parsed.atoms.len(), 2);
        assert!((parsed.volume_per_atom() - crystal.volume_per_atom()).abs() < 1e-6);
        assert!((parsed.atoms[1].position[2] - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_parse_poscar_selective_dynamics() {
        let content = r#"Fe with selective
1.0
2.87 0.0 0.0
0.0 2.87 0.0
0.0 0.0 2.87
Fe
2
Selective dynamics
Direct
0.0 0.0 0.0 T T T
0.5 0.5 0.5 F F F
"#;
        let crystal = parse_poscar_content(content, "Fe").unwrap();
        assert_eq!(crystal.atoms.len(), 2);
    }

    #[test]
    fn test_parse_poscar_truncated_positions() {
        let content = "Si\n1.0\n1 0 0\n0 1 0\n0 0 1\nSi\n2\nDirect\n0 0 0\n";
        assert!(parse_poscar_content(content, "Si").is_err());
    }
}
