//! # CASTEP .castep 输出解析器
//!
//! 解析 CASTEP 计算输出文件 .castep，提取最终总能。
//!
//! ## 依赖关系
//! - 被 `solver/castep.rs` 使用
//! - 使用 `models/calculation.rs`

use crate::error::{EosError, Result};
use crate::models::{DftCodeType, SolverOutput};
use std::fs;
use std::path::Path;

/// 解析 CASTEP .castep 输出文件
pub fn parse_castep_output(path: &Path) -> Result<SolverOutput> {
    let content = fs::read_to_string(path).map_err(|e| EosError::read(path, e))?;
    Ok(parse_castep_content(&content))
}

/// 从字符串内容解析 .castep 输出
///
/// 文件可能包含多次运行（续算时追加），取最后出现的值；
/// 只有最后一个 `Final energy` 之后出现 `Total time` 才算完成。
pub fn parse_castep_content(content: &str) -> SolverOutput {
    let mut result = SolverOutput::new(DftCodeType::Castep);

    for line in content.lines() {
        // "Final energy, E             =  -1234.56789012     eV"
        // 旧版本: "Final energy =  -1234.56789012 eV"
        if line.contains("Final energy, E") || line.trim_start().starts_with("Final energy =") {
            if let Some(val) = extract_value_after_eq(line) {
                result.energy_ev = Some(val);
                result.is_finished = false;
            }
        }

        if line.contains("Total time") {
            result.is_finished = result.energy_ev.is_some();
        }

        // "Current cell volume =           123.456789       A**3"
        if line.contains("Current cell volume") {
            if let Some(val) = extract_value_after_eq(line) {
                result.volume = Some(val);
            }
        }

        // "Total number of ions in cell =       8"
        if line.contains("Total number of ions in cell") {
            if let Some(val) = extract_value_after_eq(line) {
                result.num_atoms = Some(val as usize);
            }
        }
    }

    result
}

/// 提取等号后的数值
fn extract_value_after_eq(s: &str) -> Option<f64> {
    let pos = s.find('=')?;
    s[pos + 1..].split_whitespace().next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_castep_final_energy() {
        let content = r#"
                           Total number of ions in cell =    2
                    Current cell volume =            40.888000       A**3
Final energy, E             =  -215.123400000     eV
Final free energy (E-TS)    =  -215.123400000     eV
Total time          =          12.34 s
"#;
        let out = parse_castep_content(content);
        assert!(out.is_finished);
        assert_eq!(out.num_atoms, Some(2));
        assert!((out.energy_ev.unwrap() - (-215.1234)).abs() < 1e-9);
        assert!((out.volume.unwrap() - 40.888).abs() < 1e-9);
    }

    #[test]
    fn test_parse_castep_takes_last_run() {
        let content = "Final energy, E = -1.0 eV\nTotal time = 1 s\nFinal energy, E = -2.0 eV\n";
        let out = parse_castep_content(content);
        assert_eq!(out.energy_ev, Some(-2.0));
    }

    #[test]
    fn test_parse_castep_appended_run_unfinished() {
        // 第一次运行正常结束，追加的第二次运行中断
        let content = "\
Total number of ions in cell =    8
Final energy, E = -1.0 eV
Total time = 1 s
Total number of ions in cell =    2
Final energy, E = -2.0 eV
";
        let out = parse_castep_content(content);
        assert!(!out.is_finished);
        assert_eq!(out.energy_ev, Some(-2.0));
        assert_eq!(out.num_atoms, Some(2));
    }

    #[test]
    fn test_parse_castep_unfinished() {
        let out = parse_castep_content("Final energy, E = -1.0 eV\n");
        assert!(!out.is_finished);
    }
}
