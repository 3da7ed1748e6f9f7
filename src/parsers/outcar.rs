//! # VASP OUTCAR 解析器
//!
//! 解析 VASP 计算输出文件 OUTCAR，提取最后一个离子步的总能。
//!
//! ## 依赖关系
//! - 被 `solver/vasp.rs` 使用
//! - 使用 `models/calculation.rs`

use crate::error::{EosError, Result};
use crate::models::{DftCodeType, SolverOutput};
use std::fs;
use std::path::Path;

/// 解析 VASP OUTCAR 文件
pub fn parse_outcar(path: &Path) -> Result<SolverOutput> {
    let content = fs::read_to_string(path).map_err(|e| EosError::read(path, e))?;
    Ok(parse_outcar_content(&content))
}

/// 从字符串内容解析 OUTCAR
pub fn parse_outcar_content(content: &str) -> SolverOutput {
    let mut result = SolverOutput::new(DftCodeType::Vasp);

    for line in content.lines() {
        // 检查是否完成
        if line.contains("General timing and accounting informations for this job") {
            result.is_finished = true;
        }

        // "energy  without entropy=     -123.456789  energy(sigma->0) =     -123.456789"
        if line.contains("energy  without entropy") {
            if let Some(pos) = line.find("energy(sigma->0)") {
                if let Some(val) = extract_number_after(&line[pos..], "=") {
                    result.energy_ev = Some(val);
                }
            }
        }

        // "  volume of cell :      123.456789"
        if line.contains("volume of cell") {
            if let Some(val) = extract_last_number(line) {
                result.volume = Some(val);
            }
        }

        // "   NIONS =       8"
        if line.contains("NIONS =") {
            if let Some(val) = extract_last_number(line) {
                result.num_atoms = Some(val as usize);
            }
        }
    }

    result
}

/// 从字符串中提取指定标记之后的数字
fn extract_number_after(s: &str, marker: &str) -> Option<f64> {
    let pos = s.find(marker)?;
    s[pos + marker.len()..].split_whitespace().next()?.parse().ok()
}

/// 提取字符串中最后一个数字
fn extract_last_number(s: &str) -> Option<f64> {
    s.split_whitespace()
        .filter_map(|w| w.parse::<f64>().ok())
        .last()
}
