//! # 通用命令求解器
//!
//! 把结构写入运行目录，执行用户给定的命令模板，从标准输出里用正则
//! 提取总能。适用于 Quantum ESPRESSO、PySCF/Psi4 包装脚本等任何能
//! 打印总能的程序。
//!
//! ## 命令模板占位符
//! `{input}` `{dir}` `{label}` `{functional}` `{basis}` `{kpoints}`
//! `{k1}` `{k2}` `{k3}` `{cutoff}` `{smearing}` `{spin}`
//!
//! ## 依赖关系
//! - 被 `solver/mod.rs` 构造
//! - 使用 `parsers::format_structure`

use super::{
    prepare_run_dir, write_file, write_options, EnergySolver, EnergyUnit, MethodOptions, Runner,
    STDOUT_FILE,
};
use crate::config::SolverConfig;
use crate::error::{EosError, Result};
use crate::models::Crystal;
use crate::parsers::{format_structure, StructureFormat};
use crate::utils::output;

use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

/// 默认能量正则：匹配 `total energy = -123.45`（大小写不敏感，允许 Fortran `D` 指数）
pub const DEFAULT_ENERGY_REGEX: &str =
    r"(?i)total\s+energy\s*[:=]?\s*(-?\d+(?:\.\d*)?(?:[eEdD][-+]?\d+)?)";

/// 命令模板求解器
pub struct CommandSolver {
    template: String,
    format: StructureFormat,
    energy_re: Regex,
    unit: EnergyUnit,
    work_dir: PathBuf,
    reuse: bool,
    runner: Runner,
}

impl CommandSolver {
    pub fn new(
        template: impl Into<String>,
        format: StructureFormat,
        energy_regex: Option<&str>,
        unit: EnergyUnit,
        work_dir: impl Into<PathBuf>,
        runner: Runner,
    ) -> Result<Self> {
        let pattern = energy_regex.unwrap_or(DEFAULT_ENERGY_REGEX);
        let energy_re = Regex::new(pattern).map_err(|e| {
            EosError::InvalidArgument(format!("Invalid energy regex '{}': {}", pattern, e))
        })?;
        if energy_re.captures_len() < 2 {
            return Err(EosError::InvalidArgument(format!(
                "Energy regex '{}' needs a capture group for the number",
                pattern
            )));
        }

        Ok(CommandSolver {
            template: template.into(),
            format,
            energy_re,
            unit,
            work_dir: work_dir.into(),
            reuse: false,
            runner,
        })
    }

    pub fn from_config(config: &SolverConfig, runner: Runner) -> Result<Self> {
        let template = config.command.clone().ok_or_else(|| {
            EosError::InvalidArgument(
                "The command solver needs --command (or [solver].command)".to_string(),
            )
        })?;
        let solver = CommandSolver::new(
            template,
            config.input_format,
            config.energy_regex.as_deref(),
            config.energy_unit,
            &config.work_dir,
            runner,
        )?;
        Ok(solver.with_reuse(config.reuse))
    }

    pub fn with_reuse(mut self, reuse: bool) -> Self {
        self.reuse = reuse;
        self
    }

    /// 展开命令模板
    pub fn render(&self, input: &str, dir: &Path, label: &str, method: &MethodOptions) -> String {
        let mut cmd = self
            .template
            .replace("{input}", input)
            .replace("{dir}", &dir.display().to_string())
            .replace("{label}", label);
        for (key, value) in method.placeholders() {
            cmd = cmd.replace(key, &value);
        }
        cmd
    }

    /// 从输出文本中提取最后一个匹配的能量 (eV)
    pub fn extract_energy(&self, text: &str) -> Option<f64> {
        let raw = self
            .energy_re
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .last()?
            .as_str()
            .replace(['d', 'D'], "e");
        raw.parse::<f64>().ok().map(|e| e * self.unit.to_ev())
    }

    fn read_energy(&self, stdout_path: &Path) -> Result<f64> {
        let text = fs::read_to_string(stdout_path).map_err(|e| EosError::read(stdout_path, e))?;
        self.extract_energy(&text)
            .ok_or_else(|| EosError::EnergyNotFound {
                path: stdout_path.display().to_string(),
            })
    }
}

impl EnergySolver for CommandSolver {
    fn name(&self) -> &str {
        "command"
    }

    fn total_energy(&self, crystal: &Crystal, label: &str, method: &MethodOptions) -> Result<f64> {
        let dir = prepare_run_dir(&self.work_dir, label)?;
        let stdout_path = dir.join(STDOUT_FILE);

        if self.reuse && stdout_path.exists() {
            if let Ok(energy) = self.read_energy(&stdout_path) {
                output::print_skip(&format!("{}: reusing {}", label, stdout_path.display()));
                return Ok(energy);
            }
        }

        let input_name = self.format.file_name(label);
        let content = format_structure(crystal, self.format, Some(method.kpoints));
        write_file(&dir.join(&input_name), &content)?;
        write_options(&dir, method)?;

        let cmd = self.render(&input_name, &dir, label, method);
        self.runner.run(&cmd, &dir, label)?;

        self.read_energy(&stdout_path)
    }
}
