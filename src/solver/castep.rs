//! # CASTEP 求解器
//!
//! 写入 `<seed>.cell`（含 `KPOINTS_MP_GRID`）与 `<seed>.param`，执行 CASTEP，
//! 从 `<seed>.castep` 读取 `Final energy`。
//!
//! ## 依赖关系
//! - 被 `solver/mod.rs` 构造
//! - 使用 `parsers/cell.rs`, `parsers/castep_out.rs`

use super::{mpi_command, prepare_run_dir, write_file, write_options, EnergySolver, MethodOptions, Runner};
use crate::config::SolverConfig;
use crate::error::{EosError, Result};
use crate::models::Crystal;
use crate::parsers::{castep_out, cell};
use crate::utils::output;

use std::fs;
use std::path::{Path, PathBuf};

/// 可执行文件默认名，可用环境变量 `EOSWEEP_CASTEP` 覆盖
pub const DEFAULT_CASTEP_EXEC: &str = "castep.mpi";
/// 运行目录内的 seed 名
pub const SEED: &str = "eos";

/// CASTEP 求解器
pub struct CastepSolver {
    executable: String,
    mpi_procs: u32,
    param_template: Option<PathBuf>,
    work_dir: PathBuf,
    reuse: bool,
    runner: Runner,
}

impl CastepSolver {
    pub fn from_config(config: &SolverConfig, runner: Runner) -> Self {
        CastepSolver {
            executable: config
                .executable
                .clone()
                .or_else(|| std::env::var("EOSWEEP_CASTEP").ok())
                .unwrap_or_else(|| DEFAULT_CASTEP_EXEC.to_string()),
            mpi_procs: config.mpi_procs,
            param_template: config.param_template.clone(),
            work_dir: config.work_dir.clone(),
            reuse: config.reuse,
            runner,
        }
    }

    fn finished_energy(castep_path: &Path, crystal: &Crystal) -> Result<f64> {
        castep_out::parse_castep_output(castep_path)?.energy_for(crystal, castep_path)
    }
}

impl EnergySolver for CastepSolver {
    fn name(&self) -> &str {
        "castep"
    }

    fn total_energy(&self, crystal: &Crystal, label: &str, method: &MethodOptions) -> Result<f64> {
        let dir = prepare_run_dir(&self.work_dir, label)?;
        let castep_path = dir.join(format!("{}.castep", SEED));

        if self.reuse && castep_path.exists() {
            if let Ok(energy) = Self::finished_energy(&castep_path, crystal) {
                output::print_skip(&format!("{}: reusing {}", label, castep_path.display()));
                return Ok(energy);
            }
        }

        // CASTEP 追加写 .castep，先清掉旧输出避免读到上次的结果
        if castep_path.exists() {
            fs::remove_file(&castep_path).map_err(|e| EosError::write(&castep_path, e))?;
        }

        write_file(
            &dir.join(format!("{}.cell", SEED)),
            &cell::to_cell_string(crystal, Some(method.kpoints)),
        )?;
        let param = match self.param_template {
            Some(ref t) => fs::read_to_string(t).map_err(|e| EosError::read(t, e))?,
            None => generate_param(method),
        };
        write_file(&dir.join(format!("{}.param", SEED)), &param)?;
        write_options(&dir, method)?;

        let cmd = mpi_command(&self.executable, self.mpi_procs, SEED);
        self.runner.run(&cmd, &dir, label)?;

        Self::finished_energy(&castep_path, crystal)
    }
}

/// 由方法选项生成单点 .param
pub fn generate_param(method: &MethodOptions) -> String {
    let mut lines = vec![
        "task : singlepoint".to_string(),
        format!("xc_functional : {}", method.functional.to_uppercase()),
        format!("spin_polarized : {}", method.spin_polarized),
        "write_checkpoint : none".to_string(),
    ];
    if let Some(cutoff) = method.cutoff_ev {
        lines.push(format!("cut_off_energy : {} eV", cutoff));
    }
    if let Some(width) = method.smearing_ev {
        lines.push(format!("smearing_width : {} eV", width));
    }
    for (key, value) in &method.extra {
        lines.push(format!("{} : {}", key, value));
    }
    lines.join("\n") + "\n"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_param() {
        let method = MethodOptions {
            functional: "pbesol".to_string(),
            cutoff_ev: Some(350.0),
            spin_polarized: true,
            ..MethodOptions::default()
        };
        let param = generate_param(&method);
        assert!(param.starts_with("task : singlepoint\n"));
        assert!(param.contains("xc_functional : PBESOL"));
        assert!(param.contains("spin_polarized : true"));
        assert!(param.contains("cut_off_energy : 350 eV"));
        assert!(!param.contains("smearing_width"));
    }

    #[cfg(unix)]
    #[test]
    fn test_castep_solver_with_fake_executable() {
        use crate::models::{CellSetting, Prototype};
        use crate::solver::Launcher;
        use crate::utils::slurm::SlurmConfig;

        let dir = tempfile::tempdir().unwrap();
        let config = SolverConfig {
            // 假的 castep：检查输入存在后写出 .castep
            executable: Some(
                "f() { test -f $1.cell && test -f $1.param && printf 'Final energy, E = -215.5 eV\\nTotal time = 1 s\\n' > $1.castep; }; f"
                    .to_string(),
            ),
            work_dir: dir.path().to_path_buf(),
            ..SolverConfig::default()
        };
        let solver =
            CastepSolver::from_config(&config, Runner::new(Launcher::Direct, SlurmConfig::default()));
        let crystal = Prototype::Diamond
            .build("Si", 5.43, CellSetting::Primitive)
            .unwrap();

        let e = solver
            .total_energy(&crystal, "a_5.4300", &MethodOptions::default())
            .unwrap();
        assert!((e - (-215.5)).abs() < 1e-12);
    }

    #[cfg(unix)]
    #[test]
    fn test_reuse_of_existing_castep_output() {
        use crate::models::{CellSetting, Prototype};
        use crate::solver::Launcher;
        use crate::utils::slurm::SlurmConfig;

        let dir = tempfile::tempdir().unwrap();
        let run_dir = dir.path().join("a_5.4300");
        std::fs::create_dir_all(&run_dir).unwrap();
        let castep_path = run_dir.join(format!("{}.castep", SEED));

        let config = SolverConfig {
            executable: Some(
                "f() { printf 'Final energy, E = -216.0 eV\\nTotal time = 1 s\\n' > $1.castep; }; f"
                    .to_string(),
            ),
            work_dir: dir.path().to_path_buf(),
            reuse: true,
            ..SolverConfig::default()
        };
        let solver =
            CastepSolver::from_config(&config, Runner::new(Launcher::Direct, SlurmConfig::default()));
        let crystal = Prototype::Diamond
            .build("Si", 5.43, CellSetting::Primitive)
            .unwrap();
        let finished = format!(
            "Total number of ions in cell = 2\nCurrent cell volume = {:.6} A**3\nFinal energy, E = -215.5 eV\nTotal time = 1 s\n",
            crystal.lattice.volume()
        );

        // 已完成：直接复用，不写输入
        std::fs::write(&castep_path, &finished).unwrap();
        let e = solver
            .total_energy(&crystal, "a_5.4300", &MethodOptions::default())
            .unwrap();
        assert!((e - (-215.5)).abs() < 1e-12);
        assert!(!run_dir.join(format!("{}.cell", SEED)).exists());

        // 追加的最后一次运行未完成：重新计算
        std::fs::write(&castep_path, finished.clone() + "Final energy, E = -1.0 eV\n").unwrap();
        let e = solver
            .total_energy(&crystal, "a_5.4300", &MethodOptions::default())
            .unwrap();
        assert!((e - (-216.0)).abs() < 1e-12);

        // 另一个结构的输出：重新计算
        std::fs::write(&castep_path, finished.replace("ions in cell = 2", "ions in cell = 8")).unwrap();
        std::fs::remove_file(run_dir.join(format!("{}.cell", SEED))).unwrap();
        let e = solver
            .total_energy(&crystal, "a_5.4300", &MethodOptions::default())
            .unwrap();
        assert!((e - (-216.0)).abs() < 1e-12);
        assert!(run_dir.join(format!("{}.cell", SEED)).exists());
    }
}
