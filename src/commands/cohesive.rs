//! # cohesive 命令实现
//!
//! 用同一个求解器计算盒子中孤立原子的能量，E_coh = E_atom - E_bulk/atom。
//! 成键时 E_coh 为正。
//!
//! ## 依赖关系
//! - 使用 `cli/cohesive.rs` 定义的参数
//! - 使用 `solver/`, `fitting/`, `models/structure.rs`
//! - `atom_energy` 也被 `commands/run.rs` 使用

use crate::cli::cohesive::CohesiveArgs;
use crate::config::EosConfig;
use crate::error::{EosError, Result};
use crate::fitting::{self, FitOptions};
use crate::models::calculation::read_sweep_csv;
use crate::models::{isolated_atom, EnergyPoint};
use crate::solver::{self, EnergySolver};
use crate::utils::{output, progress};

/// 孤立原子运行目录名
pub const ATOM_LABEL: &str = "atom";

/// 体相每原子能量的来源
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BulkReference {
    /// 命令行给定
    Given(f64),
    /// 拟合得到的 E0
    Fitted(f64),
    /// 拟合失败时取最低采样点
    LowestSample(f64),
}

impl BulkReference {
    pub fn energy(self) -> f64 {
        match self {
            BulkReference::Given(e) | BulkReference::Fitted(e) | BulkReference::LowestSample(e) => e,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            BulkReference::Given(_) => "given",
            BulkReference::Fitted(_) => "fitted E0",
            BulkReference::LowestSample(_) => "lowest sample",
        }
    }
}

/// 执行 cohesive 命令
pub fn execute(args: CohesiveArgs) -> Result<()> {
    output::print_header("Isolated Atom and Cohesive Energy");

    let mut config = EosConfig::resolve(&args.solver, &args.structure)?;
    config.apply_atom_args(&args.atom);

    let bulk = match (args.bulk_energy, &args.from_sweep) {
        (Some(e), _) => Some(BulkReference::Given(e)),
        (None, Some(path)) => Some(bulk_reference_from_points(&read_sweep_csv(path)?)?),
        (None, None) => None,
    };

    let solver = solver::from_config(&config.solver, &config.slurm)?;
    let spinner = progress::create_spinner(&format!(
        "Isolated {} atom in a {:.1} Å box ({})",
        config.structure.element,
        config.atom.box_edge,
        solver.name()
    ));
    let result = atom_energy(solver.as_ref(), &config);
    spinner.finish_and_clear();
    let e_atom = result?;

    output::print_success(&format!("E_atom = {:.6} eV", e_atom));

    match bulk {
        Some(bulk) => {
            output::print_info(&format!(
                "E_bulk = {:.6} eV/atom ({})",
                bulk.energy(),
                bulk.describe()
            ));
            output::print_done(&format!(
                "E_coh = {:.4} eV/atom",
                cohesive_energy(e_atom, bulk.energy())
            ));
        }
        None => output::print_skip(
            "No bulk energy given (--bulk-energy or --from-sweep); cohesive energy not computed",
        ),
    }

    Ok(())
}

/// E_coh = E_atom - E_bulk/atom
pub fn cohesive_energy(atom_energy: f64, bulk_per_atom: f64) -> f64 {
    atom_energy - bulk_per_atom
}

/// 孤立原子总能 (eV)
pub fn atom_energy(solver: &dyn EnergySolver, config: &EosConfig) -> Result<f64> {
    let crystal = isolated_atom(
        &config.structure.element,
        config.atom.box_edge,
        config.atom.distortion,
    )?;
    let method = config.atom.method_for_atom(&config.method);
    solver.total_energy(&crystal, ATOM_LABEL, &method)
}

/// 由扫描点确定体相参考：能拟合就用 E0，否则取最低点
pub fn bulk_reference_from_points(points: &[EnergyPoint]) -> Result<BulkReference> {
    if points.is_empty() {
        return Err(EosError::InvalidArgument(
            "sweep table has no points".to_string(),
        ));
    }

    match fitting::fit_points(points, &FitOptions::default()) {
        Ok(fit) => Ok(BulkReference::Fitted(fit.params.e0)),
        Err(e) => {
            output::print_warning(&format!("{}; using the lowest sampled energy", e));
            let lowest = points
                .iter()
                .map(EnergyPoint::energy_per_atom)
                .fold(f64::INFINITY, f64::min);
            Ok(BulkReference::LowestSample(lowest))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fitting::{EosModel, EosParameters};
    use crate::models::{CellSetting, Crystal, Prototype};
    use crate::solver::MethodOptions;
    use std::cell::RefCell;

    /// 记录调用参数的求解器
    struct RecordingSolver {
        calls: RefCell<Vec<(String, MethodOptions, f64)>>,
    }

    impl EnergySolver for RecordingSolver {
        fn name(&self) -> &str {
            "recording"
        }

        fn total_energy(&self, crystal: &Crystal, label: &str, method: &MethodOptions) -> Result<f64> {
            self.calls
                .borrow_mut()
                .push((label.to_string(), method.clone(), crystal.lattice.volume()));
            Ok(-0.87)
        }
    }

    #[test]
    fn test_cohesive_energy_is_positive_when_bound() {
        let e = cohesive_energy(-0.87, -5.42);
        assert!((e - 4.55).abs() < 1e-12);
        assert!(cohesive_energy(-6.0, -5.42) < 0.0);
    }

    #[test]
    fn test_atom_energy_uses_atom_overrides() {
        let solver = RecordingSolver {
            calls: RefCell::new(Vec::new()),
        };
        let mut config = EosConfig::default();
        config.method.kpoints = [8, 8, 8];
        config.atom.box_edge = 10.0;
        config.atom.distortion = 0.1;

        assert_eq!(atom_energy(&solver, &config).unwrap(), -0.87);

        let calls = solver.calls.borrow();
        assert_eq!(calls.len(), 1);
        let (label, method, volume) = &calls[0];
        assert_eq!(label, ATOM_LABEL);
        assert_eq!(method.kpoints, [1, 1, 1]);
        assert!(method.spin_polarized);
        assert!((volume - 1000.0 * 1.1 * 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_bulk_reference_prefers_fit() {
        let params = EosParameters {
            e0: -5.42,
            v0: 20.45,
            b0: 0.55,
            b0_prime: 4.2,
        };
        let points: Vec<EnergyPoint> = [5.3, 5.35, 5.4, 5.45, 5.5, 5.55]
            .iter()
            .map(|&a| {
                let v = Prototype::Diamond.volume_per_atom(a, CellSetting::Primitive);
                EnergyPoint {
                    lattice_parameter: a,
                    n_atoms: 2,
                    cell_volume: 2.0 * v,
                    total_energy: 2.0 * EosModel::BirchMurnaghan.energy(v, &params),
                }
            })
            .collect();

        match bulk_reference_from_points(&points).unwrap() {
            BulkReference::Fitted(e) => assert!((e - params.e0).abs() < 1e-8),
            other => panic!("expected fitted reference, got {:?}", other),
        }

        // 三个点无法拟合
        match bulk_reference_from_points(&points[..3]).unwrap() {
            BulkReference::LowestSample(e) => {
                let lowest = points[..3]
                    .iter()
                    .map(EnergyPoint::energy_per_atom)
                    .fold(f64::INFINITY, f64::min);
                assert_eq!(e, lowest);
            }
            other => panic!("expected lowest sample, got {:?}", other),
        }

        assert!(bulk_reference_from_points(&[]).is_err());
    }
}
