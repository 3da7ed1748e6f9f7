//! # sweep 命令实现
//!
//! 按晶格常数逐点构建结构、调用求解器，得到扫描表。
//!
//! ## 功能
//! - 解析扫描表达式 (`start:stop:step` / `start:stop` + `--points` / 列表)
//! - 顺序执行每个点，进度条显示进度
//! - `--keep-going` 时跳过失败的点
//! - 终端表格 + CSV 输出
//!
//! ## 依赖关系
//! - 使用 `cli/sweep.rs` 定义的参数
//! - 使用 `solver/`, `models/`, `utils/output.rs`, `utils/progress.rs`
//! - `run_sweep` 也被 `commands/run.rs` 使用

use crate::cli::sweep::SweepArgs;
use crate::config::{EosConfig, StructureConfig};
use crate::error::{EosError, Result};
use crate::models::calculation::write_sweep_csv;
use crate::models::EnergyPoint;
use crate::solver::{self, EnergySolver, MethodOptions};
use crate::utils::{output, progress};

use tabled::{Table, Tabled};

/// 相对容差内视为同一个晶格常数
const DEDUP_TOLERANCE: f64 = 1e-9;

/// 单次扫描的点数上限
pub const MAX_SWEEP_POINTS: usize = 10_000;

/// 扫描表的一行
#[derive(Debug, Clone, Tabled)]
struct PointRow {
    #[tabled(rename = "a (Å)")]
    lattice: String,
    #[tabled(rename = "V/atom (Å³)")]
    volume: String,
    #[tabled(rename = "E/atom (eV)")]
    energy: String,
    #[tabled(rename = "ΔE (meV/atom)")]
    delta: String,
}

/// 执行 sweep 命令
pub fn execute(args: SweepArgs) -> Result<()> {
    output::print_header("Lattice Parameter Sweep");

    let config = EosConfig::resolve(&args.solver, &args.structure)?;
    let expr = args
        .sweep
        .lattice
        .as_deref()
        .unwrap_or(&config.structure.lattice);
    let values = parse_lattice_sweep(expr, args.sweep.points)?;

    let solver = solver::from_config(&config.solver, &config.slurm)?;
    output::print_info(&format!(
        "{} {} ({}), {} points, solver: {}",
        config.structure.element,
        config.structure.prototype,
        config.structure.cell,
        values.len(),
        solver.name()
    ));

    let points = run_sweep(
        solver.as_ref(),
        &config.method,
        &config.structure,
        &values,
        args.sweep.keep_going,
        1,
    )?;

    print_points_table(&points);

    write_sweep_csv(&points, &args.output)?;
    output::print_success(&format!("Sweep table saved to '{}'", args.output.display()));

    Ok(())
}

/// 运行目录标签
pub fn point_label(a: f64) -> String {
    format!("a_{:.4}", a)
}

/// 解析扫描表达式，返回升序、去重的晶格常数
pub fn parse_lattice_sweep(expr: &str, points: Option<usize>) -> Result<Vec<f64>> {
    let invalid = || EosError::InvalidRange(expr.to_string());
    let number = |s: &str| {
        s.trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(invalid)
    };
    let too_many = |n: f64| {
        EosError::InvalidRange(format!(
            "{}: {} points exceeds the limit of {}",
            expr, n, MAX_SWEEP_POINTS
        ))
    };

    let mut values: Vec<f64> = if expr.contains(':') {
        let parts: Vec<&str> = expr.split(':').collect();
        match parts.as_slice() {
            [start, stop, step] => {
                if points.is_some() {
                    return Err(EosError::InvalidRange(format!(
                        "{}: --points only applies to 'start:stop'",
                        expr
                    )));
                }
                let (start, stop, step) = (number(*start)?, number(*stop)?, number(*step)?);
                if !(step > 0.0) || stop < start {
                    return Err(invalid());
                }
                let n = ((stop - start) / step + 1e-9).floor() + 1.0;
                if !n.is_finite() || n > MAX_SWEEP_POINTS as f64 {
                    return Err(too_many(n));
                }
                (0..n as usize).map(|i| start + i as f64 * step).collect()
            }
            [start, stop] => {
                let (start, stop) = (number(*start)?, number(*stop)?);
                let n = points.ok_or_else(|| {
                    EosError::InvalidRange(format!("{}: 'start:stop' needs --points", expr))
                })?;
                if n < 2 || stop <= start {
                    return Err(invalid());
                }
                if n > MAX_SWEEP_POINTS {
                    return Err(too_many(n as f64));
                }
                (0..n)
                    .map(|i| start + (stop - start) * i as f64 / (n - 1) as f64)
                    .collect()
            }
            _ => return Err(invalid()),
        }
    } else {
        expr.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(number)
            .collect::<Result<Vec<f64>>>()?
    };

    // 消除 start + i * step 的浮点尾数
    for v in values.iter_mut() {
        *v = (*v * 1e10).round() / 1e10;
    }

    if values.is_empty() || values.iter().any(|v| !v.is_finite() || *v <= 0.0) {
        return Err(EosError::InvalidRange(format!(
            "{}: lattice parameters must be positive",
            expr
        )));
    }

    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    values.dedup_by(|a, b| (*a - *b).abs() <= DEDUP_TOLERANCE * b.abs());
    Ok(values)
}

/// 顺序计算每个晶格常数的总能
///
/// 成功的点少于 `min_points` 时返回错误。
pub fn run_sweep(
    solver: &dyn EnergySolver,
    method: &MethodOptions,
    structure: &StructureConfig,
    values: &[f64],
    keep_going: bool,
    min_points: usize,
) -> Result<Vec<EnergyPoint>> {
    let pb = progress::create_progress_bar(values.len() as u64, solver.name());
    let mut points = Vec::with_capacity(values.len());
    let mut failed = 0usize;

    for &a in values {
        let label = point_label(a);
        pb.set_message(label.clone());

        match compute_point(solver, method, structure, a, &label) {
            Ok(point) => points.push(point),
            Err(e) if keep_going => {
                pb.suspend(|| output::print_skip(&format!("{}: {}", label, e)));
                failed += 1;
            }
            Err(e) => {
                pb.finish_and_clear();
                return Err(e);
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();

    if failed > 0 {
        output::print_warning(&format!(
            "{} of {} sweep points failed and were skipped",
            failed,
            values.len()
        ));
    }

    if points.is_empty() {
        return Err(EosError::Other(format!(
            "All {} sweep points failed",
            values.len()
        )));
    }
    if points.len() < min_points {
        return Err(EosError::FitError(format!(
            "only {} sweep points succeeded, at least {} are needed",
            points.len(),
            min_points
        )));
    }

    output::print_done(&format!("{} points computed", points.len()));
    Ok(points)
}

fn compute_point(
    solver: &dyn EnergySolver,
    method: &MethodOptions,
    structure: &StructureConfig,
    a: f64,
    label: &str,
) -> Result<EnergyPoint> {
    let crystal = structure
        .prototype
        .build(&structure.element, a, structure.cell)?;
    let energy = solver.total_energy(&crystal, label, method)?;
    if !energy.is_finite() {
        return Err(EosError::Other(format!(
            "{}: solver returned a non-finite energy",
            label
        )));
    }

    Ok(EnergyPoint {
        lattice_parameter: a,
        n_atoms: crystal.atoms.len(),
        cell_volume: crystal.lattice.volume(),
        total_energy: energy,
    })
}

/// 打印扫描表，ΔE 相对最低点
pub fn print_points_table(points: &[EnergyPoint]) {
    let e_min = points
        .iter()
        .map(EnergyPoint::energy_per_atom)
        .fold(f64::INFINITY, f64::min);

    let rows: Vec<PointRow> = points
        .iter()
        .map(|p| PointRow {
            lattice: format!("{:.4}", p.lattice_parameter),
            volume: format!("{:.4}", p.volume_per_atom()),
            energy: format!("{:.6}", p.energy_per_atom()),
            delta: format!("{:.2}", (p.energy_per_atom() - e_min) * 1000.0),
        })
        .collect();

    println!("{}", Table::new(&rows));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fitting::{fit_points, EosModel, EosParameters, FitOptions};
    use crate::models::{CellSetting, Crystal, Prototype};

    const SI: EosParameters = EosParameters {
        e0: -5.4231,
        v0: 20.46,
        b0: 0.5526,
        b0_prime: 4.15,
    };

    /// 解析 BM3 曲线代替外部程序
    struct AnalyticSolver {
        fail_labels: Vec<String>,
    }

    impl EnergySolver for AnalyticSolver {
        fn name(&self) -> &str {
            "analytic"
        }

        fn total_energy(&self, crystal: &Crystal, label: &str, _: &MethodOptions) -> Result<f64> {
            if self.fail_labels.iter().any(|l| l == label) {
                return Err(EosError::EnergyNotFound {
                    path: label.to_string(),
                });
            }
            let e = EosModel::BirchMurnaghan.energy(crystal.volume_per_atom(), &SI);
            Ok(e * crystal.atoms.len() as f64)
        }
    }

    fn solver(fail: &[&str]) -> AnalyticSolver {
        AnalyticSolver {
            fail_labels: fail.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_parse_step_range() {
        let v = parse_lattice_sweep("5.23:5.63:0.05", None).unwrap();
        assert_eq!(v.len(), 9);
        assert_eq!(v[0], 5.23);
        assert_eq!(v[8], 5.63);
        assert_eq!(v[4], 5.43);
    }

    #[test]
    fn test_parse_linspace_and_list() {
        let v = parse_lattice_sweep("5.0:6.0", Some(5)).unwrap();
        assert_eq!(v, vec![5.0, 5.25, 5.5, 5.75, 6.0]);

        let v = parse_lattice_sweep("5.5, 5.3,5.4,5.3", None).unwrap();
        assert_eq!(v, vec![5.3, 5.4, 5.5]);
    }

    #[test]
    fn test_parse_rejects_bad_ranges() {
        for expr in ["", "5.6:5.2:0.1", "5.2:5.6:0", "5.2:5.6:-0.1", "-1,5.4", "a:b:c", "1:2:3:4"] {
            assert!(parse_lattice_sweep(expr, None).is_err(), "{}", expr);
        }
        assert!(parse_lattice_sweep("5.0:6.0", None).is_err());
        assert!(parse_lattice_sweep("5.0:6.0", Some(1)).is_err());
        assert!(parse_lattice_sweep("5.0:6.0:0.1", Some(4)).is_err());
    }

    #[test]
    fn test_parse_rejects_unbounded_ranges() {
        for expr in ["5.0:inf:0.1", "nan:5.0:0.1", "5.0:6.0:NaN", "1:2:1e-15", "5.4,inf"] {
            assert!(
                matches!(parse_lattice_sweep(expr, None), Err(EosError::InvalidRange(_))),
                "{}",
                expr
            );
        }
        assert!(matches!(
            parse_lattice_sweep("5.0:6.0", Some(1_000_000)),
            Err(EosError::InvalidRange(_))
        ));
        assert!(matches!(
            parse_lattice_sweep("5.0:inf", Some(5)),
            Err(EosError::InvalidRange(_))
        ));

        let limit = parse_lattice_sweep("1.0:2.0", Some(MAX_SWEEP_POINTS)).unwrap();
        assert_eq!(limit.len(), MAX_SWEEP_POINTS);
    }

    #[test]
    fn test_sweep_then_fit_recovers_lattice_constant() {
        let values = parse_lattice_sweep("5.23:5.63:0.05", None).unwrap();

        for cell in [CellSetting::Primitive, CellSetting::Conventional] {
            let structure = StructureConfig {
                cell,
                ..StructureConfig::default()
            };
            let points = run_sweep(
                &solver(&[]),
                &MethodOptions::default(),
                &structure,
                &values,
                false,
                4,
            )
            .unwrap();
            assert_eq!(points.len(), 9);
            assert_eq!(points[0].n_atoms, Prototype::Diamond.atoms_per_cell(cell));

            let fit = fit_points(&points, &FitOptions::default()).unwrap();
            let a0 = fit.lattice_parameter(Prototype::Diamond, cell);
            assert!((a0 - (8.0 * SI.v0).cbrt()).abs() < 1e-6);
            assert!((fit.params.e0 - SI.e0).abs() < 1e-8);
        }
    }

    #[test]
    fn test_failed_point_aborts_without_keep_going() {
        let values = parse_lattice_sweep("5.3,5.4,5.5,5.6,5.7", None).unwrap();
        let structure = StructureConfig::default();
        let method = MethodOptions::default();

        let err = run_sweep(&solver(&["a_5.4000"]), &method, &structure, &values, false, 4)
            .unwrap_err();
        assert!(matches!(err, EosError::EnergyNotFound { .. }));

        let points =
            run_sweep(&solver(&["a_5.4000"]), &method, &structure, &values, true, 4).unwrap();
        assert_eq!(points.len(), 4);
        assert!(points.iter().all(|p| p.lattice_parameter != 5.4));
    }

    #[test]
    fn test_keep_going_still_needs_enough_points() {
        let values = parse_lattice_sweep("5.3,5.4,5.5,5.6", None).unwrap();
        let err = run_sweep(
            &solver(&["a_5.3000"]),
            &MethodOptions::default(),
            &StructureConfig::default(),
            &values,
            true,
            4,
        )
        .unwrap_err();
        assert!(matches!(err, EosError::FitError(_)));
    }

    #[test]
    fn test_point_label() {
        assert_eq!(point_label(5.43), "a_5.4300");
    }
}
