//! # fit 命令实现
//!
//! 读取扫描表，拟合状态方程，输出报告、TOML 摘要和图表。
//!
//! ## 依赖关系
//! - 使用 `cli/fit.rs` 定义的参数
//! - 使用 `fitting/`, `plot.rs`, `utils/output.rs`
//! - 报告与绘图函数也被 `commands/run.rs` 使用

use crate::cli::common::{FitOptionArgs, PlotArgs};
use crate::cli::fit::FitArgs;
use crate::commands::cohesive::cohesive_energy;
use crate::commands::sweep::print_points_table;
use crate::config::{EosConfig, StructureConfig};
use crate::error::{EosError, Result};
use crate::fitting::levenberg::LmOptions;
use crate::fitting::{self, EosFit, FitOptions, FitSummary, EV_PER_A3_TO_GPA};
use crate::models::calculation::read_sweep_csv;
use crate::models::EnergyPoint;
use crate::plot::{self, PlotSpec, XAxis};
use crate::utils::output;

use std::fs;
use std::path::Path;
use tabled::{Table, Tabled};

/// 报告表的一行
#[derive(Debug, Clone, Tabled)]
struct ParamRow {
    #[tabled(rename = "Quantity")]
    name: &'static str,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Unit")]
    unit: &'static str,
}

/// 逐点残差与压强
#[derive(Debug, Clone, Tabled)]
struct ResidualRow {
    #[tabled(rename = "a (Å)")]
    lattice: String,
    #[tabled(rename = "V/atom (Å³)")]
    volume: String,
    #[tabled(rename = "E - E_fit (meV/atom)")]
    residual: String,
    #[tabled(rename = "P (GPa)")]
    pressure: String,
}

/// 执行 fit 命令
pub fn execute(args: FitArgs) -> Result<()> {
    output::print_header("Equation-of-State Fit");

    let mut config = EosConfig::load(args.config.as_deref())?;
    config.apply_structure_args(&args.structure);

    let points = read_sweep_csv(&args.input)?;
    output::print_info(&format!(
        "Loaded {} points from '{}'",
        points.len(),
        args.input.display()
    ));
    print_points_table(&points);

    let fit = fitting::fit_points(&points, &fit_options(&args.fit)?)?;
    let mut summary = fit.summary(config.structure.prototype, config.structure.cell);
    if let Some(atom) = args.atom_energy {
        summary.atom_energy_ev = Some(atom);
        summary.cohesive_energy_ev = Some(cohesive_energy(atom, fit.params.e0));
    }
    report_fit(&fit, &summary, &points);

    if let Some(ref path) = args.summary {
        write_summary(&summary, path)?;
        output::print_success(&format!("Fit summary saved to '{}'", path.display()));
    }

    if !args.plot_options.no_plot {
        render_plots(
            &points,
            Some(&fit),
            &config.structure,
            &args.plot_options,
            &args.plot,
            &args.lattice_plot,
        )?;
    }

    Ok(())
}

/// 命令行拟合参数 → `FitOptions`
pub fn fit_options(args: &FitOptionArgs) -> Result<FitOptions> {
    if args.max_iter == 0 {
        return Err(EosError::InvalidArgument(
            "--max-iter must be at least 1".to_string(),
        ));
    }
    Ok(FitOptions {
        model: args.model,
        guess: args.guess.as_deref().map(fitting::parse_guess).transpose()?,
        lm: LmOptions {
            max_iterations: args.max_iter,
            ..LmOptions::default()
        },
    })
}

/// 打印拟合结果，V0 越界或未收敛时给出警告
pub fn report_fit(fit: &EosFit, summary: &FitSummary, points: &[EnergyPoint]) {
    output::print_header(&format!("{} fit", fit.model));

    let mut rows = vec![
        ParamRow {
            name: "E0",
            value: format!("{:.6}", summary.e0_ev),
            unit: "eV/atom",
        },
        ParamRow {
            name: "V0",
            value: format!("{:.4}", summary.v0_a3),
            unit: "Å³/atom",
        },
        ParamRow {
            name: "a0",
            value: format!("{:.4}", summary.a0_angstrom),
            unit: "Å",
        },
        ParamRow {
            name: "B0",
            value: format!("{:.5}", summary.b0_ev_per_a3),
            unit: "eV/Å³",
        },
        ParamRow {
            name: "B0",
            value: format!("{:.2}", summary.b0_gpa),
            unit: "GPa",
        },
        ParamRow {
            name: "B0'",
            value: format!("{:.3}", summary.b0_prime),
            unit: "",
        },
        ParamRow {
            name: "RMS residual",
            value: format!("{:.3e}", summary.rms_ev),
            unit: "eV/atom",
        },
    ];
    if let Some(atom) = summary.atom_energy_ev {
        rows.push(ParamRow {
            name: "E_atom",
            value: format!("{:.6}", atom),
            unit: "eV",
        });
    }
    if let Some(coh) = summary.cohesive_energy_ev {
        rows.push(ParamRow {
            name: "E_coh",
            value: format!("{:.4}", coh),
            unit: "eV/atom",
        });
    }
    println!("{}", Table::new(&rows));

    let residuals: Vec<ResidualRow> = points
        .iter()
        .map(|p| {
            let v = p.volume_per_atom();
            ResidualRow {
                lattice: format!("{:.4}", p.lattice_parameter),
                volume: format!("{:.4}", v),
                residual: format!("{:+.3}", (p.energy_per_atom() - fit.energy_at(v)) * 1000.0),
                pressure: format!("{:.2}", fit.pressure_at(v) * EV_PER_A3_TO_GPA),
            }
        })
        .collect();
    println!("{}", Table::new(&residuals));

    if !fit.converged {
        output::print_warning(&format!(
            "Levenberg-Marquardt stopped after {} iterations without converging",
            fit.iterations
        ));
    }
    if !fit.v0_in_range() {
        let (lo, hi) = fit.volume_range;
        output::print_warning(&format!(
            "Fitted V0 = {:.4} Å³/atom lies outside the sampled range [{:.4}, {:.4}]; extend the sweep",
            fit.params.v0, lo, hi
        ));
    }
}

/// 写 TOML 摘要
pub fn write_summary(summary: &FitSummary, path: &Path) -> Result<()> {
    let text = toml::to_string(summary)?;
    fs::write(path, text).map_err(|e| EosError::write(path, e))
}

/// 画 E-V 与 E-a 两张图
pub fn render_plots(
    points: &[EnergyPoint],
    fit: Option<&EosFit>,
    structure: &StructureConfig,
    options: &PlotArgs,
    volume_path: &Path,
    lattice_path: &Path,
) -> Result<()> {
    let title = format!(
        "{} ({}, {})",
        structure.element, structure.prototype, structure.cell
    );

    for (x_axis, path) in [
        (XAxis::Volume, volume_path),
        (XAxis::LatticeParameter, lattice_path),
    ] {
        let spec = PlotSpec {
            title: &title,
            x_axis,
            prototype: structure.prototype,
            cell: structure.cell,
            width: options.width,
            height: options.height,
        };
        plot::plot_eos(points, fit, path, &spec)?;
        output::print_success(&format!("Plot saved to '{}'", path.display()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fitting::{EosModel, EosParameters};
    use crate::models::calculation::write_sweep_csv;
    use crate::models::{CellSetting, Prototype};

    fn fit_args(guess: Option<&str>) -> FitOptionArgs {
        FitOptionArgs {
            model: EosModel::Vinet,
            guess: guess.map(str::to_string),
            max_iter: 50,
        }
    }

    #[test]
    fn test_fit_options_from_args() {
        let options = fit_options(&fit_args(Some("-5.4,20.4,0.6,4"))).unwrap();
        assert_eq!(options.model, EosModel::Vinet);
        assert_eq!(options.lm.max_iterations, 50);
        assert_eq!(options.guess.map(|g| g.v0), Some(20.4));

        assert!(fit_options(&fit_args(Some("1,2"))).is_err());
        let mut zero = fit_args(None);
        zero.max_iter = 0;
        assert!(fit_options(&zero).is_err());
    }

    #[test]
    fn test_csv_to_summary_toml() {
        let dir = tempfile::tempdir().unwrap();
        let params = EosParameters {
            e0: -5.42,
            v0: 20.45,
            b0: 0.55,
            b0_prime: 4.2,
        };
        let points: Vec<EnergyPoint> = [5.3, 5.35, 5.4, 5.45, 5.5, 5.55]
            .iter()
            .map(|&a| {
                let volume = Prototype::Diamond.volume_per_atom(a, CellSetting::Primitive) * 2.0;
                EnergyPoint {
                    lattice_parameter: a,
                    n_atoms: 2,
                    cell_volume: volume,
                    total_energy: 2.0 * EosModel::BirchMurnaghan.energy(volume / 2.0, &params),
                }
            })
            .collect();
        let csv_path = dir.path().join("sweep.csv");
        write_sweep_csv(&points, &csv_path).unwrap();

        let points = read_sweep_csv(&csv_path).unwrap();
        let fit = fitting::fit_points(&points, &FitOptions::default()).unwrap();
        let mut summary = fit.summary(Prototype::Diamond, CellSetting::Primitive);
        summary.atom_energy_ev = Some(-5.0);
        summary.cohesive_energy_ev = Some(cohesive_energy(-5.0, fit.params.e0));

        let toml_path = dir.path().join("fit.toml");
        write_summary(&summary, &toml_path).unwrap();
        let value: toml::Value = toml::from_str(&fs::read_to_string(&toml_path).unwrap()).unwrap();

        assert_eq!(value["model"].as_str(), Some("birch-murnaghan"));
        assert_eq!(value["prototype"].as_str(), Some("diamond"));
        assert!((value["v0_a3"].as_float().unwrap() - 20.45).abs() < 1e-5);
        assert!((value["cohesive_energy_ev"].as_float().unwrap() - 0.42).abs() < 1e-6);
    }
}
