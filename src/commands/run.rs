//! # run 命令实现
//!
//! 完整流程：
//! 1. 晶格常数扫描 → `sweep.csv`
//! 2. 状态方程拟合 → 终端报告
//! 3. (可选) 孤立原子 → 结合能
//! 4. `fit.toml` 摘要与 E-V / E-a 图
//!
//! ## 依赖关系
//! - 使用 `cli/run.rs` 定义的参数
//! - 组合 `commands/sweep.rs`, `commands/fit.rs`, `commands/cohesive.rs`

use crate::cli::run::RunArgs;
use crate::commands::{cohesive, fit, sweep};
use crate::config::EosConfig;
use crate::error::{EosError, Result};
use crate::fitting::{self, MIN_POINTS};
use crate::models::calculation::write_sweep_csv;
use crate::solver;
use crate::utils::{output, progress};

use std::fs;

/// 扫描表文件名
pub const SWEEP_CSV: &str = "sweep.csv";
/// 拟合摘要文件名
pub const FIT_SUMMARY: &str = "fit.toml";

const STEPS: usize = 4;

/// 执行 run 命令
pub fn execute(args: RunArgs) -> Result<()> {
    output::print_header("Equation-of-State Study");

    let mut config = EosConfig::resolve(&args.solver, &args.structure)?;
    config.apply_atom_args(&args.atom);

    let expr = args
        .sweep
        .lattice
        .as_deref()
        .unwrap_or(&config.structure.lattice);
    let values = sweep::parse_lattice_sweep(expr, args.sweep.points)?;
    if values.len() < MIN_POINTS {
        return Err(EosError::InvalidRange(format!(
            "{}: a fit needs at least {} lattice parameters, got {}",
            expr,
            MIN_POINTS,
            values.len()
        )));
    }
    let fit_options = fit::fit_options(&args.fit)?;

    fs::create_dir_all(&args.output_dir).map_err(|e| EosError::write(&args.output_dir, e))?;

    let solver = solver::from_config(&config.solver, &config.slurm)?;
    output::print_info(&format!(
        "{} {} ({}), {} points from {:.4} to {:.4} Å, solver: {}",
        config.structure.element,
        config.structure.prototype,
        config.structure.cell,
        values.len(),
        values[0],
        values[values.len() - 1],
        solver.name()
    ));

    output::print_step(1, STEPS, "Lattice sweep");
    let points = sweep::run_sweep(
        solver.as_ref(),
        &config.method,
        &config.structure,
        &values,
        args.sweep.keep_going,
        MIN_POINTS,
    )?;
    sweep::print_points_table(&points);

    let csv_path = args.output_dir.join(SWEEP_CSV);
    write_sweep_csv(&points, &csv_path)?;
    output::print_success(&format!("Sweep table saved to '{}'", csv_path.display()));

    output::print_step(2, STEPS, "Equation-of-state fit");
    let eos = fitting::fit_points(&points, &fit_options)?;
    let mut summary = eos.summary(config.structure.prototype, config.structure.cell);

    if args.with_atom {
        output::print_step(3, STEPS, "Isolated atom");
        let spinner = progress::create_spinner(&format!(
            "Isolated {} atom in a {:.1} Å box",
            config.structure.element, config.atom.box_edge
        ));
        let result = cohesive::atom_energy(solver.as_ref(), &config);
        spinner.finish_and_clear();
        let e_atom = result?;

        summary.atom_energy_ev = Some(e_atom);
        summary.cohesive_energy_ev = Some(cohesive::cohesive_energy(e_atom, eos.params.e0));
    }

    fit::report_fit(&eos, &summary, &points);

    output::print_step(STEPS, STEPS, "Report and plots");
    let summary_path = args.output_dir.join(FIT_SUMMARY);
    fit::write_summary(&summary, &summary_path)?;
    output::print_success(&format!("Fit summary saved to '{}'", summary_path.display()));

    if !args.plot_options.no_plot {
        let ext = &args.plot_format;
        fit::render_plots(
            &points,
            Some(&eos),
            &config.structure,
            &args.plot_options,
            &args.output_dir.join(format!("eos_volume.{}", ext)),
            &args.output_dir.join(format!("eos_lattice.{}", ext)),
        )?;
    }

    output::print_separator();
    output::print_done(&format!(
        "a0 = {:.4} Å, B0 = {:.1} GPa{}",
        summary.a0_angstrom,
        summary.b0_gpa,
        summary
            .cohesive_energy_ev
            .map(|e| format!(", E_coh = {:.3} eV/atom", e))
            .unwrap_or_default()
    ));

    Ok(())
}
