//! # 状态方程图表
//!
//! 使用 `plotters` 绘制：
//! - E/atom vs V/atom：采样点 + 拟合曲线 + V0 标记
//! - E/atom vs 晶格常数
//!
//! 输出格式由扩展名决定（`.svg` 为矢量图，其余为 PNG）。
//!
//! ## 依赖关系
//! - 被 `commands/fit.rs`, `commands/run.rs` 调用
//! - 使用 `fitting::EosFit`

use crate::error::{EosError, Result};
use crate::fitting::EosFit;
use crate::models::{CellSetting, EnergyPoint, Prototype};

use plotters::coord::Shift;
use plotters::prelude::*;
use std::path::Path;

/// 拟合曲线采样数
const CURVE_SAMPLES: usize = 200;

/// 横轴量
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XAxis {
    /// 每原子体积 (Å³)
    Volume,
    /// 晶格常数 (Å)
    LatticeParameter,
}

/// 图表参数
#[derive(Debug, Clone)]
pub struct PlotSpec<'a> {
    pub title: &'a str,
    pub x_axis: XAxis,
    pub prototype: Prototype,
    pub cell: CellSetting,
    pub width: u32,
    pub height: u32,
}

fn plot_err<E: std::fmt::Debug>(e: E) -> EosError {
    EosError::PlotError(format!("{:?}", e))
}

/// 绘制能量曲线
pub fn plot_eos(
    points: &[EnergyPoint],
    fit: Option<&EosFit>,
    output_path: &Path,
    spec: &PlotSpec,
) -> Result<()> {
    if points.is_empty() {
        return Err(EosError::PlotError("No data to plot".to_string()));
    }

    let use_svg = output_path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("svg"));

    if use_svg {
        let root = SVGBackend::new(output_path, (spec.width, spec.height)).into_drawing_area();
        draw_chart(&root, points, fit, spec)?;
        root.present().map_err(plot_err)?;
    } else {
        let root = BitMapBackend::new(output_path, (spec.width, spec.height)).into_drawing_area();
        draw_chart(&root, points, fit, spec)?;
        root.present().map_err(plot_err)?;
    }
    Ok(())
}

/// 把每原子体积映射到横轴
fn x_of(volume: f64, spec: &PlotSpec) -> f64 {
    match spec.x_axis {
        XAxis::Volume => volume,
        XAxis::LatticeParameter => spec
            .prototype
            .lattice_parameter_from_volume_per_atom(volume, spec.cell),
    }
}

/// 拟合曲线的体积区间：采样范围，延伸到 V0
fn curve_range(points: &[EnergyPoint], fit: &EosFit) -> (f64, f64) {
    points
        .iter()
        .map(EnergyPoint::volume_per_atom)
        .chain(std::iter::once(fit.params.v0))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        })
}

/// (x_lo, x_hi, y_lo, y_hi)
fn bounds<'a>(xy: impl Iterator<Item = &'a (f64, f64)>) -> (f64, f64, f64, f64) {
    xy.fold(
        (
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::INFINITY,
            f64::NEG_INFINITY,
        ),
        |(x_lo, x_hi, y_lo, y_hi), &(x, y)| (x_lo.min(x), x_hi.max(x), y_lo.min(y), y_hi.max(y)),
    )
}

fn draw_chart<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    points: &[EnergyPoint],
    fit: Option<&EosFit>,
    spec: &PlotSpec,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE).map_err(plot_err)?;

    let samples: Vec<(f64, f64)> = points
        .iter()
        .map(|p| (x_of(p.volume_per_atom(), spec), p.energy_per_atom()))
        .collect();

    let curve: Vec<(f64, f64)> = match fit {
        Some(fit) => {
            let (v_lo, v_hi) = curve_range(points, fit);
            (0..=CURVE_SAMPLES)
                .map(|i| {
                    let v = v_lo + (v_hi - v_lo) * i as f64 / CURVE_SAMPLES as f64;
                    (x_of(v, spec), fit.energy_at(v))
                })
                .collect()
        }
        None => Vec::new(),
    };
    let marker = fit.map(|fit| (x_of(fit.params.v0, spec), fit.params.e0));

    let (x_lo, x_hi, y_lo, y_hi) = bounds(samples.iter().chain(&curve).chain(&marker));
    let x_margin = ((x_hi - x_lo) * 0.05).max(1e-3);
    let y_margin = ((y_hi - y_lo) * 0.1).max(1e-4);

    let x_desc = match spec.x_axis {
        XAxis::Volume => "Volume per atom (Å³)",
        XAxis::LatticeParameter => "Lattice parameter (Å)",
    };

    let mut chart = ChartBuilder::on(root)
        .caption(spec.title, ("sans-serif", 24).into_font())
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .build_cartesian_2d(
            (x_lo - x_margin)..(x_hi + x_margin),
            (y_lo - y_margin)..(y_hi + y_margin),
        )
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_desc(x_desc)
        .y_desc("Energy per atom (eV)")
        .y_label_formatter(&|y| format!("{:.3}", y))
        .axis_desc_style(("sans-serif", 16))
        .draw()
        .map_err(plot_err)?;

    let line_color = RGBColor(0, 102, 204);

    if let Some(fit) = fit {
        chart
            .draw_series(LineSeries::new(curve.iter().copied(), line_color.stroke_width(2)))
            .map_err(plot_err)?
            .label(format!("{} fit", fit.model))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], line_color));

        chart
            .draw_series(marker.map(|v0| Cross::new(v0, 8, GREEN.stroke_width(2))))
            .map_err(plot_err)?
            .label("Equilibrium")
            .legend(|(x, y)| Cross::new((x + 10, y), 5, GREEN.stroke_width(2)));
    }

    chart
        .draw_series(
            samples
                .iter()
                .map(|(x, y)| Circle::new((*x, *y), 5, RED.filled())),
        )
        .map_err(plot_err)?
        .label("Calculated")
        .legend(|(x, y)| Circle::new((x + 10, y), 5, RED.filled()));

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(plot_err)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fitting::{EosModel, EosParameters};

    const PARAMS: EosParameters = EosParameters {
        e0: -5.4231,
        v0: 20.46,
        b0: 0.5526,
        b0_prime: 4.15,
    };

    fn spec(x_axis: XAxis) -> PlotSpec<'static> {
        PlotSpec {
            title: "Si (diamond, primitive)",
            x_axis,
            prototype: Prototype::Diamond,
            cell: CellSetting::Primitive,
            width: 400,
            height: 300,
        }
    }

    /// 每原子体积 `volumes` 处的两原子晶胞采样点
    fn points(volumes: &[f64]) -> Vec<EnergyPoint> {
        volumes
            .iter()
            .map(|&v| EnergyPoint {
                lattice_parameter: Prototype::Diamond
                    .lattice_parameter_from_volume_per_atom(v, CellSetting::Primitive),
                n_atoms: 2,
                cell_volume: 2.0 * v,
                total_energy: 2.0 * EosModel::BirchMurnaghan.energy(v, &PARAMS),
            })
            .collect()
    }

    fn fit_for(points: &[EnergyPoint]) -> EosFit {
        let v: Vec<f64> = points.iter().map(EnergyPoint::volume_per_atom).collect();
        EosFit {
            model: EosModel::BirchMurnaghan,
            params: PARAMS,
            rms: 0.0,
            iterations: 5,
            converged: true,
            volume_range: (v[0], v[v.len() - 1]),
        }
    }

    #[test]
    fn test_plot_empty_points_is_error() {
        let err = plot_eos(&[], None, Path::new("unused.svg"), &spec(XAxis::Volume)).unwrap_err();
        assert!(matches!(err, EosError::PlotError(_)));
    }

    #[test]
    fn test_plot_writes_svg_for_both_axes() {
        let dir = tempfile::tempdir().unwrap();
        let points = points(&[18.5, 19.2, 19.9, 20.6, 21.3, 22.0]);
        let fit = fit_for(&points);

        for (x_axis, name) in [
            (XAxis::Volume, "eos_volume.svg"),
            (XAxis::LatticeParameter, "eos_lattice.svg"),
        ] {
            let path = dir.path().join(name);
            plot_eos(&points, Some(&fit), &path, &spec(x_axis)).unwrap();
            let text = std::fs::read_to_string(&path).unwrap();
            assert!(text.contains("<svg"), "{}", name);
            assert!(text.len() > 1000, "{}", name);
        }
    }

    #[test]
    fn test_equilibrium_outside_samples_is_in_view() {
        // 只采样压缩侧，V0 在采样范围之外
        let points = points(&[17.0, 17.4, 17.8, 18.2, 18.6]);
        let fit = fit_for(&points);

        let (v_lo, v_hi) = curve_range(&points, &fit);
        assert!((v_lo - 17.0).abs() < 1e-12);
        assert!((v_hi - PARAMS.v0).abs() < 1e-12);

        let marker = (x_of(PARAMS.v0, &spec(XAxis::LatticeParameter)), PARAMS.e0);
        let samples: Vec<(f64, f64)> = points
            .iter()
            .map(|p| (p.lattice_parameter, p.energy_per_atom()))
            .collect();
        let (x_lo, x_hi, y_lo, y_hi) = bounds(samples.iter().chain(std::iter::once(&marker)));
        assert!(x_lo <= marker.0 && marker.0 <= x_hi);
        assert!(y_lo <= marker.1 && marker.1 <= y_hi);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outside.svg");
        plot_eos(&points, Some(&fit), &path, &spec(XAxis::Volume)).unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }
}
