//! # 状态方程拟合
//!
//! 对 (V/atom, E/atom) 数据做非线性最小二乘拟合。
//!
//! ## 流程
//! 1. 二次多项式拟合给出初值 (E0, V0, B0, B0' = 4)，或使用用户初值
//! 2. Levenberg-Marquardt 精修四个参数
//! 3. 检查结果的物理合理性
//!
//! ## 依赖关系
//! - 被 `commands/fit.rs`, `commands/run.rs` 使用
//! - 子模块: models, levenberg

pub mod levenberg;
pub mod models;

pub use models::{EosModel, EosParameters, EV_PER_A3_TO_GPA};

use crate::error::{EosError, Result};
use crate::models::{CellSetting, EnergyPoint, Prototype};
use levenberg::{LmOptions, LmReport};

use nalgebra::{DMatrix, DVector};
use serde::Serialize;

/// 参数个数
pub const MIN_POINTS: usize = 4;

/// 拟合结果
#[derive(Debug, Clone)]
pub struct EosFit {
    pub model: EosModel,
    pub params: EosParameters,
    /// 均方根残差 (eV/atom)
    pub rms: f64,
    pub iterations: usize,
    pub converged: bool,
    /// 采样体积范围 (Å³/atom)
    pub volume_range: (f64, f64),
}

impl EosFit {
    /// 拟合曲线上的能量
    pub fn energy_at(&self, v: f64) -> f64 {
        self.model.energy(v, &self.params)
    }

    /// 拟合曲线上的压强 (eV/Å³)
    pub fn pressure_at(&self, v: f64) -> f64 {
        self.model.pressure(v, &self.params)
    }

    /// V0 是否落在采样范围内
    pub fn v0_in_range(&self) -> bool {
        let (lo, hi) = self.volume_range;
        (lo..=hi).contains(&self.params.v0)
    }

    /// 平衡晶格常数 (Å)
    pub fn lattice_parameter(&self, prototype: Prototype, setting: CellSetting) -> f64 {
        prototype.lattice_parameter_from_volume_per_atom(self.params.v0, setting)
    }

    pub fn summary(&self, prototype: Prototype, setting: CellSetting) -> FitSummary {
        FitSummary {
            model: self.model,
            e0_ev: self.params.e0,
            v0_a3: self.params.v0,
            a0_angstrom: self.lattice_parameter(prototype, setting),
            b0_ev_per_a3: self.params.b0,
            b0_gpa: self.params.b0_gpa(),
            b0_prime: self.params.b0_prime,
            rms_ev: self.rms,
            iterations: self.iterations,
            converged: self.converged,
            prototype,
            cell: setting,
            cohesive_energy_ev: None,
            atom_energy_ev: None,
        }
    }
}

/// 写入 TOML 的拟合摘要
#[derive(Debug, Clone, Serialize)]
pub struct FitSummary {
    pub model: EosModel,
    pub prototype: Prototype,
    pub cell: CellSetting,
    pub e0_ev: f64,
    pub v0_a3: f64,
    pub a0_angstrom: f64,
    pub b0_ev_per_a3: f64,
    pub b0_gpa: f64,
    pub b0_prime: f64,
    pub rms_ev: f64,
    pub iterations: usize,
    pub converged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub atom_energy_ev: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cohesive_energy_ev: Option<f64>,
}

/// 拟合选项
#[derive(Debug, Clone, Copy, Default)]
pub struct FitOptions {
    pub model: EosModel,
    /// 用户给定初值；None 时由二次拟合推出
    pub guess: Option<EosParameters>,
    pub lm: LmOptions,
}

/// 对扫描点拟合状态方程（每原子归一化）
pub fn fit_points(points: &[EnergyPoint], options: &FitOptions) -> Result<EosFit> {
    let volumes: Vec<f64> = points.iter().map(EnergyPoint::volume_per_atom).collect();
    let energies: Vec<f64> = points.iter().map(EnergyPoint::energy_per_atom).collect();
    fit_eos(&volumes, &energies, options)
}

/// 对 (V, E) 数据拟合状态方程
pub fn fit_eos(volumes: &[f64], energies: &[f64], options: &FitOptions) -> Result<EosFit> {
    if volumes.len() != energies.len() {
        return Err(EosError::FitError(format!(
            "{} volumes but {} energies",
            volumes.len(),
            energies.len()
        )));
    }
    if volumes
        .iter()
        .chain(energies)
        .any(|x| !x.is_finite())
        || volumes.iter().any(|v| *v <= 0.0)
    {
        return Err(EosError::FitError(
            "volumes must be positive and all values finite".to_string(),
        ));
    }

    let mut distinct = volumes.to_vec();
    distinct.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    distinct.dedup_by(|a, b| (*a - *b).abs() <= 1e-9 * b.abs());
    if distinct.len() < MIN_POINTS {
        return Err(EosError::FitError(format!(
            "need at least {} distinct volumes, got {}",
            MIN_POINTS,
            distinct.len()
        )));
    }

    let guess = match options.guess {
        Some(g) => g,
        None => quadratic_guess(volumes, energies)?,
    };

    let model = options.model;
    let residuals = |p: &DVector<f64>| {
        let params = EosParameters::from_slice(p.as_slice());
        DVector::from_iterator(
            volumes.len(),
            volumes
                .iter()
                .zip(energies)
                .map(|(v, e)| model.energy(*v, &params) - e),
        )
    };

    let start = DVector::from_column_slice(&guess.to_array());
    if !residuals(&start).iter().all(|r| r.is_finite()) {
        return Err(EosError::FitError(format!(
            "initial guess gives non-finite {} energies: {:?}",
            model, guess
        )));
    }

    let LmReport {
        params,
        cost,
        iterations,
        converged,
    } = levenberg::minimize(residuals, start, &options.lm);
    let params = EosParameters::from_slice(params.as_slice());

    if !params.to_array().iter().all(|x| x.is_finite()) || params.v0 <= 0.0 || params.b0 <= 0.0
    {
        return Err(EosError::FitError(format!(
            "unphysical parameters: V0 = {}, B0 = {}",
            params.v0, params.b0
        )));
    }

    let rms = (2.0 * cost / volumes.len() as f64).sqrt();
    if !rms.is_finite() {
        return Err(EosError::FitError(format!(
            "{} fit ended with a non-finite residual",
            model
        )));
    }

    Ok(EosFit {
        model,
        params,
        rms,
        iterations,
        converged,
        volume_range: (distinct[0], distinct[distinct.len() - 1]),
    })
}

/// 由 E = c0 + c1 V + c2 V² 推出初值
pub fn quadratic_guess(volumes: &[f64], energies: &[f64]) -> Result<EosParameters> {
    let n = volumes.len();
    let design = DMatrix::from_fn(n, 3, |i, j| volumes[i].powi(j as i32));
    let rhs = DVector::from_column_slice(energies);

    let coeffs = design
        .svd(true, true)
        .solve(&rhs, 1e-14)
        .map_err(|e| EosError::FitError(format!("quadratic pre-fit failed: {}", e)))?;
    let (c0, c1, c2) = (coeffs[0], coeffs[1], coeffs[2]);

    if c2 <= 0.0 {
        return Err(EosError::FitError(
            "no minimum: energy-volume data is not convex".to_string(),
        ));
    }

    let v0 = -c1 / (2.0 * c2);
    if v0 <= 0.0 {
        return Err(EosError::FitError(format!(
            "quadratic pre-fit gives non-positive V0 = {}",
            v0
        )));
    }

    Ok(EosParameters {
        e0: c0 + c1 * v0 + c2 * v0 * v0,
        v0,
        b0: 2.0 * c2 * v0,
        b0_prime: 4.0,
    })
}

/// 解析 "E0,V0,B0,B0'" 形式的初值
pub fn parse_guess(expr: &str) -> Result<EosParameters> {
    let values: Vec<f64> = expr
        .split(',')
        .map(|s| s.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| EosError::InvalidArgument(format!("Invalid initial guess '{}'", expr)))?;

    if values.len() != 4 {
        return Err(EosError::InvalidArgument(format!(
            "Initial guess needs 4 values E0,V0,B0,B0' (got {})",
            values.len()
        )));
    }
    Ok(EosParameters::from_slice(&values))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRUE_PARAMS: EosParameters = EosParameters {
        e0: -5.4231,
        v0: 20.46,
        b0: 0.5526,
        b0_prime: 4.15,
    };

    fn synthetic(model: EosModel) -> (Vec<f64>, Vec<f64>) {
        let volumes: Vec<f64> = (0..9)
            .map(|i| Prototype::Diamond.volume_per_atom(5.23 + 0.05 * i as f64, CellSetting::Primitive))
            .collect();
        let energies = volumes
            .iter()
            .map(|v| model.energy(*v, &TRUE_PARAMS))
            .collect();
        (volumes, energies)
    }

    #[test]
    fn test_fit_recovers_parameters_for_each_model() {
        for model in [EosModel::BirchMurnaghan, EosModel::Murnaghan, EosModel::Vinet] {
            let (v, e) = synthetic(model);
            let fit = fit_eos(
                &v,
                &e,
                &FitOptions {
                    model,
                    ..FitOptions::default()
                },
            )
            .unwrap();

            let p = fit.params;
            assert!((p.e0 - TRUE_PARAMS.e0).abs() < 1e-8, "{}", model);
            assert!((p.v0 - TRUE_PARAMS.v0).abs() < 1e-6, "{}", model);
            assert!((p.b0 - TRUE_PARAMS.b0).abs() < 1e-6, "{}", model);
            assert!((p.b0_prime - TRUE_PARAMS.b0_prime).abs() < 1e-4, "{}", model);
            assert!(fit.rms < 1e-9);
            assert!(fit.v0_in_range());
        }
    }

    #[test]
    fn test_lattice_parameter_of_fit() {
        let (v, e) = synthetic(EosModel::BirchMurnaghan);
        let fit = fit_eos(&v, &e, &FitOptions::default()).unwrap();
        let a0 = fit.lattice_parameter(Prototype::Diamond, CellSetting::Primitive);
        assert!((a0 - (8.0 * TRUE_PARAMS.v0).cbrt()).abs() < 1e-6);
        assert!((fit.summary(Prototype::Diamond, CellSetting::Primitive).b0_gpa - 88.535).abs() < 0.01);
    }

    #[test]
    fn test_fit_with_noise_and_user_guess() {
        let (v, mut e) = synthetic(EosModel::BirchMurnaghan);
        let noise = [1e-4, -2e-4, 1.5e-4, -0.5e-4, 0.0, 1e-4, -1e-4, 2e-4, -1.5e-4];
        for (x, n) in e.iter_mut().zip(noise) {
            *x += n;
        }
        let fit = fit_eos(
            &v,
            &e,
            &FitOptions {
                guess: Some(EosParameters {
                    e0: -5.0,
                    v0: 21.0,
                    b0: 0.6,
                    b0_prime: 4.0,
                }),
                ..FitOptions::default()
            },
        )
        .unwrap();
        assert!((fit.params.v0 - TRUE_PARAMS.v0).abs() < 0.05);
        assert!((fit.params.b0_gpa() - TRUE_PARAMS.b0_gpa()).abs() < 5.0);
        assert!(fit.rms > 0.0 && fit.rms < 3e-4);
    }

    #[test]
    fn test_singular_guess_is_a_fit_error() {
        // B0' = 1 使 Murnaghan 与 Vinet 的能量表达式发散
        let guess = EosParameters {
            e0: -5.0,
            v0: 21.0,
            b0: 0.5,
            b0_prime: 1.0,
        };
        for model in [EosModel::Murnaghan, EosModel::Vinet] {
            let (v, e) = synthetic(model);
            let result = fit_eos(
                &v[..7],
                &e[..7],
                &FitOptions {
                    model,
                    guess: Some(guess),
                    ..FitOptions::default()
                },
            );
            assert!(matches!(result, Err(EosError::FitError(_))), "{}", model);
        }
    }

    #[test]
    fn test_fit_requires_four_volumes() {
        let (v, e) = synthetic(EosModel::BirchMurnaghan);
        let err = fit_eos(&v[..3], &e[..3], &FitOptions::default()).unwrap_err();
        assert!(matches!(err, EosError::FitError(_)));

        // 重复体积不算
        let v = vec![20.0, 20.0, 21.0, 21.0, 22.0];
        let e = vec![-5.0, -5.0, -5.1, -5.1, -5.0];
        assert!(fit_eos(&v, &e, &FitOptions::default()).is_err());
    }

    #[test]
    fn test_fit_rejects_concave_data() {
        let v = vec![18.0, 19.0, 20.0, 21.0, 22.0];
        let e: Vec<f64> = v.iter().map(|v| -(v - 20.0f64).powi(2)).collect();
        let err = fit_eos(&v, &e, &FitOptions::default()).unwrap_err();
        assert!(err.to_string().contains("no minimum"));
    }

    #[test]
    fn test_v0_outside_sampled_range_is_flagged() {
        // 只采样压缩侧
        let volumes: Vec<f64> = (0..6).map(|i| 17.0 + 0.4 * i as f64).collect();
        let energies: Vec<f64> = volumes
            .iter()
            .map(|v| EosModel::BirchMurnaghan.energy(*v, &TRUE_PARAMS))
            .collect();
        let fit = fit_eos(&volumes, &energies, &FitOptions::default()).unwrap();
        assert!(!fit.v0_in_range());
        assert!((fit.params.v0 - TRUE_PARAMS.v0).abs() < 1e-4);
    }

    #[test]
    fn test_quadratic_guess_on_parabola() {
        let v = vec![18.0, 19.0, 20.0, 21.0, 22.0];
        let e: Vec<f64> = v.iter().map(|v| 0.01 * (v - 20.0f64).powi(2) - 5.0).collect();
        let g = quadratic_guess(&v, &e).unwrap();
        assert!((g.v0 - 20.0).abs() < 1e-9);
        assert!((g.e0 - (-5.0)).abs() < 1e-9);
        assert!((g.b0 - 0.4).abs() < 1e-9);
        assert_eq!(g.b0_prime, 4.0);
    }

    #[test]
    fn test_parse_guess() {
        let g = parse_guess("-5.4, 20.4, 0.6, 4").unwrap();
        assert_eq!(g.b0_prime, 4.0);
        assert!(parse_guess("1,2,3").is_err());
        assert!(parse_guess("a,b,c,d").is_err());
    }
}
