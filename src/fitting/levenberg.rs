//! # Levenberg-Marquardt 非线性最小二乘
//!
//! 最小化 ½‖r(x)‖²。雅可比矩阵用中心差分，阻尼按 Marquardt 方式
//! 以 JᵀJ 的对角线缩放。
//!
//! ## 依赖关系
//! - 被 `fitting/mod.rs` 使用
//! - 使用 `nalgebra`

use nalgebra::{DMatrix, DVector};

/// 求解器参数
#[derive(Debug, Clone, Copy)]
pub struct LmOptions {
    /// 最大迭代次数
    pub max_iterations: usize,
    /// 相对步长收敛阈值
    pub xtol: f64,
    /// 梯度无穷范数收敛阈值
    pub gtol: f64,
    /// 初始阻尼
    pub initial_lambda: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        LmOptions {
            max_iterations: 200,
            xtol: 1e-12,
            gtol: 1e-14,
            initial_lambda: 1e-3,
        }
    }
}

/// 求解结果
#[derive(Debug, Clone)]
pub struct LmReport {
    pub params: DVector<f64>,
    /// ½‖r‖²
    pub cost: f64,
    pub iterations: usize,
    pub converged: bool,
}

const MAX_LAMBDA: f64 = 1e16;

/// 运行 Levenberg-Marquardt
///
/// `residuals` 对无效参数可以返回非有限值，这类试探步会被拒绝。
pub fn minimize<F>(residuals: F, x0: DVector<f64>, options: &LmOptions) -> LmReport
where
    F: Fn(&DVector<f64>) -> DVector<f64>,
{
    let mut x = x0;
    let mut r = residuals(&x);
    let mut cost = 0.5 * r.norm_squared();
    let mut lambda = options.initial_lambda;
    let mut converged = false;
    let mut iterations = 0;

    // 起点无法求值时不迭代，也不报告收敛
    if !cost.is_finite() {
        return LmReport {
            params: x,
            cost,
            iterations,
            converged,
        };
    }

    while iterations < options.max_iterations {
        iterations += 1;

        let jac = jacobian(&residuals, &x, &r);
        let gradient = jac.transpose() * &r;
        if gradient.amax() < options.gtol {
            converged = true;
            break;
        }

        let jtj = jac.transpose() * &jac;
        let mut accepted = false;

        while lambda < MAX_LAMBDA {
            let mut damped = jtj.clone();
            for i in 0..damped.nrows() {
                let d = jtj[(i, i)].max(1e-12);
                damped[(i, i)] += lambda * d;
            }

            let Some(cholesky) = damped.cholesky() else {
                lambda *= 10.0;
                continue;
            };
            let step = -cholesky.solve(&gradient);
            let trial = &x + &step;
            let trial_r = residuals(&trial);
            let trial_cost = 0.5 * trial_r.norm_squared();

            if trial_cost.is_finite() && trial_cost < cost {
                let small_step = step.norm() < options.xtol * (x.norm() + options.xtol);
                x = trial;
                r = trial_r;
                cost = trial_cost;
                lambda = (lambda / 10.0).max(1e-15);
                accepted = true;
                if small_step {
                    converged = true;
                }
                break;
            }
            lambda *= 10.0;
        }

        // 阻尼已到上限仍无法下降：已在局部极小处
        if !accepted {
            converged = true;
            break;
        }
        if converged {
            break;
        }
    }

    LmReport {
        params: x,
        cost,
        iterations,
        converged,
    }
}

/// 中心差分雅可比矩阵
fn jacobian<F>(residuals: &F, x: &DVector<f64>, r: &DVector<f64>) -> DMatrix<f64>
where
    F: Fn(&DVector<f64>) -> DVector<f64>,
{
    let mut jac = DMatrix::zeros(r.len(), x.len());
    let eps = f64::EPSILON.cbrt();

    for j in 0..x.len() {
        let h = eps * x[j].abs().max(1.0);
        let mut forward = x.clone();
        let mut backward = x.clone();
        forward[j] += h;
        backward[j] -= h;
        let column = (residuals(&forward) - residuals(&backward)) / (2.0 * h);
        jac.set_column(j, &column);
    }

    jac
}
