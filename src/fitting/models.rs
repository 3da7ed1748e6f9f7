//! # 状态方程 E(V)
//!
//! 三个模型共用参数 (E0, V0, B0, B0')，单位 eV、Å³、eV/Å³。

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// eV/Å³ → GPa
pub const EV_PER_A3_TO_GPA: f64 = 160.21766208;

/// 状态方程参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EosParameters {
    /// 平衡能量 (eV/atom)
    pub e0: f64,
    /// 平衡体积 (Å³/atom)
    pub v0: f64,
    /// 体弹模量 (eV/Å³)
    pub b0: f64,
    /// 体弹模量对压强的导数
    pub b0_prime: f64,
}

impl EosParameters {
    pub fn to_array(self) -> [f64; 4] {
        [self.e0, self.v0, self.b0, self.b0_prime]
    }

    pub fn from_slice(p: &[f64]) -> Self {
        EosParameters {
            e0: p[0],
            v0: p[1],
            b0: p[2],
            b0_prime: p[3],
        }
    }

    /// 体弹模量 (GPa)
    pub fn b0_gpa(&self) -> f64 {
        self.b0 * EV_PER_A3_TO_GPA
    }
}

/// 状态方程模型
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EosModel {
    /// Third-order Birch-Murnaghan
    #[default]
    BirchMurnaghan,
    /// Murnaghan
    Murnaghan,
    /// Vinet (Rydberg-Vinet)
    Vinet,
}

impl std::fmt::Display for EosModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EosModel::BirchMurnaghan => write!(f, "birch-murnaghan"),
            EosModel::Murnaghan => write!(f, "murnaghan"),
            EosModel::Vinet => write!(f, "vinet"),
        }
    }
}

impl EosModel {
    /// E(V)
    pub fn energy(self, v: f64, p: &EosParameters) -> f64 {
        let EosParameters {
            e0,
            v0,
            b0,
            b0_prime: bp,
        } = *p;

        match self {
            EosModel::BirchMurnaghan => {
                let eta = (v0 / v).powf(2.0 / 3.0);
                let x = eta - 1.0;
                e0 + 9.0 * v0 * b0 / 16.0 * (x.powi(3) * bp + x.powi(2) * (6.0 - 4.0 * eta))
            }
            EosModel::Murnaghan => {
                e0 + b0 * v / bp * ((v0 / v).powf(bp) / (bp - 1.0) + 1.0) - b0 * v0 / (bp - 1.0)
            }
            EosModel::Vinet => {
                let x = (v / v0).cbrt();
                let xi = 1.5 * (bp - 1.0);
                e0 + 2.0 * b0 * v0 / (bp - 1.0).powi(2)
                    * (2.0 - (5.0 + 3.0 * bp * (x - 1.0) - 3.0 * x) * (-xi * (x - 1.0)).exp())
            }
        }
    }

    /// P(V) = -dE/dV (eV/Å³)
    pub fn pressure(self, v: f64, p: &EosParameters) -> f64 {
        let EosParameters {
            v0,
            b0,
            b0_prime: bp,
            ..
        } = *p;

        match self {
            EosModel::BirchMurnaghan => {
                let r = v0 / v;
                1.5 * b0
                    * (r.powf(7.0 / 3.0) - r.powf(5.0 / 3.0))
                    * (1.0 + 0.75 * (bp - 4.0) * (r.powf(2.0 / 3.0) - 1.0))
            }
            EosModel::Murnaghan => b0 / bp * ((v0 / v).powf(bp) - 1.0),
            EosModel::Vinet => {
                let x = (v / v0).cbrt();
                3.0 * b0 * (1.0 - x) / (x * x) * (1.5 * (bp - 1.0) * (1.0 - x)).exp()
            }
        }
    }
}
