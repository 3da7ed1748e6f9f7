//! # 晶体结构数据模型
//!
//! 定义晶体结构表示，以及按晶格常数生成原型结构（金刚石、fcc、bcc、sc）
//! 和孤立原子盒子。
//!
//! ## 依赖关系
//! - 被 `parsers/`、`solver/` 和 `commands/` 使用
//! - 使用 `nalgebra` 做坐标变换

use crate::error::{EosError, Result};

use clap::ValueEnum;
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// 晶格参数表示
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lattice {
    /// 晶格向量矩阵 (3x3)，行向量表示 a, b, c
    pub matrix: [[f64; 3]; 3],
}

impl Lattice {
    /// 从晶格参数 (a, b, c, alpha, beta, gamma) 创建晶格
    /// 角度单位：度
    pub fn from_parameters(a: f64, b: f64, c: f64, alpha: f64, beta: f64, gamma: f64) -> Self {
        let (cos_alpha, cos_beta) = (alpha.to_radians().cos(), beta.to_radians().cos());
        let (sin_gamma, cos_gamma) = gamma.to_radians().sin_cos();

        let c1 = c * cos_beta;
        let c2 = c * (cos_alpha - cos_beta * cos_gamma) / sin_gamma;
        let c3 = (c * c - c1 * c1 - c2 * c2).sqrt();

        Lattice {
            matrix: [
                [a, 0.0, 0.0],
                [b * cos_gamma, b * sin_gamma, 0.0],
                [c1, c2, c3],
            ],
        }
    }

    /// 从晶格向量矩阵创建
    pub fn from_vectors(matrix: [[f64; 3]; 3]) -> Self {
        Lattice { matrix }
    }

    /// 获取晶格参数 (a, b, c, alpha, beta, gamma)
    pub fn parameters(&self) -> (f64, f64, f64, f64, f64, f64) {
        let [a_vec, b_vec, c_vec] = self.matrix.map(Vector3::from);
        let (a, b, c) = (a_vec.norm(), b_vec.norm(), c_vec.norm());

        let alpha = (b_vec.dot(&c_vec) / (b * c)).acos().to_degrees();
        let beta = (a_vec.dot(&c_vec) / (a * c)).acos().to_degrees();
        let gamma = (a_vec.dot(&b_vec) / (a * b)).acos().to_degrees();

        (a, b, c, alpha, beta, gamma)
    }

    /// 计算晶格体积（带符号，右手系为正）
    pub fn volume(&self) -> f64 {
        self.as_matrix().determinant()
    }

    /// 分数坐标转笛卡尔坐标
    pub fn frac_to_cart(&self, frac: [f64; 3]) -> [f64; 3] {
        let cart = self.as_matrix().transpose() * Vector3::from(frac);
        [cart.x, cart.y, cart.z]
    }

    /// 笛卡尔坐标转分数坐标；奇异晶格返回 None
    pub fn cart_to_frac(&self, cart: [f64; 3]) -> Option<[f64; 3]> {
        let inv = self.as_matrix().transpose().try_inverse()?;
        let frac = inv * Vector3::from(cart);
        Some([frac.x, frac.y, frac.z])
    }

    fn as_matrix(&self) -> Matrix3<f64> {
        let m = self.matrix;
        Matrix3::new(
            m[0][0], m[0][1], m[0][2], m[1][0], m[1][1], m[1][2], m[2][0], m[2][1], m[2][2],
        )
    }
}

/// 原子信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    /// 元素符号
    pub element: String,

    /// 分数坐标 [x, y, z]
    pub position: [f64; 3],
}

impl Atom {
    pub fn new(element: impl Into<String>, position: [f64; 3]) -> Self {
        Atom {
            element: element.into(),
            position,
        }
    }
}

/// 晶体结构
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Crystal {
    /// 结构名称
    pub name: String,

    /// 晶格
    pub lattice: Lattice,

    /// 原子列表
    pub atoms: Vec<Atom>,
}

impl Crystal {
    pub fn new(name: impl Into<String>, lattice: Lattice, atoms: Vec<Atom>) -> Self {
        Crystal {
            name: name.into(),
            lattice,
            atoms,
        }
    }

    /// 计算化学式
    pub fn formula(&self) -> String {
        use std::collections::BTreeMap;
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();

        for atom in &self.atoms {
            *counts.entry(atom.element.as_str()).or_insert(0) += 1;
        }

        counts
            .into_iter()
            .map(|(el, count)| {
                if count == 1 {
                    el.to_string()
                } else {
                    format!("{}{}", el, count)
                }
            })
            .collect()
    }

    /// 按出现顺序列出元素种类
    pub fn species(&self) -> Vec<String> {
        let mut order: Vec<String> = Vec::new();
        for atom in &self.atoms {
            if !order.contains(&atom.element) {
                order.push(atom.element.clone());
            }
        }
        order
    }

    /// 每原子体积 (Å³)
    pub fn volume_per_atom(&self) -> f64 {
        self.lattice.volume().abs() / self.atoms.len().max(1) as f64
    }
}

// ─────────────────────────────────────────────────────────────
// 原型结构
// ─────────────────────────────────────────────────────────────

/// 晶体原型
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Prototype {
    /// Diamond cubic (Si, Ge, C)
    #[default]
    Diamond,
    /// Face-centred cubic
    Fcc,
    /// Body-centred cubic
    Bcc,
    /// Simple cubic
    Sc,
}

/// 晶胞选取方式
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CellSetting {
    /// Smallest primitive cell
    #[default]
    Primitive,
    /// Conventional cubic cell
    Conventional,
}

impl std::fmt::Display for Prototype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Prototype::Diamond => write!(f, "diamond"),
            Prototype::Fcc => write!(f, "fcc"),
            Prototype::Bcc => write!(f, "bcc"),
            Prototype::Sc => write!(f, "sc"),
        }
    }
}

impl std::fmt::Display for CellSetting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellSetting::Primitive => write!(f, "primitive"),
            CellSetting::Conventional => write!(f, "conventional"),
        }
    }
}

const FCC_PRIMITIVE: [[f64; 3]; 3] = [[0.0, 0.5, 0.5], [0.5, 0.0, 0.5], [0.5, 0.5, 0.0]];
const BCC_PRIMITIVE: [[f64; 3]; 3] = [[-0.5, 0.5, 0.5], [0.5, -0.5, 0.5], [0.5, 0.5, -0.5]];
const FCC_BASIS: [[f64; 3]; 4] = [
    [0.0, 0.0, 0.0],
    [0.0, 0.5, 0.5],
    [0.5, 0.0, 0.5],
    [0.5, 0.5, 0.0],
];

impl Prototype {
    /// 晶胞中的原子数
    pub fn atoms_per_cell(self, setting: CellSetting) -> usize {
        self.fractional_sites(setting).len()
    }

    /// 晶胞体积与 a³ 之比
    pub fn volume_ratio(self, setting: CellSetting) -> f64 {
        match (self, setting) {
            (_, CellSetting::Conventional) | (Prototype::Sc, _) => 1.0,
            (Prototype::Diamond | Prototype::Fcc, CellSetting::Primitive) => 0.25,
            (Prototype::Bcc, CellSetting::Primitive) => 0.5,
        }
    }

    /// 给定晶格常数的每原子体积
    pub fn volume_per_atom(self, a: f64, setting: CellSetting) -> f64 {
        self.volume_ratio(setting) * a.powi(3) / self.atoms_per_cell(setting) as f64
    }

    /// 由每原子体积反推晶格常数
    pub fn lattice_parameter_from_volume_per_atom(self, v: f64, setting: CellSetting) -> f64 {
        (v * self.atoms_per_cell(setting) as f64 / self.volume_ratio(setting)).cbrt()
    }

    /// 以晶格常数 `a` (Å) 构建结构
    pub fn build(self, element: &str, a: f64, setting: CellSetting) -> Result<Crystal> {
        if !a.is_finite() || a <= 0.0 {
            return Err(EosError::InvalidArgument(format!(
                "lattice parameter must be positive, got {}",
                a
            )));
        }

        let unit = match (self, setting) {
            (Prototype::Diamond | Prototype::Fcc, CellSetting::Primitive) => FCC_PRIMITIVE,
            (Prototype::Bcc, CellSetting::Primitive) => BCC_PRIMITIVE,
            _ => [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        };
        let lattice = Lattice::from_vectors(unit.map(|row| row.map(|x| x * a)));

        let atoms = self
            .fractional_sites(setting)
            .into_iter()
            .map(|p| Atom::new(element, p))
            .collect();

        let name = format!("{}-{}-{:.4}", element, self, a);
        Ok(Crystal::new(name, lattice, atoms))
    }

    fn fractional_sites(self, setting: CellSetting) -> Vec<[f64; 3]> {
        match (self, setting) {
            (Prototype::Diamond, CellSetting::Primitive) => {
                vec![[0.0, 0.0, 0.0], [0.25, 0.25, 0.25]]
            }
            (Prototype::Diamond, CellSetting::Conventional) => FCC_BASIS
                .iter()
                .flat_map(|p| [*p, p.map(|x| x + 0.25)])
                .collect(),
            (Prototype::Fcc, CellSetting::Conventional) => FCC_BASIS.to_vec(),
            (Prototype::Bcc, CellSetting::Conventional) => {
                vec![[0.0, 0.0, 0.0], [0.5, 0.5, 0.5]]
            }
            (Prototype::Fcc | Prototype::Bcc | Prototype::Sc, _) => vec![[0.0, 0.0, 0.0]],
        }
    }
}

/// 孤立原子参考结构：盒子中心的单个原子
///
/// `distortion` 把 b、c 边分别拉长 (1+d)、(1+2d)，用于打破立方对称性，
/// 避免开壳层原子出现简并占据。
pub fn isolated_atom(element: &str, box_edge: f64, distortion: f64) -> Result<Crystal> {
    if !box_edge.is_finite() || box_edge <= 0.0 {
        return Err(EosError::InvalidArgument(format!(
            "box edge must be positive, got {}",
            box_edge
        )));
    }
    if !(0.0..0.5).contains(&distortion) {
        return Err(EosError::InvalidArgument(format!(
            "box distortion must be in [0, 0.5), got {}",
            distortion
        )));
    }

    let lattice = Lattice::from_vectors([
        [box_edge, 0.0, 0.0],
        [0.0, box_edge * (1.0 + distortion), 0.0],
        [0.0, 0.0, box_edge * (1.0 + 2.0 * distortion)],
    ]);
    let atoms = vec![Atom::new(element, [0.5, 0.5, 0.5])];

    Ok(Crystal::new(format!("{}-atom", element), lattice, atoms))
}
