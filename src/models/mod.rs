//! # 数据模型模块
//!
//! 定义晶体结构、能量采样点和 DFT 输出的数据模型。
//!
//! ## 依赖关系
//! - 被 `parsers/`、`solver/` 和 `commands/` 使用
//! - 子模块: structure, calculation

pub mod calculation;
pub mod structure;

pub use calculation::{DftCodeType, EnergyPoint, SolverOutput};
pub use structure::{isolated_atom, Atom, CellSetting, Crystal, Lattice, Prototype};
