//! 内置术数理论

pub mod bazi;
pub mod cezi;
pub mod daliuren;
pub mod liuyao;
pub mod meihua;
pub mod qimen;
pub mod xiaoliu;
pub mod ziwei;

pub use bazi::BaZiTheory;
pub use cezi::CeZiTheory;
pub use daliuren::DaLiuRenTheory;
pub use liuyao::LiuYaoTheory;
pub use meihua::MeiHuaTheory;
pub use qimen::QiMenTheory;
pub use xiaoliu::XiaoLiuRenTheory;
pub use ziwei::ZiWeiTheory;
