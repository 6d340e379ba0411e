pub mod rendering;
pub mod styling;
