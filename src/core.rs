pub mod mapping;
pub mod point;
