//! Macro implementations

pub mod entity;
pub mod model_enum;

pub use entity::derive_entity;
pub use model_enum::derive_model_enum;
