//! Model traits, mutation tracking and relationship slots

pub mod instance;
pub mod related;
pub mod tracker;
pub mod traits;

pub use instance::Instance;
pub use related::{Related, RelatedSlot};
pub use tracker::ChangeTracker;
pub use traits::{Entity, Model, ModelEnum};
