//! Identity and raw-record model.

mod entity;
mod value;

pub use entity::{Entity, EntityId, IdError};
pub use value::SortValue;
