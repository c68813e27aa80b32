//! Background masking primitives: flood-fill to transparency, floating
//! component removal, and opaque-bounds cropping.

pub mod bitset;
pub mod bounds;
pub mod components;
pub mod flood;

pub use bitset::Bitset;
pub use bounds::{crop, find_opaque_bounds};
pub use components::{remove_floating, ComponentStats};
pub use flood::{flood_fill, flood_fill_with_target};
