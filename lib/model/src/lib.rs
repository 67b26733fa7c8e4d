mod field;
mod named_map;
mod parameter;

pub use field::*;
pub use named_map::*;
pub use parameter::*;
