//! Interactive HTML maps.

pub mod interactive;
pub mod style;

pub use interactive::{InteractiveMap, MapConfig};
pub use style::{BaseTiles, ColorMap, ColorScale, Ramp};
