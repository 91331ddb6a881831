//! Safe SQL builder: identifiers from the model only, values as parameters.

mod builder;
pub mod params;
pub use builder::*;
pub use params::*;
