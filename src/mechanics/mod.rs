pub mod catenary;
pub mod control;
pub mod spectrum;
pub mod uplift;

pub use catenary::*;
pub use control::*;
pub use spectrum::*;
pub use uplift::*;
