pub mod errors;
pub mod params;
pub mod problem;
pub mod table;

pub use errors::*;
pub use params::*;
pub use problem::*;
pub use table::*;
