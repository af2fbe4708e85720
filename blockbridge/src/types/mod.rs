mod cast;
mod descriptor;
mod env;
mod expr;
mod scope;
mod table;

pub use cast::{CastRequest, CastVerdict};
pub use descriptor::*;
pub use env::*;
pub use scope::Scope;
pub use table::TypeTable;
