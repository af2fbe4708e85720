mod contexts;
mod diagnostics;
mod errors;
mod traits;

pub use contexts::*;
pub use diagnostics::*;
pub use errors::*;
pub use traits::*;
