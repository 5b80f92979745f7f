mod common;
mod health;
mod ip_state;
mod probe;
mod transition;

pub use common::*;
pub use health::*;
pub use ip_state::*;
pub use probe::*;
pub use transition::*;
