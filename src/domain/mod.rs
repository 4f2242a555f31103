mod account;
mod money;
mod record;

pub use account::*;
pub use money::*;
pub use record::*;
