mod cart;
mod tickets;

pub use cart::*;
pub use tickets::*;
