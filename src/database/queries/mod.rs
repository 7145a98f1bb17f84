mod cart;
mod catalog;
mod content;
mod global_stats;
mod orders;
mod tickets;
mod topups;
mod types;
mod users;

pub use cart::*;
pub use catalog::*;
pub use content::*;
pub use global_stats::*;
pub use orders::*;
pub use tickets::*;
pub use topups::*;
pub use types::*;
pub use users::*;
