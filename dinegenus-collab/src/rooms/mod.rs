mod code;
mod data;
mod participants;
mod reconcile;
mod repository;

pub use code::*;
pub use data::*;
pub use participants::*;
pub use reconcile::*;
pub use repository::*;
