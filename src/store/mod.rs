pub mod memory;
pub mod postgres;
pub mod sql;
pub mod sync;
pub mod traits;
pub mod typed;

pub use memory::*;
pub use postgres::*;
pub use sync::*;
pub use traits::*;
pub use typed::Relation;
