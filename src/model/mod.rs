pub mod catalog;
pub mod common;
pub mod entities;
pub mod filter;
pub mod relationship;
pub mod schema;

pub use catalog::*;
pub use common::*;
pub use entities::*;
pub use filter::*;
pub use relationship::*;
pub use schema::*;
