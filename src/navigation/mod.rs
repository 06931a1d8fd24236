//! Navigation: path representation and path following
pub mod path_follower;

pub use self::path_follower::{Path, PurePursuit};
