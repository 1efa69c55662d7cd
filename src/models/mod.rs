pub mod card;
pub mod link;

pub use card::*;
pub use link::*;
