mod access_group;
mod contact;

pub use access_group::*;
pub use contact::*;
