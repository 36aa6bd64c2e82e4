mod admin;
mod root;

pub use admin::*;
pub use root::*;
