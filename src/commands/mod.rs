pub mod extract;
pub mod list;
pub mod pack;
