pub mod extract;
pub mod lint;
