pub mod style;
pub mod table;
