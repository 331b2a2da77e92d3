pub mod generate;
pub mod rule;
pub mod task;
