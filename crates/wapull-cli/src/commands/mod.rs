pub mod harvest;
pub mod probe;
pub mod summarize;
