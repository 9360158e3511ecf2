pub mod classes;
pub mod conflicts;
pub mod core;
pub mod results;
pub mod sheets;
pub mod students;
