pub mod bootstrap;
pub mod clean;
pub mod completion;
pub mod plan;
pub mod start;
