pub mod build;
pub mod catalog;
pub mod collect;
pub mod execute;
