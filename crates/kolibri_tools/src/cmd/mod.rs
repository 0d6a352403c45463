pub mod build;
pub mod compress;
pub mod worker;
