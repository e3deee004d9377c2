pub mod check;
pub mod config;
pub mod run;
pub mod sync;
