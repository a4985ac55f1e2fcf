pub mod config;
pub mod fetch;
pub mod limiter;
pub mod revalidate;
pub mod robots;
pub mod runner;
pub mod worker;
