pub mod explorer;
pub mod reachability;
pub mod runner;
pub mod session;
