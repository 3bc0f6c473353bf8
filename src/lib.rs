//! Transfers GUI tests between Android apps with similar features.
//!
//! Source test events are matched against widgets of the target app by
//! textual similarity, and each match is validated by actually reaching it
//! on a live device through a navigation graph that grows as the app is
//! explored.

pub mod cli;
pub mod driver;
pub mod error;
pub mod event;
pub mod explorer;
pub mod graph;
pub mod rank;
pub mod report;
pub mod text;
pub mod trace;
pub mod widget;
