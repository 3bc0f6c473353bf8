pub mod clickability;
pub mod hierarchy;
pub mod static_seed;
pub mod widget_db;
pub mod widget_model;
