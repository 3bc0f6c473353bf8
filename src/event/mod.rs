pub mod event_model;
