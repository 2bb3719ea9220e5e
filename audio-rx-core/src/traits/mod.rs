pub mod capture_provider;
pub mod event_sink;
