pub mod dispatcher;
pub mod listeners;
