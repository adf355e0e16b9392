pub mod app;
pub mod forms;
pub mod messages;
pub mod ratelimit;
pub mod webhook;
