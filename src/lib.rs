// WhaleAI site - library for hydrating the landing page and driving the
// waitlist and donation flows
pub mod api;
pub mod binder;
pub mod clipboard;
pub mod config;
pub mod counts;
pub mod dom;
pub mod donate;
pub mod logger;
pub mod page;
pub mod placeholder;
pub mod resolver;
pub mod tasks;
pub mod waitlist;
