mod commands;
mod demo;

pub use commands::{Cli, Commands};
pub use demo::{demo_service, DemoService, HEARTBEAT};
