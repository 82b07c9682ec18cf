pub mod cli;
pub mod discovery;
pub mod handlers;
pub mod registry;
pub mod telemetry;
pub mod websocket;
