// Application layer: one function per CLI command, wiring config to core and adapters.

pub mod commands;
