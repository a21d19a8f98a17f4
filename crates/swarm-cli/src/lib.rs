//! SwarmOS CLI library: command implementations shared by the `swarm`
//! binary and its integration tests.

pub mod commands;
