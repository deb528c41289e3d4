#![allow(dead_code)]
#![allow(unused_imports)]

pub mod block;
pub mod checker;
pub mod config;
pub mod connection;
pub mod db;
pub mod drag;
pub mod events;
pub mod library;
pub mod registry;
pub mod rehome;
pub mod state;
pub mod workspace;

#[cfg(test)]
mod tests;
