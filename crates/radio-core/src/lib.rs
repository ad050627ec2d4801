pub mod catalog;
pub mod config;
pub mod controller;
pub mod display;
pub mod engine;
pub mod input;
pub mod platform;
