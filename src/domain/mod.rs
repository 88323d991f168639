//! Core domain types and logic.

pub mod panel;
pub mod position;
pub mod strategy;
pub mod registry;
pub mod simulator;
pub mod evaluator;
pub mod catalog;
pub mod config_validation;
pub mod error;
