//! Core domain types for the adaptive risk controller.

pub mod bot;
pub mod risk;
pub mod trade;

pub use bot::*;
pub use risk::*;
pub use trade::*;
