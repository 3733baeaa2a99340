//! Client-side crafthammer scripts
//!
//! Everything here talks to the game only through the bindings in
//! `crafthammer-host`.

pub mod ability;

pub use ability::{ABILITY_RADIUS, on_ability_cast};
