//! everplay - persistent background-audio playback across the
//! independently-loaded pages of a static multi-page site.
//!
//! Each page loads this module fresh; continuity is faked by persisting
//! the playback position and mute preference in origin-scoped
//! localStorage, restoring them on the next load, and working around
//! browser autoplay policy with a tap-to-unlock overlay when needed.
//!
//! The decision logic lives in [`state::Continuity`], which is plain Rust
//! and tested natively; the browser wiring around it is only compiled for
//! wasm targets.

pub mod fade;
pub mod session;
pub mod settings;
pub mod state;

#[cfg(target_arch = "wasm32")]
pub mod controller;
#[cfg(target_arch = "wasm32")]
mod dom;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::wasm_bindgen;

/// Entry point, invoked by the browser when the wasm module loads.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn start() {
    controller::boot_when_ready();
}
