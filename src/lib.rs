//! Envelope Card core crate.
//!
//! A single-page greeting card: clicking the envelope opens a letter whose
//! "No" button runs away from the pointer and whose "Yes" button starts a
//! celebration (confetti, floating hearts, firework sparks, confirmation song).
//! The host page provides the markup, styles and assets; `start_card()` wires
//! the behaviour onto it.
//!
//! The state machines (`evasion`, `playback`) and particle batches
//! (`celebration`) are plain Rust and run under native `cargo test`; only
//! `page` touches the DOM.

use wasm_bindgen::prelude::*;

pub mod celebration;
pub mod config;
pub mod error;
pub mod evasion;
mod logging;
mod page;
pub mod playback;

pub use config::CardConfig;
pub use error::CardError;

// Optional small allocator for size (feature gated)
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn wasm_start() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

// -----------------------------------------------------------------------------
// JS entrypoints
// -----------------------------------------------------------------------------

/// Wire the card onto the current page with the stock configuration.
#[wasm_bindgen]
pub fn start_card() -> std::result::Result<(), JsValue> {
    page::mount(CardConfig::default()).map_err(JsValue::from)
}

/// Same as `start_card()`, overriding any subset of `CardConfig` from JSON.
#[cfg(feature = "serde_json")]
#[wasm_bindgen]
pub fn start_card_with_config(json: &str) -> std::result::Result<(), JsValue> {
    let cfg = CardConfig::from_json(json)?;
    page::mount(cfg).map_err(JsValue::from)
}

/// Detach all handlers, cancel timers, remove particles and stop audio.
#[wasm_bindgen]
pub fn stop_card() {
    page::unmount();
}

/// Milliseconds from `performance.now()`; wall-clock `Date.now()` when the page
/// has no performance timer, so cooldowns still elapse.
fn performance_now() -> f64 {
    web_sys::window()
        .and_then(|w| w.performance())
        .map(|p| p.now())
        .unwrap_or_else(js_sys::Date::now)
}
