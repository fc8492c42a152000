//! WebAssembly bindings for the XOver game engine.
//!
//! This module exposes the local game and session-code generation to
//! JavaScript through wasm-bindgen.

#[cfg(feature = "wasm")]
use wasm_bindgen::prelude::*;

#[cfg(feature = "wasm")]
use crate::code::SessionCode;
#[cfg(feature = "wasm")]
use crate::controller::GameController;

/// Initialize panic hook for better error messages in browser console
#[cfg(feature = "wasm")]
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Draw a fresh 6-character session code
#[cfg(feature = "wasm")]
#[wasm_bindgen(js_name = generateSessionCode)]
pub fn generate_session_code() -> String {
    SessionCode::generate(&mut rand::thread_rng()).to_string()
}

/// WASM-exposed hot-seat game
#[cfg(feature = "wasm")]
#[wasm_bindgen]
pub struct WasmGame {
    controller: GameController,
}

#[cfg(feature = "wasm")]
#[wasm_bindgen]
impl WasmGame {
    #[wasm_bindgen(constructor)]
    pub fn new() -> WasmGame {
        WasmGame {
            controller: GameController::local(),
        }
    }

    /// Get the current game state as JSON
    #[wasm_bindgen(js_name = getState)]
    pub fn get_state(&self) -> String {
        serde_json::to_string(self.controller.state()).unwrap_or_else(|_| "{}".to_string())
    }

    #[wasm_bindgen(js_name = isLegalMove)]
    pub fn is_legal_move(&self, sub_index: usize, cell_index: usize) -> bool {
        self.controller.state().is_legal_move(sub_index, cell_index)
    }

    /// Play the current mark; `now` is `Date.now()`
    #[wasm_bindgen(js_name = applyMove)]
    pub fn apply_move(
        &mut self,
        sub_index: usize,
        cell_index: usize,
        now: f64,
    ) -> Result<(), JsValue> {
        self.controller
            .attempt_local_move(sub_index, cell_index, now as u64)
            .map(|_| ())
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    pub fn undo(&mut self, now: f64) -> Result<(), JsValue> {
        self.controller
            .undo(now as u64)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    #[wasm_bindgen(js_name = newGame)]
    pub fn new_game(&mut self, now: f64) -> Result<(), JsValue> {
        self.controller
            .new_game(now as u64)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    #[wasm_bindgen(js_name = availableSubBoards)]
    pub fn available_sub_boards(&self) -> Vec<usize> {
        self.controller.state().available_sub_boards()
    }

    #[wasm_bindgen(js_name = canPlayIn)]
    pub fn can_play_in(&self, sub_index: usize) -> bool {
        self.controller.state().can_play_in(sub_index)
    }

    /// `"X"`, `"O"`, `"draw"` or `null` while in progress
    #[wasm_bindgen(js_name = getWinner)]
    pub fn get_winner(&self) -> Option<String> {
        let state = self.controller.state();
        match state.winner() {
            Some(mark) => Some(mark.to_string()),
            None if state.is_finished() => Some("draw".to_string()),
            None => None,
        }
    }

    #[wasm_bindgen(js_name = getForcedSubBoard)]
    pub fn get_forced_sub_board(&self) -> Option<usize> {
        self.controller.state().forced_sub_index
    }

    /// Current notice text, if one is showing at `now`
    #[wasm_bindgen(js_name = getNotice)]
    pub fn get_notice(&mut self, now: f64) -> Option<String> {
        self.controller.notice(now as u64).map(|n| n.message.clone())
    }
}

#[cfg(feature = "wasm")]
impl Default for WasmGame {
    fn default() -> Self {
        Self::new()
    }
}
