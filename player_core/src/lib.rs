// player_core: Rust/WASM engine for a remote-configured slide player.
// Playback state, viewer lifecycle and resource ownership live here; the host page renders
// viewers, forwards DOM events and carries out the command stream.

mod camera_viewer;
mod controller;
mod error;
mod fetch;
mod input;
mod model_viewer;
mod player;
mod playlist;
mod resources;
mod telemetry;
mod timer;
mod types;
mod video_viewer;
mod viewer;

use wasm_bindgen::prelude::*;

pub use camera_viewer::{CameraEffectViewer, CameraPhase};
pub use controller::{
    AdvanceReason, FiredTimer, PlaybackController, PlaybackState, PlayerStatus, SlidePhase,
    Transition,
};
pub use error::{PlayerError, PlaylistFetchError};
pub use fetch::{fetch_text, FetchResponse};
pub use input::NavigationKey;
pub use model_viewer::ModelViewer;
pub use player::{HostCommand, Player, PlayerView};
pub use playlist::{
    parse_playlist, playlist_from_response, AdvancePolicy, CameraEffectSlide, CameraParams,
    Hotspot, ModelSlide, Playlist, ProductInfo, Slide, SlideKind, VideoSlide,
};
pub use resources::{LeaseId, ResourceArbiter, ResourceGuard, ResourceKind, ResourceRelease};
pub use telemetry::{TelemetryAction, TelemetryEvent, TelemetryQueue};
pub use types::*;
pub use video_viewer::VideoViewer;
pub use viewer::{
    mount, CameraFailure, HostEffect, InteractionLatch, TimerRequest, Viewer, ViewerCallbacks,
    ViewerInput, ViewerLifecycleEvent, ViewerTimer,
};

/// Install the panic hook. Tracing is installed by the first `SlidePlayer`, at its configured level.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Route `tracing` events to the browser console. Only the first call takes effect.
#[cfg(target_arch = "wasm32")]
fn install_tracing(max_level: tracing::Level) {
    static INSTALL: std::sync::Once = std::sync::Once::new();
    INSTALL.call_once(|| {
        tracing_wasm::set_as_global_default_with_config(
            tracing_wasm::WASMLayerConfigBuilder::new()
                .set_max_level(max_level)
                .build(),
        );
    });
}

/// GET the playlist document. Resolves to JSON `{ status, body }` for `SlidePlayer.finish_load`.
#[wasm_bindgen]
pub async fn fetch_playlist(url: String) -> Result<String, JsValue> {
    let response = fetch_text(&url)
        .await
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    serde_json::to_string(&response)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// Player interface exposed to JavaScript.
/// Structured data crosses the boundary as JSON; the host drains commands after each call.
#[wasm_bindgen]
pub struct SlidePlayer {
    player: Player,
}

#[wasm_bindgen]
impl SlidePlayer {
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str) -> Result<SlidePlayer, JsValue> {
        let config: PlayerConfig = serde_json::from_str(config_json)
            .map_err(|e| JsValue::from_str(&PlayerError::InvalidConfig(e.to_string()).to_string()))?;
        #[cfg(target_arch = "wasm32")]
        install_tracing(config.max_level());

        Ok(SlidePlayer {
            player: Player::new(config),
        })
    }

    /// Start a playlist load. Pass the returned ticket back with the response.
    pub fn begin_load(&mut self) -> u32 {
        self.player.begin_load().generation()
    }

    pub fn finish_load(
        &mut self,
        ticket: u32,
        status: u16,
        body: &str,
        now_us: u64,
    ) -> Result<(), JsValue> {
        self.player
            .finish_load(FetchTicket::new(ticket), status, body, Timestamp::from_micros(now_us))
            .map_err(to_js)
    }

    pub fn fail_load(&mut self, ticket: u32, message: &str, now_us: u64) -> Result<(), JsValue> {
        self.player
            .fail_load(FetchTicket::new(ticket), message, Timestamp::from_micros(now_us))
            .map_err(to_js)
    }

    /// Forward a viewer notification. Returns false when the token is stale.
    pub fn viewer_input(
        &mut self,
        token_json: &str,
        input_json: &str,
        now_us: u64,
    ) -> Result<bool, JsValue> {
        let token: SlideToken = serde_json::from_str(token_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid token: {}", e)))?;
        let input: ViewerInput = serde_json::from_str(input_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid viewer input: {}", e)))?;
        Ok(self
            .player
            .viewer_input(token, input, Timestamp::from_micros(now_us)))
    }

    pub fn next(&mut self, now_us: u64) -> Result<(), JsValue> {
        self.player.next(Timestamp::from_micros(now_us)).map_err(to_js)
    }

    pub fn previous(&mut self, now_us: u64) -> Result<(), JsValue> {
        self.player
            .previous(Timestamp::from_micros(now_us))
            .map_err(to_js)
    }

    pub fn select(&mut self, index: usize, now_us: u64) -> Result<(), JsValue> {
        self.player
            .select(index, Timestamp::from_micros(now_us))
            .map_err(to_js)
    }

    /// `key` is a `KeyboardEvent.key` value.
    pub fn key_pressed(&mut self, key: &str, now_us: u64) -> Result<(), JsValue> {
        self.player
            .key_pressed(key, Timestamp::from_micros(now_us))
            .map_err(to_js)
    }

    pub fn tick(&mut self, now_us: u64) {
        self.player.tick(Timestamp::from_micros(now_us));
    }

    /// When the host should call `tick` next, in microseconds.
    pub fn next_wake_at(&self) -> Option<u64> {
        self.player.next_wake_at().map(|t| t.as_micros())
    }

    pub fn set_visible(&mut self, visible: bool, now_us: u64) {
        self.player
            .set_visible(visible, Timestamp::from_micros(now_us));
    }

    pub fn unmount(&mut self) {
        self.player.unmount();
    }

    /// Pending host commands as a JSON array, in execution order.
    pub fn drain_commands(&mut self) -> Result<String, JsValue> {
        serde_json::to_string(&self.player.drain_commands()).map_err(|e| to_js(e.into()))
    }

    pub fn drain_telemetry(&mut self) -> Result<String, JsValue> {
        serde_json::to_string(&self.player.drain_telemetry()).map_err(|e| to_js(e.into()))
    }

    pub fn view(&self, now_us: u64) -> Result<String, JsValue> {
        serde_json::to_string(&self.player.view(Timestamp::from_micros(now_us)))
            .map_err(|e| to_js(e.into()))
    }
}

fn to_js(err: PlayerError) -> JsValue {
    JsValue::from_str(&err.to_string())
}
