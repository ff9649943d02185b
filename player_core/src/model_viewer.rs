// 3D model viewer: idle rotation, hotspot annotations, AR handoff, ambient audio.
// Any open annotation, drag or AR session counts as one interaction toward the controller.

use crate::playlist::{ModelSlide, SlideKind};
use crate::resources::{ResourceArbiter, ResourceGuard, ResourceKind};
use crate::telemetry::TelemetryAction;
use crate::types::PlayerConfig;
use crate::viewer::{HostEffect, InteractionLatch, Viewer, ViewerCallbacks, ViewerInput, ViewerTimer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AssetState {
    Pending,
    Loaded,
    Failed,
}

pub struct ModelViewer {
    slide: ModelSlide,
    arbiter: ResourceArbiter,
    first_reveal_us: u64,
    reveal_us: u64,
    fallback_us: u64,
    active: bool,
    asset: AssetState,
    load_requested: bool,
    revealed_once: bool,
    /// ContentReady already sent for the current activation.
    ready: bool,
    open_hotspot: Option<String>,
    dragging: bool,
    in_ar: bool,
    latch: InteractionLatch,
    auto_rotate: bool,
    audio: Option<ResourceGuard>,
}

impl ModelViewer {
    pub fn new(slide: ModelSlide, config: &PlayerConfig, arbiter: ResourceArbiter) -> Self {
        ModelViewer {
            slide,
            arbiter,
            first_reveal_us: config.model_first_reveal_us,
            reveal_us: config.model_reveal_us,
            fallback_us: config.model_fallback_ready_us,
            active: false,
            asset: AssetState::Pending,
            load_requested: false,
            revealed_once: false,
            ready: false,
            open_hotspot: None,
            dragging: false,
            in_ar: false,
            latch: InteractionLatch::default(),
            auto_rotate: false,
            audio: None,
        }
    }

    pub fn open_hotspot(&self) -> Option<&str> {
        self.open_hotspot.as_deref()
    }

    pub fn is_rotating(&self) -> bool {
        self.auto_rotate
    }

    pub fn in_ar(&self) -> bool {
        self.in_ar
    }

    fn reveal_delay(&self) -> u64 {
        if self.revealed_once {
            self.reveal_us
        } else {
            self.first_reveal_us
        }
    }

    fn mark_ready(&mut self, callbacks: &mut ViewerCallbacks) {
        self.ready = true;
        self.revealed_once = true;
        callbacks.effect(HostEffect::SetLoaderVisible { visible: false });
        callbacks.content_ready();
    }

    fn select_hotspot(&mut self, id: String, callbacks: &mut ViewerCallbacks) {
        let Some(hotspot) = self.slide.hotspot(&id) else {
            tracing::warn!("unknown hotspot {:?} on {}", id, self.slide.source);
            return;
        };
        if self.in_ar {
            return;
        }
        if self.open_hotspot.as_deref() == Some(id.as_str()) {
            // Selecting the open annotation again deselects it.
            self.open_hotspot = None;
            callbacks.effect(HostEffect::CloseHotspot);
            return;
        }

        callbacks.track(TelemetryAction::HotspotSelected, hotspot.label.clone());
        callbacks.effect(HostEffect::OpenHotspot { id: id.clone() });
        self.open_hotspot = Some(id);
    }

    fn enter_ar(&mut self, callbacks: &mut ViewerCallbacks) {
        let Some(source) = self.slide.ar_source.clone() else {
            tracing::debug!("AR requested on {} which has no AR asset", self.slide.source);
            return;
        };
        if self.in_ar {
            return;
        }
        if self.open_hotspot.take().is_some() {
            callbacks.effect(HostEffect::CloseHotspot);
        }
        self.dragging = false;
        self.in_ar = true;
        callbacks.effect(HostEffect::EnterAr { source });
        let label = self
            .slide
            .product
            .name
            .clone()
            .unwrap_or_else(|| self.slide.source.clone());
        callbacks.track(TelemetryAction::ArEntered, label);
    }

    /// Push interaction and rotation state out after every change.
    fn sync(&mut self, callbacks: &mut ViewerCallbacks) {
        if self.active {
            let interacting = self.open_hotspot.is_some() || self.dragging || self.in_ar;
            self.latch.sync(interacting, callbacks);
        }

        let rotate = self.active
            && self.ready
            && self.asset == AssetState::Loaded
            && !self.latch.is_open();
        if rotate != self.auto_rotate {
            self.auto_rotate = rotate;
            callbacks.effect(HostEffect::SetAutoRotate { enabled: rotate });
        }
    }
}

impl Viewer for ModelViewer {
    fn kind(&self) -> SlideKind {
        SlideKind::Model
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn activate(&mut self, callbacks: &mut ViewerCallbacks) {
        if self.active {
            return;
        }
        self.active = true;
        self.ready = false;

        if !self.load_requested {
            self.load_requested = true;
            callbacks.effect(HostEffect::LoadModel {
                source: self.slide.source.clone(),
            });
        }
        if !self.revealed_once {
            callbacks.effect(HostEffect::SetLoaderVisible { visible: true });
        }

        match self.asset {
            AssetState::Loaded => callbacks.schedule(ViewerTimer::Reveal, self.reveal_delay()),
            AssetState::Pending | AssetState::Failed => {
                callbacks.schedule(ViewerTimer::LoadFallback, self.fallback_us)
            }
        }

        if let Some(source) = self.slide.audio_source.clone() {
            let guard = self.arbiter.acquire(ResourceKind::AudioOutput);
            callbacks.effect(HostEffect::StartAudio {
                lease: guard.lease(),
                source,
            });
            self.audio = Some(guard);
        }

        self.sync(callbacks);
    }

    fn deactivate(&mut self, callbacks: &mut ViewerCallbacks) {
        if !self.active {
            return;
        }
        self.active = false;
        self.ready = false;
        callbacks.cancel(ViewerTimer::Reveal);
        callbacks.cancel(ViewerTimer::LoadFallback);

        // Dropping the guard ends the lease; the host stops the track on release.
        self.audio = None;

        if self.in_ar {
            self.in_ar = false;
            callbacks.effect(HostEffect::ExitAr);
        }
        if self.open_hotspot.take().is_some() {
            callbacks.effect(HostEffect::CloseHotspot);
        }
        self.dragging = false;
        self.latch.reset();
        self.sync(callbacks);
    }

    fn handle_input(&mut self, input: ViewerInput, callbacks: &mut ViewerCallbacks) {
        match input {
            ViewerInput::AssetLoaded => {
                if self.asset == AssetState::Loaded {
                    return;
                }
                self.asset = AssetState::Loaded;
                if self.active && !self.ready {
                    callbacks.cancel(ViewerTimer::LoadFallback);
                    callbacks.schedule(ViewerTimer::Reveal, self.reveal_delay());
                }
            }
            ViewerInput::AssetFailed { reason } => {
                tracing::warn!("model {} failed to load: {}", self.slide.source, reason);
                if self.asset != AssetState::Loaded {
                    self.asset = AssetState::Failed;
                }
            }
            _ if !self.active => {
                tracing::debug!("inactive model viewer ignored {:?}", input);
                return;
            }
            ViewerInput::HotspotSelected { id } => self.select_hotspot(id, callbacks),
            ViewerInput::HotspotClosed => {
                if self.open_hotspot.take().is_some() {
                    callbacks.effect(HostEffect::CloseHotspot);
                }
            }
            ViewerInput::DragStarted => {
                if !self.in_ar {
                    self.dragging = true;
                }
            }
            ViewerInput::DragEnded => self.dragging = false,
            ViewerInput::ZoomEnded { distance } => {
                let label = distance.map(|d| format!("{:.2}", d)).unwrap_or_default();
                callbacks.track(TelemetryAction::ZoomEnded, label);
            }
            ViewerInput::ArRequested => self.enter_ar(callbacks),
            ViewerInput::ArExited => {
                if self.in_ar {
                    self.in_ar = false;
                    callbacks.effect(HostEffect::ExitAr);
                }
            }
            other => tracing::debug!("model viewer ignored {:?}", other),
        }
        self.sync(callbacks);
    }

    fn on_timer(&mut self, timer: ViewerTimer, callbacks: &mut ViewerCallbacks) {
        if !self.active || self.ready {
            return;
        }
        match timer {
            ViewerTimer::Reveal => self.mark_ready(callbacks),
            ViewerTimer::LoadFallback => {
                tracing::warn!(
                    "model {} not loaded after {}ms, continuing without it",
                    self.slide.source,
                    self.fallback_us / 1000
                );
                self.mark_ready(callbacks);
            }
            ViewerTimer::CameraRetry => {}
        }
        self.sync(callbacks);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playlist::{parse_playlist, Slide};
    use crate::viewer::{TimerRequest, ViewerLifecycleEvent};

    fn slide() -> ModelSlide {
        let playlist = parse_playlist(
            r#"{"files": [{
                "kind": "model",
                "source": "shoe.glb",
                "arSource": "shoe.usdz",
                "audioFile": "ambient.mp3",
                "productName": "Runner",
                "hotspots": [
                    {"id": "sole", "label": "Sole"},
                    {"id": "lace", "label": "Lace"}
                ]
            }]}"#,
        )
        .unwrap();
        match playlist.slides()[0].clone() {
            Slide::Model(model) => model,
            other => panic!("expected model slide, got {:?}", other),
        }
    }

    fn viewer(arbiter: &ResourceArbiter) -> ModelViewer {
        ModelViewer::new(slide(), &PlayerConfig::default(), arbiter.clone())
    }

    fn ready_viewer(arbiter: &ResourceArbiter) -> ModelViewer {
        let mut viewer = viewer(arbiter);
        let mut cb = ViewerCallbacks::new();
        viewer.activate(&mut cb);
        viewer.handle_input(ViewerInput::AssetLoaded, &mut cb);
        viewer.on_timer(ViewerTimer::Reveal, &mut cb);
        viewer
    }

    #[test]
    fn first_activation_requests_load_and_fallback() {
        let arbiter = ResourceArbiter::new();
        let mut viewer = viewer(&arbiter);
        let mut cb = ViewerCallbacks::new();
        viewer.activate(&mut cb);

        assert!(cb.effects.contains(&HostEffect::LoadModel { source: "shoe.glb".into() }));
        assert!(cb.effects.contains(&HostEffect::SetLoaderVisible { visible: true }));
        assert!(cb.timers.contains(&TimerRequest::Schedule {
            timer: ViewerTimer::LoadFallback,
            delay_us: 8_000_000
        }));
        assert!(arbiter.holder(ResourceKind::AudioOutput).is_some());
        assert!(cb.lifecycle.is_empty(), "no readiness before the asset loads");
    }

    #[test]
    fn reveal_signals_ready_once_and_starts_rotation() {
        let arbiter = ResourceArbiter::new();
        let mut viewer = viewer(&arbiter);
        let mut cb = ViewerCallbacks::new();
        viewer.activate(&mut cb);
        viewer.handle_input(ViewerInput::AssetLoaded, &mut cb);

        assert!(cb.timers.contains(&TimerRequest::Cancel(ViewerTimer::LoadFallback)));
        assert!(cb.timers.contains(&TimerRequest::Schedule {
            timer: ViewerTimer::Reveal,
            delay_us: 3_000_000
        }));

        viewer.on_timer(ViewerTimer::Reveal, &mut cb);
        viewer.on_timer(ViewerTimer::Reveal, &mut cb);
        viewer.on_timer(ViewerTimer::LoadFallback, &mut cb);

        assert_eq!(cb.lifecycle, vec![ViewerLifecycleEvent::ContentReady]);
        assert!(viewer.is_rotating());
    }

    #[test]
    fn failed_asset_still_becomes_ready_after_fallback() {
        let arbiter = ResourceArbiter::new();
        let mut viewer = viewer(&arbiter);
        let mut cb = ViewerCallbacks::new();
        viewer.activate(&mut cb);
        viewer.handle_input(ViewerInput::AssetFailed { reason: "404".into() }, &mut cb);
        viewer.on_timer(ViewerTimer::LoadFallback, &mut cb);

        assert_eq!(cb.lifecycle, vec![ViewerLifecycleEvent::ContentReady]);
        assert!(!viewer.is_rotating(), "nothing to rotate without an asset");
    }

    #[test]
    fn one_hotspot_open_at_a_time() {
        let arbiter = ResourceArbiter::new();
        let mut viewer = ready_viewer(&arbiter);
        let mut cb = ViewerCallbacks::new();

        viewer.handle_input(ViewerInput::HotspotSelected { id: "sole".into() }, &mut cb);
        viewer.handle_input(ViewerInput::HotspotSelected { id: "lace".into() }, &mut cb);
        assert_eq!(viewer.open_hotspot(), Some("lace"));
        assert!(!viewer.is_rotating());
        assert_eq!(cb.lifecycle, vec![ViewerLifecycleEvent::InteractionBegin]);
        assert_eq!(cb.telemetry.len(), 2);

        // Selecting the open hotspot again closes it.
        viewer.handle_input(ViewerInput::HotspotSelected { id: "lace".into() }, &mut cb);
        assert_eq!(viewer.open_hotspot(), None);
        assert_eq!(
            cb.lifecycle,
            vec![
                ViewerLifecycleEvent::InteractionBegin,
                ViewerLifecycleEvent::InteractionEnd
            ]
        );
        assert!(viewer.is_rotating());
    }

    #[test]
    fn drag_and_annotation_overlap_as_one_interaction() {
        let arbiter = ResourceArbiter::new();
        let mut viewer = ready_viewer(&arbiter);
        let mut cb = ViewerCallbacks::new();

        viewer.handle_input(ViewerInput::DragStarted, &mut cb);
        viewer.handle_input(ViewerInput::HotspotSelected { id: "sole".into() }, &mut cb);
        viewer.handle_input(ViewerInput::DragEnded, &mut cb);
        assert_eq!(cb.lifecycle, vec![ViewerLifecycleEvent::InteractionBegin]);

        viewer.handle_input(ViewerInput::HotspotClosed, &mut cb);
        assert_eq!(cb.lifecycle.last(), Some(&ViewerLifecycleEvent::InteractionEnd));
    }

    #[test]
    fn ar_session_holds_interaction() {
        let arbiter = ResourceArbiter::new();
        let mut viewer = ready_viewer(&arbiter);
        let mut cb = ViewerCallbacks::new();

        viewer.handle_input(ViewerInput::HotspotSelected { id: "sole".into() }, &mut cb);
        viewer.handle_input(ViewerInput::ArRequested, &mut cb);
        assert!(viewer.in_ar());
        assert_eq!(viewer.open_hotspot(), None, "AR replaces the standard render");
        assert!(cb.effects.contains(&HostEffect::EnterAr { source: "shoe.usdz".into() }));
        assert_eq!(cb.lifecycle, vec![ViewerLifecycleEvent::InteractionBegin]);

        viewer.handle_input(ViewerInput::ArExited, &mut cb);
        assert_eq!(cb.lifecycle.last(), Some(&ViewerLifecycleEvent::InteractionEnd));
        assert!(cb
            .telemetry
            .iter()
            .any(|(action, label)| *action == TelemetryAction::ArEntered && label == "Runner"));
    }

    #[test]
    fn deactivation_releases_audio_and_reactivation_is_cheap() {
        let arbiter = ResourceArbiter::new();
        let mut viewer = ready_viewer(&arbiter);
        arbiter.drain_releases();

        let mut cb = ViewerCallbacks::new();
        viewer.deactivate(&mut cb);
        assert_eq!(arbiter.holder(ResourceKind::AudioOutput), None);
        assert_eq!(arbiter.drain_releases().len(), 1);
        assert!(cb.lifecycle.is_empty());
        assert!(!viewer.is_rotating());

        let mut cb = ViewerCallbacks::new();
        viewer.activate(&mut cb);
        assert!(!cb.effects.iter().any(|e| matches!(e, HostEffect::LoadModel { .. })));
        assert!(cb.timers.contains(&TimerRequest::Schedule {
            timer: ViewerTimer::Reveal,
            delay_us: 100_000
        }));
        assert!(arbiter.holder(ResourceKind::AudioOutput).is_some());
    }

    #[test]
    fn inactive_viewer_ignores_interaction() {
        let arbiter = ResourceArbiter::new();
        let mut viewer = viewer(&arbiter);
        let mut cb = ViewerCallbacks::new();
        viewer.handle_input(ViewerInput::HotspotSelected { id: "sole".into() }, &mut cb);
        assert!(cb.is_empty());
    }

    #[test]
    fn release_drops_every_lease() {
        let arbiter = ResourceArbiter::new();
        let mut viewer = ready_viewer(&arbiter);
        let mut cb = ViewerCallbacks::new();
        viewer.release(&mut cb);
        assert_eq!(arbiter.holder(ResourceKind::AudioOutput), None);
    }
}
