// Viewer lifecycle contract shared by every slide kind.
// A viewer talks upward only through ViewerCallbacks; the controller never reaches into it.

use serde::{Deserialize, Serialize};

use crate::camera_viewer::CameraEffectViewer;
use crate::model_viewer::ModelViewer;
use crate::playlist::{Slide, SlideKind};
use crate::resources::{LeaseId, ResourceArbiter};
use crate::telemetry::TelemetryAction;
use crate::types::PlayerConfig;
use crate::video_viewer::VideoViewer;

/// Signals a viewer sends to the playback controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ViewerLifecycleEvent {
    /// Asset loaded and first render stable. Once per activation.
    ContentReady,
    /// The user started something that should hold auto-advance.
    InteractionBegin,
    InteractionEnd,
    /// Natural end of content (video).
    ContentEnded,
}

/// Deferred callbacks a viewer may ask for. Owned and cancelled by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ViewerTimer {
    /// Render-stable hold after a model asset loads.
    Reveal,
    /// Bounded wait after which a model reports ready without its asset.
    LoadFallback,
    /// Single automatic camera retry.
    CameraRetry,
}

/// Why the camera pipeline could not start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CameraFailure {
    PermissionDenied,
    DeviceUnavailable,
    EffectLoadFailed,
    Other,
}

impl CameraFailure {
    /// Retrying without user action cannot fix a denied permission.
    pub fn is_transient(&self) -> bool {
        !matches!(self, CameraFailure::PermissionDenied)
    }

    pub fn message(&self) -> &'static str {
        match self {
            CameraFailure::PermissionDenied => "Camera access was denied",
            CameraFailure::DeviceUnavailable => "No camera is available",
            CameraFailure::EffectLoadFailed => "The current filter encountered an error",
            CameraFailure::Other => "Failed to start camera",
        }
    }
}

/// Notifications from the host page about what happened inside a viewer's rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ViewerInput {
    AssetLoaded,
    AssetFailed { reason: String },
    HotspotSelected { id: String },
    HotspotClosed,
    DragStarted,
    DragEnded,
    ZoomEnded {
        #[serde(default)]
        distance: Option<f32>,
    },
    ArRequested,
    ArExited,
    MediaReady,
    MediaEnded,
    MediaFailed { reason: String },
    TogglePlayback,
    ToggleMute,
    SetVolume { volume: f32 },
    CameraStarted,
    CameraFailed {
        failure: CameraFailure,
        #[serde(default)]
        message: Option<String>,
    },
    RetryRequested,
}

/// Work the host must carry out for a viewer. Releasing media is not listed here:
/// it follows from a lease ending (see `ResourceArbiter`).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum HostEffect {
    LoadModel { source: String },
    SetLoaderVisible { visible: bool },
    SetAutoRotate { enabled: bool },
    OpenHotspot { id: String },
    CloseHotspot,
    EnterAr { source: String },
    ExitAr,
    StartAudio { lease: LeaseId, source: String },
    PlayVideo { muted: bool, volume: f32 },
    PauseVideo,
    RewindVideo,
    Unmute { lease: LeaseId },
    Mute,
    SetVolume { volume: f32 },
    StartCamera {
        lease: LeaseId,
        effect_group: String,
        effect_token: Option<String>,
    },
    ShowCameraError { message: String, can_retry: bool },
    ClearCameraError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerRequest {
    Schedule { timer: ViewerTimer, delay_us: u64 },
    Cancel(ViewerTimer),
}

/// Outbound channel of a viewer: lifecycle signals, host effects, timer requests, telemetry.
#[derive(Debug, Default)]
pub struct ViewerCallbacks {
    pub lifecycle: Vec<ViewerLifecycleEvent>,
    pub effects: Vec<HostEffect>,
    pub timers: Vec<TimerRequest>,
    pub telemetry: Vec<(TelemetryAction, String)>,
}

impl ViewerCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content_ready(&mut self) {
        self.lifecycle.push(ViewerLifecycleEvent::ContentReady);
    }

    pub fn interaction_changed(&mut self, open: bool) {
        self.lifecycle.push(if open {
            ViewerLifecycleEvent::InteractionBegin
        } else {
            ViewerLifecycleEvent::InteractionEnd
        });
    }

    pub fn content_ended(&mut self) {
        self.lifecycle.push(ViewerLifecycleEvent::ContentEnded);
    }

    pub fn effect(&mut self, effect: HostEffect) {
        self.effects.push(effect);
    }

    pub fn schedule(&mut self, timer: ViewerTimer, delay_us: u64) {
        self.timers.push(TimerRequest::Schedule { timer, delay_us });
    }

    pub fn cancel(&mut self, timer: ViewerTimer) {
        self.timers.push(TimerRequest::Cancel(timer));
    }

    pub fn track(&mut self, action: TelemetryAction, label: impl Into<String>) {
        self.telemetry.push((action, label.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.lifecycle.is_empty()
            && self.effects.is_empty()
            && self.timers.is_empty()
            && self.telemetry.is_empty()
    }
}

/// Tracks whether any interaction is open and reports only the edges,
/// so begin/end always arrive in pairs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InteractionLatch {
    open: bool,
}

impl InteractionLatch {
    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn sync(&mut self, open: bool, callbacks: &mut ViewerCallbacks) {
        if open != self.open {
            self.open = open;
            callbacks.interaction_changed(open);
        }
    }

    /// Forget the open state without reporting it. The controller clears its own
    /// pause flag whenever the slide is left.
    pub fn reset(&mut self) {
        self.open = false;
    }
}

/// The lifecycle contract.
///
/// `activate` and `deactivate` may alternate any number of times on one instance;
/// reactivation must be cheap. `release` runs once, on unmount, and must leave no
/// resource held.
pub trait Viewer {
    fn kind(&self) -> SlideKind;

    fn is_active(&self) -> bool;

    fn activate(&mut self, callbacks: &mut ViewerCallbacks);

    /// Stop consuming resources. Must not emit lifecycle events.
    fn deactivate(&mut self, callbacks: &mut ViewerCallbacks);

    fn handle_input(&mut self, input: ViewerInput, callbacks: &mut ViewerCallbacks);

    fn on_timer(&mut self, timer: ViewerTimer, callbacks: &mut ViewerCallbacks);

    fn release(&mut self, callbacks: &mut ViewerCallbacks) {
        if self.is_active() {
            self.deactivate(callbacks);
        }
    }
}

/// Build the viewer for a slide. The match is the single place that maps slide
/// kinds to viewers.
pub fn mount(slide: &Slide, config: &PlayerConfig, arbiter: &ResourceArbiter) -> Box<dyn Viewer> {
    match slide {
        Slide::Model(model) => Box::new(ModelViewer::new(model.clone(), config, arbiter.clone())),
        Slide::Video(video) => Box::new(VideoViewer::new(video.clone(), arbiter.clone())),
        Slide::CameraEffect(camera) => {
            Box::new(CameraEffectViewer::new(camera.clone(), config, arbiter.clone()))
        }
    }
}
