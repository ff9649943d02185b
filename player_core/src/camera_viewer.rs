// Camera-effect viewer: live camera feed composited with an effect group by an external engine.
// The camera is held only while active. Failures show a retry control; automatic retries are bounded.

use crate::playlist::{CameraEffectSlide, SlideKind};
use crate::resources::{ResourceArbiter, ResourceGuard, ResourceKind};
use crate::types::PlayerConfig;
use crate::viewer::{CameraFailure, HostEffect, Viewer, ViewerCallbacks, ViewerInput, ViewerTimer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraPhase {
    Idle,
    Starting,
    Live,
    Failed(CameraFailure),
}

pub struct CameraEffectViewer {
    slide: CameraEffectSlide,
    arbiter: ResourceArbiter,
    retry_delay_us: u64,
    max_auto_retries: u32,
    active: bool,
    phase: CameraPhase,
    auto_retries_used: u32,
    ready: bool,
    camera: Option<ResourceGuard>,
}

impl CameraEffectViewer {
    pub fn new(slide: CameraEffectSlide, config: &PlayerConfig, arbiter: ResourceArbiter) -> Self {
        CameraEffectViewer {
            slide,
            arbiter,
            retry_delay_us: config.camera_retry_delay_us,
            max_auto_retries: config.camera_auto_retries,
            active: false,
            phase: CameraPhase::Idle,
            auto_retries_used: 0,
            ready: false,
            camera: None,
        }
    }

    pub fn phase(&self) -> CameraPhase {
        self.phase
    }

    fn start(&mut self, callbacks: &mut ViewerCallbacks) {
        if self.phase == CameraPhase::Starting && self.camera.is_some() {
            return;
        }
        if matches!(self.phase, CameraPhase::Failed(_)) {
            callbacks.effect(HostEffect::ClearCameraError);
        }

        let guard = self.arbiter.acquire(ResourceKind::CameraDevice);
        callbacks.effect(HostEffect::StartCamera {
            lease: guard.lease(),
            effect_group: self.slide.effect_group.clone(),
            effect_token: self.slide.effect_token.clone(),
        });
        self.camera = Some(guard);
        self.phase = CameraPhase::Starting;
    }

    fn fail(&mut self, failure: CameraFailure, message: Option<String>, callbacks: &mut ViewerCallbacks) {
        tracing::warn!(
            "camera effect {} failed: {:?} {}",
            self.slide.effect_group,
            failure,
            message.as_deref().unwrap_or("")
        );
        self.camera = None;
        self.phase = CameraPhase::Failed(failure);
        callbacks.effect(HostEffect::ShowCameraError {
            message: message.unwrap_or_else(|| failure.message().to_string()),
            can_retry: true,
        });

        if failure.is_transient() && self.auto_retries_used < self.max_auto_retries {
            self.auto_retries_used += 1;
            callbacks.schedule(ViewerTimer::CameraRetry, self.retry_delay_us);
        } else if !self.ready {
            // Nothing more will happen without the user; let the controller's timer run.
            self.ready = true;
            callbacks.content_ready();
        }
    }
}

impl Viewer for CameraEffectViewer {
    fn kind(&self) -> SlideKind {
        SlideKind::CameraEffect
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
        self.auto_retries_used = 0;
        self.start(callbacks);
    }

    fn deactivate(&mut self, callbacks: &mut ViewerCallbacks) {
        if !self.active {
            return;
        }
        self.active = false;
        self.ready = false;
        callbacks.cancel(ViewerTimer::CameraRetry);
        self.camera = None;
        self.phase = CameraPhase::Idle;
    }

    fn handle_input(&mut self, input: ViewerInput, callbacks: &mut ViewerCallbacks) {
        if !self.active {
            tracing::debug!("inactive camera viewer ignored {:?}", input);
            return;
        }
        match input {
            ViewerInput::CameraStarted => {
                if self.phase != CameraPhase::Starting {
                    return;
                }
                self.phase = CameraPhase::Live;
                if !self.ready {
                    self.ready = true;
                    callbacks.content_ready();
                }
            }
            ViewerInput::CameraFailed { failure, message } => {
                if matches!(self.phase, CameraPhase::Starting | CameraPhase::Live) {
                    self.fail(failure, message, callbacks);
                }
            }
            ViewerInput::RetryRequested => {
                if matches!(self.phase, CameraPhase::Failed(_)) {
                    callbacks.cancel(ViewerTimer::CameraRetry);
                    self.start(callbacks);
                }
            }
            other => tracing::debug!("camera viewer ignored {:?}", other),
        }
    }

    fn on_timer(&mut self, timer: ViewerTimer, callbacks: &mut ViewerCallbacks) {
        if timer == ViewerTimer::CameraRetry
            && self.active
            && matches!(self.phase, CameraPhase::Failed(_))
        {
            tracing::info!("retrying camera effect {}", self.slide.effect_group);
            self.start(callbacks);
        }
    }
}
