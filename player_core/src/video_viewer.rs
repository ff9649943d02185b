// Video viewer: muted autoplay on activation, rewind on deactivation, one end-of-content signal.

use crate::playlist::{SlideKind, VideoSlide};
use crate::resources::{ResourceArbiter, ResourceGuard, ResourceKind};
use crate::viewer::{HostEffect, Viewer, ViewerCallbacks, ViewerInput, ViewerTimer};

pub struct VideoViewer {
    slide: VideoSlide,
    arbiter: ResourceArbiter,
    active: bool,
    ready: bool,
    ended: bool,
    playing: bool,
    muted: bool,
    volume: f32,
    /// Held only while unmuted.
    audio: Option<ResourceGuard>,
}

impl VideoViewer {
    pub fn new(slide: VideoSlide, arbiter: ResourceArbiter) -> Self {
        VideoViewer {
            slide,
            arbiter,
            active: false,
            ready: false,
            ended: false,
            playing: false,
            muted: true,
            volume: 1.0,
            audio: None,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    fn mute(&mut self, callbacks: &mut ViewerCallbacks) {
        if self.muted {
            return;
        }
        self.muted = true;
        self.audio = None;
        callbacks.effect(HostEffect::Mute);
    }

    fn unmute(&mut self, callbacks: &mut ViewerCallbacks) {
        if !self.muted {
            return;
        }
        let guard = self.arbiter.acquire(ResourceKind::AudioOutput);
        callbacks.effect(HostEffect::Unmute { lease: guard.lease() });
        self.audio = Some(guard);
        self.muted = false;
    }
}

impl Viewer for VideoViewer {
    fn kind(&self) -> SlideKind {
        SlideKind::Video
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
        self.ended = false;
        // Autoplay policies only allow muted playback without a prior gesture.
        self.muted = true;
        self.volume = 1.0;
        self.playing = true;
        callbacks.effect(HostEffect::PlayVideo {
            muted: true,
            volume: self.volume,
        });
    }

    fn deactivate(&mut self, callbacks: &mut ViewerCallbacks) {
        if !self.active {
            return;
        }
        self.active = false;
        self.playing = false;
        self.audio = None;
        self.muted = true;
        callbacks.effect(HostEffect::PauseVideo);
        callbacks.effect(HostEffect::RewindVideo);
    }

    fn handle_input(&mut self, input: ViewerInput, callbacks: &mut ViewerCallbacks) {
        if !self.active {
            tracing::debug!("inactive video viewer ignored {:?}", input);
            return;
        }
        match input {
            ViewerInput::MediaReady => {
                if !self.ready {
                    self.ready = true;
                    callbacks.content_ready();
                }
            }
            ViewerInput::MediaFailed { reason } => {
                // Native error UI covers the picture; readiness keeps navigation and the
                // fallback timer working.
                tracing::warn!("video {} failed: {}", self.slide.source, reason);
                self.playing = false;
                if !self.ready {
                    self.ready = true;
                    callbacks.content_ready();
                }
            }
            ViewerInput::MediaEnded => {
                if !self.ended {
                    self.ended = true;
                    self.playing = false;
                    callbacks.content_ended();
                }
            }
            ViewerInput::TogglePlayback => {
                self.playing = !self.playing;
                if self.playing {
                    callbacks.effect(HostEffect::PlayVideo {
                        muted: self.muted,
                        volume: self.volume,
                    });
                } else {
                    callbacks.effect(HostEffect::PauseVideo);
                }
            }
            ViewerInput::ToggleMute => {
                if self.muted {
                    self.unmute(callbacks);
                } else {
                    self.mute(callbacks);
                }
            }
            ViewerInput::SetVolume { volume } => {
                let volume = if volume.is_finite() { volume.clamp(0.0, 1.0) } else { 0.0 };
                self.volume = volume;
                callbacks.effect(HostEffect::SetVolume { volume });
                if volume == 0.0 {
                    self.mute(callbacks);
                }
            }
            other => tracing::debug!("video viewer ignored {:?}", other),
        }
    }

    fn on_timer(&mut self, _timer: ViewerTimer, _callbacks: &mut ViewerCallbacks) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewer::ViewerLifecycleEvent;

    fn viewer(arbiter: &ResourceArbiter) -> VideoViewer {
        VideoViewer::new(
            VideoSlide {
                source: "promo.mp4".into(),
                rotation_secs: None,
            },
            arbiter.clone(),
        )
    }

    #[test]
    fn activation_autoplays_muted() {
        let arbiter = ResourceArbiter::new();
        let mut viewer = viewer(&arbiter);
        let mut cb = ViewerCallbacks::new();
        viewer.activate(&mut cb);

        assert_eq!(cb.effects, vec![HostEffect::PlayVideo { muted: true, volume: 1.0 }]);
        assert!(viewer.is_playing());
        assert!(arbiter.holder(ResourceKind::AudioOutput).is_none());
    }

    #[test]
    fn end_of_content_signalled_once() {
        let arbiter = ResourceArbiter::new();
        let mut viewer = viewer(&arbiter);
        let mut cb = ViewerCallbacks::new();
        viewer.activate(&mut cb);
        viewer.handle_input(ViewerInput::MediaReady, &mut cb);
        viewer.handle_input(ViewerInput::MediaEnded, &mut cb);
        viewer.handle_input(ViewerInput::MediaEnded, &mut cb);

        assert_eq!(
            cb.lifecycle,
            vec![
                ViewerLifecycleEvent::ContentReady,
                ViewerLifecycleEvent::ContentEnded
            ]
        );
    }

    #[test]
    fn deactivation_pauses_rewinds_and_resets_audio() {
        let arbiter = ResourceArbiter::new();
        let mut viewer = viewer(&arbiter);
        let mut cb = ViewerCallbacks::new();
        viewer.activate(&mut cb);
        viewer.handle_input(ViewerInput::ToggleMute, &mut cb);
        viewer.handle_input(ViewerInput::SetVolume { volume: 0.4 }, &mut cb);
        assert!(!viewer.is_muted());
        assert!(arbiter.holder(ResourceKind::AudioOutput).is_some());

        let mut cb = ViewerCallbacks::new();
        viewer.deactivate(&mut cb);
        assert_eq!(cb.effects, vec![HostEffect::PauseVideo, HostEffect::RewindVideo]);
        assert!(arbiter.holder(ResourceKind::AudioOutput).is_none());

        let mut cb = ViewerCallbacks::new();
        viewer.activate(&mut cb);
        assert!(viewer.is_muted());
        assert_eq!(viewer.volume(), 1.0);
        assert_eq!(cb.effects, vec![HostEffect::PlayVideo { muted: true, volume: 1.0 }]);
    }

    #[test]
    fn reactivation_can_end_again() {
        let arbiter = ResourceArbiter::new();
        let mut viewer = viewer(&arbiter);
        let mut cb = ViewerCallbacks::new();
        viewer.activate(&mut cb);
        viewer.handle_input(ViewerInput::MediaEnded, &mut cb);
        viewer.deactivate(&mut cb);
        viewer.activate(&mut cb);
        viewer.handle_input(ViewerInput::MediaEnded, &mut cb);

        let ended = cb
            .lifecycle
            .iter()
            .filter(|e| **e == ViewerLifecycleEvent::ContentEnded)
            .count();
        assert_eq!(ended, 2);
    }

    #[test]
    fn zero_volume_mutes_and_releases_audio() {
        let arbiter = ResourceArbiter::new();
        let mut viewer = viewer(&arbiter);
        let mut cb = ViewerCallbacks::new();
        viewer.activate(&mut cb);
        viewer.handle_input(ViewerInput::ToggleMute, &mut cb);
        viewer.handle_input(ViewerInput::SetVolume { volume: -3.0 }, &mut cb);

        assert!(viewer.is_muted());
        assert_eq!(viewer.volume(), 0.0);
        assert!(arbiter.holder(ResourceKind::AudioOutput).is_none());
    }

    #[test]
    fn failure_still_reports_ready() {
        let arbiter = ResourceArbiter::new();
        let mut viewer = viewer(&arbiter);
        let mut cb = ViewerCallbacks::new();
        viewer.activate(&mut cb);
        viewer.handle_input(ViewerInput::MediaFailed { reason: "decode".into() }, &mut cb);
        assert_eq!(cb.lifecycle, vec![ViewerLifecycleEvent::ContentReady]);
        assert!(!viewer.is_playing());
    }

    #[test]
    fn toggle_playback_pauses_and_resumes() {
        let arbiter = ResourceArbiter::new();
        let mut viewer = viewer(&arbiter);
        let mut cb = ViewerCallbacks::new();
        viewer.activate(&mut cb);
        viewer.handle_input(ViewerInput::TogglePlayback, &mut cb);
        assert!(!viewer.is_playing());
        viewer.handle_input(ViewerInput::TogglePlayback, &mut cb);
        assert!(viewer.is_playing());
        assert_eq!(cb.effects.last(), Some(&HostEffect::PlayVideo { muted: true, volume: 1.0 }));
    }
}
