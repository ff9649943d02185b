// Composition root: controller + the one mounted viewer + resource arbiter + telemetry.
// Everything the host must do comes out as an ordered HostCommand stream.

use serde::Serialize;

use crate::controller::{
    AdvanceReason, FiredTimer, PlaybackController, PlaybackState, PlayerStatus, SlidePhase,
    Transition,
};
use crate::error::{PlayerError, PlaylistFetchError};
use crate::input::NavigationKey;
use crate::playlist::{playlist_from_response, Playlist, Slide};
use crate::resources::{ResourceArbiter, ResourceRelease};
use crate::telemetry::{TelemetryEvent, TelemetryQueue};
use crate::types::{FetchTicket, PlayerConfig, SlideIndex, SlideToken, Timestamp};
use crate::viewer::{self, HostEffect, TimerRequest, Viewer, ViewerCallbacks, ViewerInput};

/// Instructions for the host page, in the order they must be carried out.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum HostCommand {
    ShowLoading,
    ShowError { message: String },
    ShowInvalidToken,
    ShowEmpty,
    PreloadAssets { sources: Vec<String> },
    MountViewer { token: SlideToken, slide: Slide },
    /// The host adopts `token` for all later input to the mounted viewer.
    SetViewerActive { token: SlideToken, active: bool },
    UnmountViewer { token: SlideToken },
    ViewerEffect { token: SlideToken, effect: HostEffect },
    /// Stop whatever media is bound to the lease.
    ReleaseResource(ResourceRelease),
}

/// Snapshot for rendering the player chrome.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub status: PlayerStatus,
    pub state: Option<PlaybackState>,
    pub phase: Option<SlidePhase>,
    pub navigation_enabled: bool,
    pub slide_count: usize,
    pub company_logo: Option<String>,
    pub next_wake_at: Option<Timestamp>,
    pub visible: bool,
}

struct MountedViewer {
    token: SlideToken,
    viewer: Box<dyn Viewer>,
}

pub struct Player {
    config: PlayerConfig,
    controller: PlaybackController,
    arbiter: ResourceArbiter,
    mounted: Option<MountedViewer>,
    visible: bool,
    commands: Vec<HostCommand>,
    telemetry: TelemetryQueue,
}

impl Player {
    pub fn new(config: PlayerConfig) -> Self {
        Player {
            controller: PlaybackController::new(&config),
            telemetry: TelemetryQueue::new(config.telemetry_capacity),
            arbiter: ResourceArbiter::new(),
            mounted: None,
            visible: true,
            commands: Vec::new(),
            config,
        }
    }

    pub fn controller(&self) -> &PlaybackController {
        &self.controller
    }

    pub fn next_wake_at(&self) -> Option<Timestamp> {
        self.controller.next_wake_at()
    }

    pub fn drain_commands(&mut self) -> Vec<HostCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn drain_telemetry(&mut self) -> Vec<TelemetryEvent> {
        self.telemetry.drain()
    }

    pub fn view(&self, now: Timestamp) -> PlayerView {
        let playlist = self.controller.playlist();
        PlayerView {
            status: self.controller.status().clone(),
            state: self.controller.state(),
            phase: self.controller.slide_phase(),
            navigation_enabled: !self.controller.is_navigation_locked(now),
            slide_count: playlist.map(Playlist::len).unwrap_or(0),
            company_logo: playlist.and_then(Playlist::company_logo).map(str::to_string),
            next_wake_at: self.controller.next_wake_at(),
            visible: self.visible,
        }
    }

    // -------------------------------------------------------------------------
    // Playlist
    // -------------------------------------------------------------------------

    /// Start loading a playlist, dropping whatever is on screen.
    pub fn begin_load(&mut self) -> FetchTicket {
        self.unmount_viewer();
        let ticket = self.controller.begin_fetch();
        self.commands.push(HostCommand::ShowLoading);
        self.flush_releases();
        ticket
    }

    /// Feed back the HTTP outcome of the fetch for `ticket`.
    pub fn finish_load(
        &mut self,
        ticket: FetchTicket,
        status: u16,
        body: &str,
        now: Timestamp,
    ) -> Result<(), PlayerError> {
        let result = playlist_from_response(status, body);
        self.complete_load(ticket, result, now)
    }

    /// The request never produced a response.
    pub fn fail_load(
        &mut self,
        ticket: FetchTicket,
        message: &str,
        now: Timestamp,
    ) -> Result<(), PlayerError> {
        self.complete_load(ticket, Err(PlaylistFetchError::Network(message.to_string())), now)
    }

    fn complete_load(
        &mut self,
        ticket: FetchTicket,
        result: Result<Playlist, PlaylistFetchError>,
        now: Timestamp,
    ) -> Result<(), PlayerError> {
        let transition = self.controller.complete_fetch(ticket, result, now)?;

        match self.controller.status() {
            PlayerStatus::InvalidToken => self.commands.push(HostCommand::ShowInvalidToken),
            PlayerStatus::Empty => self.commands.push(HostCommand::ShowEmpty),
            PlayerStatus::Failed { message } => self.commands.push(HostCommand::ShowError {
                message: message.clone(),
            }),
            PlayerStatus::Ready => {
                let sources = self
                    .controller
                    .playlist()
                    .map(Playlist::preload_sources)
                    .unwrap_or_default();
                if !sources.is_empty() {
                    self.commands.push(HostCommand::PreloadAssets { sources });
                }
            }
            PlayerStatus::Idle | PlayerStatus::Loading => {}
        }

        if let Some(transition) = transition {
            if self.visible {
                self.run_transition(transition, now);
            } else {
                // Nothing mounts while hidden; `set_visible(true)` enters the first slide.
                self.controller.suspend();
            }
        }
        self.flush_releases();
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Navigation
    // -------------------------------------------------------------------------

    pub fn next(&mut self, now: Timestamp) -> Result<(), PlayerError> {
        let transition = self.controller.next(now)?;
        self.run_transition(transition, now);
        self.flush_releases();
        Ok(())
    }

    pub fn previous(&mut self, now: Timestamp) -> Result<(), PlayerError> {
        let transition = self.controller.previous(now)?;
        self.run_transition(transition, now);
        self.flush_releases();
        Ok(())
    }

    pub fn select(&mut self, index: usize, now: Timestamp) -> Result<(), PlayerError> {
        if let Some(transition) = self.controller.select(SlideIndex::new(index), now)? {
            self.run_transition(transition, now);
            self.flush_releases();
        }
        Ok(())
    }

    pub fn key_pressed(&mut self, key: &str, now: Timestamp) -> Result<(), PlayerError> {
        match NavigationKey::from_key(key)? {
            NavigationKey::Previous => self.previous(now),
            NavigationKey::Next => self.next(now),
        }
    }

    // -------------------------------------------------------------------------
    // Viewer traffic
    // -------------------------------------------------------------------------

    /// Forward a host notification to the viewer mounted for `token`.
    /// Returns false when the token is stale and the input was dropped.
    pub fn viewer_input(&mut self, token: SlideToken, input: ViewerInput, now: Timestamp) -> bool {
        let Some(mounted) = self.mounted.as_mut().filter(|m| m.token == token) else {
            tracing::debug!("dropping {:?} for stale slide {}", input, token.index.as_usize());
            return false;
        };

        let mut callbacks = ViewerCallbacks::new();
        mounted.viewer.handle_input(input, &mut callbacks);
        if let Some(transition) = self.route(token, callbacks, now) {
            self.run_transition(transition, now);
        }
        self.flush_releases();
        true
    }

    /// Fire everything due at `now`.
    pub fn tick(&mut self, now: Timestamp) {
        while let Some(fired) = self.controller.pop_due_timer(now) {
            match fired {
                FiredTimer::Advanced(transition) => self.run_transition(transition, now),
                FiredTimer::Viewer { token, timer } => {
                    let Some(mounted) = self.mounted.as_mut().filter(|m| m.token == token) else {
                        continue;
                    };
                    let mut callbacks = ViewerCallbacks::new();
                    mounted.viewer.on_timer(timer, &mut callbacks);
                    if let Some(transition) = self.route(token, callbacks, now) {
                        self.run_transition(transition, now);
                    }
                }
            }
        }
        self.flush_releases();
    }

    // -------------------------------------------------------------------------
    // Visibility and teardown
    // -------------------------------------------------------------------------

    /// Hidden players hold no camera or audio and run no timers.
    pub fn set_visible(&mut self, visible: bool, now: Timestamp) {
        if visible == self.visible {
            return;
        }
        self.visible = visible;

        if visible {
            if let Some(transition) = self.controller.resume(now) {
                self.run_transition(transition, now);
            }
        } else {
            self.suspend_current();
        }
        self.flush_releases();
    }

    /// Tear the player down. Every resource is released before this returns.
    pub fn unmount(&mut self) {
        self.unmount_viewer();
        self.controller.reset();
        self.flush_releases();
    }

    fn suspend_current(&mut self) {
        let Some(token) = self.controller.suspend() else {
            return;
        };
        if let Some(mounted) = self.mounted.as_mut() {
            let mut callbacks = ViewerCallbacks::new();
            mounted.viewer.deactivate(&mut callbacks);
            self.commands.push(HostCommand::SetViewerActive {
                token,
                active: false,
            });
            self.emit_effects(token, callbacks.effects);
        }
    }

    fn unmount_viewer(&mut self) {
        if let Some(mut mounted) = self.mounted.take() {
            let mut callbacks = ViewerCallbacks::new();
            mounted.viewer.release(&mut callbacks);
            self.emit_effects(mounted.token, callbacks.effects);
            self.commands.push(HostCommand::UnmountViewer {
                token: mounted.token,
            });
        }
    }

    // -------------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------------

    /// Apply a transition and any transition it triggers in turn.
    fn run_transition(&mut self, transition: Transition, now: Timestamp) {
        let mut pending = Some(transition);
        while let Some(transition) = pending {
            pending = self.enter_viewer(transition, now);
        }
    }

    /// Old viewer out, new viewer in, in that order.
    fn enter_viewer(&mut self, transition: Transition, now: Timestamp) -> Option<Transition> {
        let to = transition.to;
        let reuse = matches!(
            &self.mounted,
            Some(m) if m.token.generation == to.generation && m.token.index == to.index
        );

        if reuse {
            if let Some(mounted) = self.mounted.as_mut() {
                let old = mounted.token;
                let was_active = mounted.viewer.is_active();
                let mut callbacks = ViewerCallbacks::new();
                if was_active {
                    mounted.viewer.deactivate(&mut callbacks);
                }
                mounted.token = to;
                if was_active {
                    self.commands.push(HostCommand::SetViewerActive {
                        token: old,
                        active: false,
                    });
                }
                // Timer requests are dropped: entering `to` already cleared the queue.
                self.emit_effects(old, callbacks.effects);
            }
        } else {
            self.unmount_viewer();
            // Releases reach the host before the next viewer can acquire anything.
            self.flush_releases();

            let slide = self.controller.current_slide()?.clone();
            let viewer = viewer::mount(&slide, &self.config, &self.arbiter);
            self.commands.push(HostCommand::MountViewer { token: to, slide });
            self.mounted = Some(MountedViewer { token: to, viewer });
        }

        if transition.reason != AdvanceReason::Initial {
            tracing::info!(
                "slide {} -> {} ({:?})",
                transition.from.map(|t| t.index.as_usize()).unwrap_or(0),
                to.index.as_usize(),
                transition.reason
            );
        }

        let mounted = self.mounted.as_mut()?;
        let mut callbacks = ViewerCallbacks::new();
        mounted.viewer.activate(&mut callbacks);
        self.commands.push(HostCommand::SetViewerActive {
            token: to,
            active: true,
        });
        self.route(to, callbacks, now)
    }

    /// Deliver a viewer's callbacks. Lifecycle events go last; the first one that
    /// moves to another slide ends delivery, since the rest are stale.
    fn route(
        &mut self,
        token: SlideToken,
        callbacks: ViewerCallbacks,
        now: Timestamp,
    ) -> Option<Transition> {
        let ViewerCallbacks {
            lifecycle,
            effects,
            timers,
            telemetry,
        } = callbacks;

        self.emit_effects(token, effects);

        for request in timers {
            match request {
                TimerRequest::Schedule { timer, delay_us } => {
                    self.controller
                        .schedule_viewer_timer(token, timer, delay_us, now);
                }
                TimerRequest::Cancel(timer) => {
                    self.controller.cancel_viewer_timer(token, timer);
                }
            }
        }

        for (action, label) in telemetry {
            self.telemetry
                .push(TelemetryEvent::new(action, label, token.index, now));
        }

        for event in lifecycle {
            if let Some(transition) = self.controller.handle_lifecycle(token, event, now) {
                return Some(transition);
            }
        }
        None
    }

    fn emit_effects(&mut self, token: SlideToken, effects: Vec<HostEffect>) {
        self.commands.extend(
            effects
                .into_iter()
                .map(|effect| HostCommand::ViewerEffect { token, effect }),
        );
    }

    fn flush_releases(&mut self) {
        self.commands.extend(
            self.arbiter
                .drain_releases()
                .into_iter()
                .map(HostCommand::ReleaseResource),
        );
    }
}
