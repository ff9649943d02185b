// Playback controller: playlist status, current slide, auto-advance timer, interaction pause, navigation.
// Every timer in the player lives in this controller's queue and is cancelled on every slide entry.

use serde::Serialize;

use crate::error::{PlayerError, PlaylistFetchError};
use crate::playlist::{AdvancePolicy, Playlist, Slide};
use crate::timer::{TimerKind, TimerQueue};
use crate::types::{FetchTicket, PlayerConfig, SlideIndex, SlideToken, Timestamp};
use crate::viewer::{ViewerLifecycleEvent, ViewerTimer};

/// Top-level presentation state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PlayerStatus {
    /// Nothing requested yet, or torn down.
    Idle,
    Loading,
    Ready,
    /// The playlist loaded but has no slides.
    Empty,
    /// The token did not resolve to a playlist.
    InvalidToken,
    Failed { message: String },
}

/// Sub-state of the current slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SlidePhase {
    /// Waiting for the viewer's ContentReady.
    Loading,
    /// Auto-advance armed (when the slide's policy has a timer).
    Running,
    /// Auto-advance suspended by an open interaction.
    Paused,
}

/// Snapshot of the playback state for the current slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub current_index: SlideIndex,
    pub is_content_loading: bool,
    pub is_interaction_paused: bool,
    pub auto_advance_deadline: Option<Timestamp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AdvanceReason {
    Initial,
    AutoAdvance,
    ContentEnded,
    Next,
    Previous,
    Select,
    /// Same slide re-entered after the player was hidden.
    Resume,
}

/// The controller left one slide entry and entered another.
/// The old viewer must be deactivated before the new one is activated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Option<SlideToken>,
    pub to: SlideToken,
    pub reason: AdvanceReason,
}

/// Result of a fired timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FiredTimer {
    Advanced(Transition),
    Viewer { token: SlideToken, timer: ViewerTimer },
}

#[derive(Debug, Clone, Copy)]
struct SlideSession {
    token: SlideToken,
    phase: SlidePhase,
    interaction_open: bool,
    entered_at: Timestamp,
    policy: AdvancePolicy,
    suspended: bool,
}

pub struct PlaybackController {
    settle_delay_us: u64,
    loading_nav_lock_us: u64,
    default_rotation_secs: f64,
    status: PlayerStatus,
    generation: u32,
    epoch: u64,
    playlist: Option<Playlist>,
    session: Option<SlideSession>,
    timers: TimerQueue,
}

impl PlaybackController {
    pub fn new(config: &PlayerConfig) -> Self {
        PlaybackController {
            settle_delay_us: config.settle_delay_us,
            loading_nav_lock_us: config.loading_nav_lock_us,
            default_rotation_secs: config.default_rotation_secs,
            status: PlayerStatus::Idle,
            generation: 0,
            epoch: 0,
            playlist: None,
            session: None,
            timers: TimerQueue::new(),
        }
    }

    pub fn status(&self) -> &PlayerStatus {
        &self.status
    }

    pub fn playlist(&self) -> Option<&Playlist> {
        self.playlist.as_ref()
    }

    pub fn current_token(&self) -> Option<SlideToken> {
        self.session.map(|s| s.token)
    }

    pub fn current_slide(&self) -> Option<&Slide> {
        let session = self.session.as_ref()?;
        self.playlist.as_ref()?.get(session.token.index)
    }

    pub fn slide_phase(&self) -> Option<SlidePhase> {
        self.session.map(|s| s.phase)
    }

    pub fn is_suspended(&self) -> bool {
        self.session.map(|s| s.suspended).unwrap_or(false)
    }

    pub fn state(&self) -> Option<PlaybackState> {
        let session = self.session.as_ref()?;
        Some(PlaybackState {
            current_index: session.token.index,
            is_content_loading: session.phase == SlidePhase::Loading,
            is_interaction_paused: session.interaction_open,
            auto_advance_deadline: self.timers.due_of(TimerKind::AutoAdvance),
        })
    }

    /// Earliest pending timer; the host should call back no later than this.
    pub fn next_wake_at(&self) -> Option<Timestamp> {
        self.timers.next_due()
    }

    fn is_current(&self, token: SlideToken) -> bool {
        self.session.map(|s| s.token == token).unwrap_or(false)
    }

    // -------------------------------------------------------------------------
    // Playlist
    // -------------------------------------------------------------------------

    /// Start a (re)fetch. Any previous playlist, slide and timer is dropped and
    /// results for older tickets will be refused.
    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.generation = self.generation.wrapping_add(1);
        self.timers.cancel_all();
        self.playlist = None;
        self.session = None;
        self.status = PlayerStatus::Loading;
        tracing::debug!("playlist fetch started (generation {})", self.generation);
        FetchTicket::new(self.generation)
    }

    /// Apply the outcome of the fetch identified by `ticket`.
    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<Playlist, PlaylistFetchError>,
        now: Timestamp,
    ) -> Result<Option<Transition>, PlayerError> {
        if ticket.generation() != self.generation || self.status != PlayerStatus::Loading {
            tracing::debug!("ignoring stale playlist result (generation {})", ticket.generation());
            return Err(PlayerError::StaleTicket);
        }

        match result {
            Err(err) if err.is_missing_token() => {
                tracing::info!("playlist not found; token is missing or invalid");
                self.status = PlayerStatus::InvalidToken;
                Ok(None)
            }
            Err(err) => {
                tracing::warn!("playlist fetch failed: {}", err);
                self.status = PlayerStatus::Failed {
                    message: err.to_string(),
                };
                Ok(None)
            }
            Ok(playlist) if playlist.is_empty() => {
                tracing::info!("playlist is empty");
                self.status = PlayerStatus::Empty;
                Ok(None)
            }
            Ok(playlist) => {
                tracing::info!("playlist loaded with {} slides", playlist.len());
                self.playlist = Some(playlist);
                self.status = PlayerStatus::Ready;
                Ok(Some(self.enter(SlideIndex::new(0), AdvanceReason::Initial, now)))
            }
        }
    }

    /// Tear everything down. In-flight fetches become stale.
    pub fn reset(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.timers.cancel_all();
        self.playlist = None;
        self.session = None;
        self.status = PlayerStatus::Idle;
    }

    // -------------------------------------------------------------------------
    // Slide entry
    // -------------------------------------------------------------------------

    /// The one path into a slide: cancel every timer, reset loading and pause state.
    fn enter(&mut self, index: SlideIndex, reason: AdvanceReason, now: Timestamp) -> Transition {
        let cancelled = self.timers.cancel_all();
        let from = self.current_token();
        self.epoch += 1;

        let token = SlideToken {
            generation: self.generation,
            epoch: self.epoch,
            index,
        };
        let policy = self
            .playlist
            .as_ref()
            .and_then(|p| p.get(index))
            .map(|slide| slide.advance_policy(self.default_rotation_secs))
            .unwrap_or(AdvancePolicy::OnContentEnd { fallback_us: None });

        self.session = Some(SlideSession {
            token,
            phase: SlidePhase::Loading,
            interaction_open: false,
            entered_at: now,
            policy,
            suspended: false,
        });

        tracing::debug!(
            "enter slide {} ({:?}), cancelled {} timers",
            index.as_usize(),
            reason,
            cancelled
        );
        Transition {
            from,
            to: token,
            reason,
        }
    }

    /// Arm auto-advance `delay_us` plus the policy duration from `now`.
    fn arm(&mut self, now: Timestamp, delay_us: u64) {
        let Some(session) = self.session else {
            return;
        };
        match session.policy.timer_us() {
            Some(duration_us) => {
                let due = now.after(delay_us).after(duration_us);
                self.timers.schedule(session.token, TimerKind::AutoAdvance, due);
            }
            None => {
                self.timers.cancel(TimerKind::AutoAdvance);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Viewer lifecycle
    // -------------------------------------------------------------------------

    /// Apply a lifecycle event from the viewer mounted for `token`.
    /// Events for any other slide entry are stale and ignored.
    pub fn handle_lifecycle(
        &mut self,
        token: SlideToken,
        event: ViewerLifecycleEvent,
        now: Timestamp,
    ) -> Option<Transition> {
        if !self.is_current(token) {
            tracing::debug!("stale {:?} for slide {}", event, token.index.as_usize());
            return None;
        }
        let mut session = self.session?;
        if session.suspended {
            return None;
        }

        match event {
            ViewerLifecycleEvent::ContentReady => {
                if session.phase != SlidePhase::Loading {
                    tracing::debug!("duplicate ContentReady for slide {}", token.index.as_usize());
                    return None;
                }
                if session.interaction_open {
                    session.phase = SlidePhase::Paused;
                    self.session = Some(session);
                } else {
                    session.phase = SlidePhase::Running;
                    self.session = Some(session);
                    self.arm(now, self.settle_delay_us);
                }
                None
            }
            ViewerLifecycleEvent::InteractionBegin => {
                session.interaction_open = true;
                if session.phase == SlidePhase::Running {
                    session.phase = SlidePhase::Paused;
                    // Remaining time is discarded; resume restarts the full duration.
                    self.timers.cancel(TimerKind::AutoAdvance);
                }
                self.session = Some(session);
                None
            }
            ViewerLifecycleEvent::InteractionEnd => {
                session.interaction_open = false;
                let resumed = session.phase == SlidePhase::Paused;
                if resumed {
                    session.phase = SlidePhase::Running;
                }
                self.session = Some(session);
                if resumed {
                    self.arm(now, 0);
                }
                None
            }
            ViewerLifecycleEvent::ContentEnded => {
                let target = self.step(token.index, 1)?;
                Some(self.enter(target, AdvanceReason::ContentEnded, now))
            }
        }
    }

    // -------------------------------------------------------------------------
    // Navigation
    // -------------------------------------------------------------------------

    /// Navigation is locked while a freshly entered slide loads, for at most
    /// `loading_nav_lock_us`, and while the player is suspended.
    pub fn is_navigation_locked(&self, now: Timestamp) -> bool {
        match self.session {
            Some(session) => {
                session.suspended
                    || (session.phase == SlidePhase::Loading
                        && now.since(session.entered_at) < self.loading_nav_lock_us)
            }
            None => true,
        }
    }

    fn step(&self, from: SlideIndex, forward: i8) -> Option<SlideIndex> {
        let len = self.playlist.as_ref()?.len();
        if len == 0 {
            return None;
        }
        Some(if forward >= 0 {
            from.next(len)
        } else {
            from.previous(len)
        })
    }

    fn check_navigable(&self, now: Timestamp) -> Result<SlideToken, PlayerError> {
        let token = self.current_token().ok_or(PlayerError::NoPlaylist)?;
        if self.is_navigation_locked(now) {
            return Err(PlayerError::NavigationLocked);
        }
        Ok(token)
    }

    pub fn next(&mut self, now: Timestamp) -> Result<Transition, PlayerError> {
        let token = self.check_navigable(now)?;
        let target = self.step(token.index, 1).ok_or(PlayerError::NoPlaylist)?;
        Ok(self.enter(target, AdvanceReason::Next, now))
    }

    pub fn previous(&mut self, now: Timestamp) -> Result<Transition, PlayerError> {
        let token = self.check_navigable(now)?;
        let target = self.step(token.index, -1).ok_or(PlayerError::NoPlaylist)?;
        Ok(self.enter(target, AdvanceReason::Previous, now))
    }

    /// Jump to `index`. Selecting the slide already shown changes nothing.
    pub fn select(&mut self, index: SlideIndex, now: Timestamp) -> Result<Option<Transition>, PlayerError> {
        let token = self.check_navigable(now)?;
        let len = self.playlist.as_ref().map(Playlist::len).unwrap_or(0);
        if index.as_usize() >= len {
            return Err(PlayerError::out_of_range(index, len));
        }
        if index == token.index {
            return Ok(None);
        }
        Ok(Some(self.enter(index, AdvanceReason::Select, now)))
    }

    // -------------------------------------------------------------------------
    // Timers
    // -------------------------------------------------------------------------

    pub fn schedule_viewer_timer(
        &mut self,
        token: SlideToken,
        timer: ViewerTimer,
        delay_us: u64,
        now: Timestamp,
    ) -> bool {
        if !self.is_current(token) || self.is_suspended() {
            return false;
        }
        self.timers
            .schedule(token, TimerKind::Viewer(timer), now.after(delay_us));
        true
    }

    pub fn cancel_viewer_timer(&mut self, token: SlideToken, timer: ViewerTimer) -> bool {
        self.is_current(token) && self.timers.cancel(TimerKind::Viewer(timer))
    }

    /// Fire the earliest timer due at `now`, if any. Call repeatedly until `None`.
    pub fn pop_due_timer(&mut self, now: Timestamp) -> Option<FiredTimer> {
        while let Some(fired) = self.timers.pop_due(now) {
            if !self.is_current(fired.token) {
                continue;
            }
            match fired.kind {
                TimerKind::AutoAdvance => {
                    let target = self.step(fired.token.index, 1)?;
                    return Some(FiredTimer::Advanced(self.enter(
                        target,
                        AdvanceReason::AutoAdvance,
                        now,
                    )));
                }
                TimerKind::Viewer(timer) => {
                    return Some(FiredTimer::Viewer {
                        token: fired.token,
                        timer,
                    });
                }
            }
        }
        None
    }

    // -------------------------------------------------------------------------
    // Visibility
    // -------------------------------------------------------------------------

    /// Hold playback while the player is hidden. Returns the suspended slide.
    pub fn suspend(&mut self) -> Option<SlideToken> {
        let mut session = self.session?;
        if session.suspended {
            return None;
        }
        session.suspended = true;
        self.session = Some(session);
        self.timers.cancel_all();
        tracing::debug!("playback suspended on slide {}", session.token.index.as_usize());
        Some(session.token)
    }

    /// Re-enter the suspended slide from `SlideLoading`.
    pub fn resume(&mut self, now: Timestamp) -> Option<Transition> {
        let session = self.session?;
        if !session.suspended {
            return None;
        }
        Some(self.enter(session.token.index, AdvanceReason::Resume, now))
    }
}
