//! Background / confirmation audio.
//!
//! Browsers usually reject autoplay until the user interacts with the page, so
//! the looping track is started optimistically on load and, if the play
//! promise rejects, retried exactly once on the first click or touch. Pressing
//! "Yes" moves to the terminal `StoppedConfirmed` state: the looping track is
//! discarded, every other `<audio>` on the page is silenced, and the one-shot
//! confirmation track starts (with a single delayed retry if it is refused).
//!
//! The state machine never touches the DOM itself. It drives an `AudioSink`,
//! and the sink reports asynchronous play outcomes back through
//! `background_outcome` / `confirmation_outcome`. Outcomes may arrive after
//! the state has moved on, so every callback re-checks the current state.

use crate::config::{AudioConfig, TrackSpec};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    /// Looping track created and `play()` issued, or refused and waiting for
    /// the first gesture.
    AttemptingAutoplay,
    PlayingBackground,
    StoppedConfirmed,
}

/// Side of the audio stack that actually owns media elements.
pub trait AudioSink {
    /// Create the looping track and issue `play()`.
    fn start_background(&mut self, track: &TrackSpec);
    /// Issue `play()` again on the existing looping track.
    fn resume_background(&mut self);
    /// Pause, rewind, mute and drop the looping track; no-op without one.
    fn discard_background(&mut self);
    /// Pause and mute every other audio element on the page.
    fn silence_others(&mut self);
    /// Create the one-shot track and issue `play()`.
    fn play_confirmation(&mut self, track: &TrackSpec);
    /// Arrange for `confirmation_retry_due` to be called after `delay_ms`.
    fn schedule_confirmation_retry(&mut self, delay_ms: u32);
    /// Issue `play()` again on the existing one-shot track.
    fn replay_confirmation(&mut self);
}

pub struct PlaybackBootstrapper {
    audio: AudioConfig,
    state: PlaybackState,
    /// True until the first gesture (or confirmation) consumes it.
    gesture_armed: bool,
    confirmation_attempts: u8,
}

impl PlaybackBootstrapper {
    pub fn new(audio: AudioConfig) -> Self {
        Self { audio, state: PlaybackState::Idle, gesture_armed: true, confirmation_attempts: 0 }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Whether the page should still listen for the first gesture.
    pub fn gesture_armed(&self) -> bool {
        self.gesture_armed
    }

    /// Start the looping track. Only the first call does anything, so it is
    /// fine to call this both at script start and on window `load`.
    pub fn start<S: AudioSink + ?Sized>(&mut self, sink: &mut S) -> bool {
        if self.state != PlaybackState::Idle {
            return false;
        }
        self.state = PlaybackState::AttemptingAutoplay;
        tracing::debug!(src = %self.audio.background.src, "starting background music");
        sink.start_background(&self.audio.background);
        true
    }

    /// Outcome of any `play()` on the looping track.
    pub fn background_outcome<S: AudioSink + ?Sized>(&mut self, sink: &mut S, outcome: Result<(), String>) {
        match (self.state, outcome) {
            (PlaybackState::StoppedConfirmed, Ok(())) => {
                tracing::debug!("background play resolved after confirmation; discarding");
                sink.discard_background();
            }
            (PlaybackState::StoppedConfirmed, Err(_)) => {}
            (_, Ok(())) => {
                self.state = PlaybackState::PlayingBackground;
                tracing::info!("background music playing");
            }
            (_, Err(reason)) if self.gesture_armed => {
                tracing::info!(%reason, "background music autoplay prevented - will play on first interaction");
            }
            (_, Err(reason)) => {
                tracing::warn!(%reason, "background music playback failed");
            }
        }
    }

    /// First click / touch anywhere on the page. Returns whether a playback
    /// attempt was issued; at most one call ever returns true.
    pub fn on_gesture<S: AudioSink + ?Sized>(&mut self, sink: &mut S) -> bool {
        if !self.gesture_armed {
            return false;
        }
        self.gesture_armed = false;
        if self.state != PlaybackState::AttemptingAutoplay {
            return false;
        }
        tracing::debug!("retrying background music on first gesture");
        sink.resume_background();
        true
    }

    /// The "Yes" gesture. Returns false when already confirmed.
    pub fn confirm<S: AudioSink + ?Sized>(&mut self, sink: &mut S) -> bool {
        if self.state == PlaybackState::StoppedConfirmed {
            tracing::debug!("confirmation already handled");
            return false;
        }
        self.gesture_armed = false;
        if self.state != PlaybackState::Idle {
            sink.discard_background();
        }
        sink.silence_others();
        self.state = PlaybackState::StoppedConfirmed;
        self.confirmation_attempts = 1;
        tracing::info!(src = %self.audio.confirmation.src, "playing confirmation track");
        sink.play_confirmation(&self.audio.confirmation);
        true
    }

    /// Outcome of a `play()` on the one-shot track.
    pub fn confirmation_outcome<S: AudioSink + ?Sized>(&mut self, sink: &mut S, outcome: Result<(), String>) {
        match outcome {
            Ok(()) => tracing::debug!(attempt = self.confirmation_attempts, "confirmation track playing"),
            Err(reason) if self.confirmation_attempts < 2 => {
                tracing::info!(%reason, delay_ms = self.audio.confirmation_retry_ms, "confirmation track refused, retrying");
                sink.schedule_confirmation_retry(self.audio.confirmation_retry_ms);
            }
            Err(reason) => tracing::warn!(%reason, "confirmation track failed"),
        }
    }

    /// Called by the sink when the delay scheduled above elapses.
    pub fn confirmation_retry_due<S: AudioSink + ?Sized>(&mut self, sink: &mut S) {
        if self.state != PlaybackState::StoppedConfirmed || self.confirmation_attempts >= 2 {
            return;
        }
        self.confirmation_attempts += 1;
        sink.replay_confirmation();
    }
}
