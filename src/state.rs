//! The playback continuity state machine, kept free of browser types so the
//! autoplay-fallback logic is testable without a real audio element.
//!
//! The browser layer feeds [`Event`]s in and applies the returned
//! [`Effect`]s; the machine itself never touches the DOM, timers, or
//! storage.

use crate::session::Session;

/// Phase of the start protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Page just loaded, nothing attempted yet.
    Idle,
    /// A play request is in flight and has not settled.
    Attempting,
    /// Autoplay was rejected; the unlock overlay is waiting for a gesture.
    Blocked,
    Playing,
}

/// Inputs from the page: async playback outcomes and user actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Kick off the start protocol.
    Start,
    /// The play request's promise resolved.
    PlayResolved,
    /// The play request was rejected (autoplay blocked).
    PlayRejected,
    /// The user activated the unlock overlay.
    Gesture,
    /// The mute control was clicked.
    MuteToggled,
    /// The page-local narrated clip began playing.
    VoiceStarted,
    /// The narrated clip ended, or was paused before its end.
    VoiceEnded,
}

/// Side effects for the browser layer to carry out, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Seek the background track to the persisted position.
    SeekToSaved,
    /// Issue a play request and report the outcome back as an event.
    RequestPlay,
    /// Ramp volume from its current level to the configured target.
    FadeToTarget,
    /// Cancel any running fade and set volume to zero. Does not pause.
    CutVolume,
    ShowOverlay,
    HideOverlay,
    /// Write-through of the unlocked flag (always `true`).
    PersistUnlocked,
    /// Write-through of the mute flag, then update the control's icon.
    PersistMuted(bool),
    /// Pause the background track (ducking for the narrated clip).
    PauseBackground,
    /// Resume playing from the element's current position.
    ResumePlayback,
}

/// Cross-page playback continuity, one instance per page load.
#[derive(Debug, Clone)]
pub struct Continuity {
    phase: Phase,
    muted: bool,
    unlocked: bool,
    /// Background track is yielding to the narrated clip.
    ducked: bool,
    /// An overlay effect has been emitted and not yet hidden.
    overlay_shown: bool,
}

impl Continuity {
    pub fn new(session: &Session) -> Self {
        Self {
            phase: Phase::Idle,
            muted: session.muted,
            unlocked: session.unlocked,
            ducked: false,
            overlay_shown: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    pub fn is_ducked(&self) -> bool {
        self.ducked
    }

    /// The persisted position may only be overwritten while the track is
    /// actively playing and not yielding to the narrated clip; a stale
    /// write here would clobber a valid resume point.
    pub fn should_persist_position(&self) -> bool {
        self.phase == Phase::Playing && !self.ducked
    }

    /// Advance the machine and return the effects to apply, in order.
    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        match event {
            Event::Start => self.on_start(),
            Event::PlayResolved => self.on_play_resolved(),
            Event::PlayRejected => self.on_play_rejected(),
            Event::Gesture => self.on_gesture(),
            Event::MuteToggled => self.on_mute_toggled(),
            Event::VoiceStarted => self.on_voice_started(),
            Event::VoiceEnded => self.on_voice_ended(),
        }
    }

    fn on_start(&mut self) -> Vec<Effect> {
        // Re-entrant starts must not double anything.
        if self.phase != Phase::Idle {
            return Vec::new();
        }
        // Even on a first-ever visit the attempt goes out without an
        // overlay; the overlay only appears if the browser rejects it.
        self.phase = Phase::Attempting;
        vec![Effect::SeekToSaved, Effect::RequestPlay]
    }

    fn on_play_resolved(&mut self) -> Vec<Effect> {
        if self.phase == Phase::Playing {
            return Vec::new();
        }
        self.phase = Phase::Playing;

        let mut effects = Vec::new();
        if self.overlay_shown {
            self.overlay_shown = false;
            effects.push(Effect::HideOverlay);
        }
        if !self.unlocked {
            self.unlocked = true;
            effects.push(Effect::PersistUnlocked);
        }
        if self.ducked {
            // The narrated clip won playback in the meantime; stay silent
            // and paused until it finishes.
            effects.push(Effect::CutVolume);
            effects.push(Effect::PauseBackground);
        } else if self.muted {
            effects.push(Effect::CutVolume);
        } else {
            effects.push(Effect::FadeToTarget);
        }
        effects
    }

    fn on_play_rejected(&mut self) -> Vec<Effect> {
        if self.phase != Phase::Attempting {
            return Vec::new();
        }
        self.phase = Phase::Blocked;
        self.overlay_shown = true;
        vec![Effect::ShowOverlay]
    }

    fn on_gesture(&mut self) -> Vec<Effect> {
        if self.phase != Phase::Blocked {
            return Vec::new();
        }
        self.phase = Phase::Attempting;
        vec![Effect::SeekToSaved, Effect::RequestPlay]
    }

    fn on_mute_toggled(&mut self) -> Vec<Effect> {
        self.muted = !self.muted;
        // Persist before any UI or volume change is visible.
        let mut effects = vec![Effect::PersistMuted(self.muted)];

        if self.muted {
            // Volume drops but playback continues so position tracking
            // keeps running.
            effects.push(Effect::CutVolume);
            return effects;
        }

        match self.phase {
            Phase::Playing if !self.ducked => effects.push(Effect::FadeToTarget),
            // Ducked: the voice note's end will bring the fade back.
            Phase::Playing => {}
            // Never started (or still blocked): unmuting re-runs the start
            // protocol.
            Phase::Idle | Phase::Blocked => {
                self.phase = Phase::Attempting;
                effects.push(Effect::SeekToSaved);
                effects.push(Effect::RequestPlay);
            }
            // In flight; the pending resolution will fade in.
            Phase::Attempting => {}
        }
        effects
    }

    fn on_voice_started(&mut self) -> Vec<Effect> {
        if self.ducked {
            return Vec::new();
        }
        self.ducked = true;
        if self.phase == Phase::Playing {
            // Volume must hit zero before the pause so no audible frame
            // competes with the narration.
            vec![Effect::CutVolume, Effect::PauseBackground]
        } else {
            Vec::new()
        }
    }

    fn on_voice_ended(&mut self) -> Vec<Effect> {
        if !self.ducked {
            return Vec::new();
        }
        self.ducked = false;
        if self.phase != Phase::Playing {
            return Vec::new();
        }
        let mut effects = vec![Effect::ResumePlayback];
        if !self.muted {
            effects.push(Effect::FadeToTarget);
        }
        effects
    }
}

/// Bookkeeping for seeks requested before the track's metadata is loaded:
/// at most one deferred seek is armed at a time, and repeat requests
/// retarget it instead of stacking listeners.
#[derive(Debug, Default)]
pub struct DeferredSeek {
    pending: Option<f64>,
}

impl DeferredSeek {
    /// Record a seek target. Returns true when the caller must arm the
    /// one-shot metadata listener, false when one is already armed.
    pub fn request(&mut self, position: f64) -> bool {
        let armed = self.pending.is_some();
        self.pending = Some(position);
        !armed
    }

    /// Consume the pending target when the metadata listener fires.
    pub fn take(&mut self) -> Option<f64> {
        self.pending.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Continuity {
        Continuity::new(&Session::default())
    }

    fn returning() -> Continuity {
        Continuity::new(&Session {
            position: 42.5,
            muted: false,
            unlocked: true,
        })
    }

    #[test]
    fn fresh_browser_autoplay_permitted() {
        let mut machine = fresh();
        assert_eq!(
            machine.handle(Event::Start),
            vec![Effect::SeekToSaved, Effect::RequestPlay]
        );
        assert_eq!(machine.phase(), Phase::Attempting);

        let effects = machine.handle(Event::PlayResolved);
        assert_eq!(effects, vec![Effect::PersistUnlocked, Effect::FadeToTarget]);
        assert_eq!(machine.phase(), Phase::Playing);
        assert!(machine.is_unlocked());
    }

    #[test]
    fn fresh_browser_blocked_then_tap() {
        let mut machine = fresh();
        machine.handle(Event::Start);

        assert_eq!(machine.handle(Event::PlayRejected), vec![Effect::ShowOverlay]);
        assert_eq!(machine.phase(), Phase::Blocked);
        assert!(!machine.is_unlocked());

        assert_eq!(
            machine.handle(Event::Gesture),
            vec![Effect::SeekToSaved, Effect::RequestPlay]
        );
        let effects = machine.handle(Event::PlayResolved);
        assert_eq!(
            effects,
            vec![
                Effect::HideOverlay,
                Effect::PersistUnlocked,
                Effect::FadeToTarget
            ]
        );
        assert!(machine.is_unlocked());
    }

    #[test]
    fn returning_browser_skips_overlay() {
        let mut machine = returning();
        assert_eq!(
            machine.handle(Event::Start),
            vec![Effect::SeekToSaved, Effect::RequestPlay]
        );
        // Already unlocked, so success does not re-persist the flag.
        assert_eq!(machine.handle(Event::PlayResolved), vec![Effect::FadeToTarget]);
    }

    #[test]
    fn start_is_idempotent_while_playing() {
        let mut machine = returning();
        machine.handle(Event::Start);
        machine.handle(Event::PlayResolved);

        assert!(machine.handle(Event::Start).is_empty());
        assert!(machine.handle(Event::PlayResolved).is_empty());
        assert_eq!(machine.phase(), Phase::Playing);
    }

    #[test]
    fn duplicate_rejections_do_not_stack_overlays() {
        let mut machine = fresh();
        machine.handle(Event::Start);
        machine.handle(Event::PlayRejected);
        assert!(machine.handle(Event::PlayRejected).is_empty());
    }

    #[test]
    fn rejection_after_gesture_shows_overlay_again() {
        let mut machine = fresh();
        machine.handle(Event::Start);
        machine.handle(Event::PlayRejected);
        machine.handle(Event::Gesture);

        // The overlay is re-shown (and its consumed one-shot listeners
        // re-armed) so the user keeps a retry path.
        assert_eq!(machine.handle(Event::PlayRejected), vec![Effect::ShowOverlay]);
        assert_eq!(machine.phase(), Phase::Blocked);
    }

    #[test]
    fn deferred_seek_arms_a_single_listener() {
        let mut seek = DeferredSeek::default();
        assert!(seek.request(42.5));
        // A second request before metadata arrives retargets the pending
        // seek instead of arming another listener.
        assert!(!seek.request(43.0));
        assert_eq!(seek.take(), Some(43.0));
        assert_eq!(seek.take(), None);
        // Once consumed, the next request arms again.
        assert!(seek.request(1.0));
    }

    #[test]
    fn gesture_outside_blocked_is_ignored() {
        let mut machine = fresh();
        assert!(machine.handle(Event::Gesture).is_empty());
        machine.handle(Event::Start);
        machine.handle(Event::PlayResolved);
        assert!(machine.handle(Event::Gesture).is_empty());
    }

    #[test]
    fn mute_while_playing_never_pauses() {
        let mut machine = returning();
        machine.handle(Event::Start);
        machine.handle(Event::PlayResolved);

        let effects = machine.handle(Event::MuteToggled);
        assert_eq!(effects, vec![Effect::PersistMuted(true), Effect::CutVolume]);
        assert!(!effects.contains(&Effect::PauseBackground));
        assert_eq!(machine.phase(), Phase::Playing);
        // Position tracking continues while muted.
        assert!(machine.should_persist_position());

        let effects = machine.handle(Event::MuteToggled);
        assert_eq!(
            effects,
            vec![Effect::PersistMuted(false), Effect::FadeToTarget]
        );
    }

    #[test]
    fn unmute_while_blocked_reruns_start() {
        let mut machine = fresh();
        machine.handle(Event::Start);
        machine.handle(Event::PlayRejected);

        // Mute, then unmute while still blocked.
        machine.handle(Event::MuteToggled);
        let effects = machine.handle(Event::MuteToggled);
        assert_eq!(
            effects,
            vec![
                Effect::PersistMuted(false),
                Effect::SeekToSaved,
                Effect::RequestPlay
            ]
        );
        assert_eq!(machine.phase(), Phase::Attempting);
    }

    #[test]
    fn mute_before_start_does_not_crash() {
        let mut machine = fresh();
        let effects = machine.handle(Event::MuteToggled);
        assert_eq!(effects, vec![Effect::PersistMuted(true), Effect::CutVolume]);
        assert_eq!(machine.phase(), Phase::Idle);
    }

    #[test]
    fn muted_start_plays_silently() {
        let mut machine = Continuity::new(&Session {
            position: 0.0,
            muted: true,
            unlocked: true,
        });
        machine.handle(Event::Start);
        // Playback proceeds at volume zero so the position keeps advancing.
        assert_eq!(machine.handle(Event::PlayResolved), vec![Effect::CutVolume]);
        assert!(machine.should_persist_position());
    }

    #[test]
    fn ducking_silences_before_pausing() {
        let mut machine = returning();
        machine.handle(Event::Start);
        machine.handle(Event::PlayResolved);

        let effects = machine.handle(Event::VoiceStarted);
        assert_eq!(effects, vec![Effect::CutVolume, Effect::PauseBackground]);
        assert!(machine.is_ducked());
        // No position writes while ducked.
        assert!(!machine.should_persist_position());

        let effects = machine.handle(Event::VoiceEnded);
        assert_eq!(effects, vec![Effect::ResumePlayback, Effect::FadeToTarget]);
        assert!(machine.should_persist_position());
    }

    #[test]
    fn duck_resume_honors_mute() {
        let mut machine = returning();
        machine.handle(Event::Start);
        machine.handle(Event::PlayResolved);
        machine.handle(Event::MuteToggled);

        machine.handle(Event::VoiceStarted);
        let effects = machine.handle(Event::VoiceEnded);
        assert_eq!(effects, vec![Effect::ResumePlayback]);
    }

    #[test]
    fn duplicate_voice_events_are_ignored() {
        let mut machine = returning();
        machine.handle(Event::Start);
        machine.handle(Event::PlayResolved);

        machine.handle(Event::VoiceStarted);
        assert!(machine.handle(Event::VoiceStarted).is_empty());
        machine.handle(Event::VoiceEnded);
        // "pause" followed by "ended" fires twice; the second is a no-op.
        assert!(machine.handle(Event::VoiceEnded).is_empty());
    }

    #[test]
    fn resolve_while_ducked_stays_silent() {
        let mut machine = returning();
        machine.handle(Event::Start);
        // The narrated clip starts while our play request is in flight.
        machine.handle(Event::VoiceStarted);

        let effects = machine.handle(Event::PlayResolved);
        assert_eq!(effects, vec![Effect::CutVolume, Effect::PauseBackground]);

        let effects = machine.handle(Event::VoiceEnded);
        assert_eq!(effects, vec![Effect::ResumePlayback, Effect::FadeToTarget]);
    }

    #[test]
    fn unmute_while_ducked_defers_the_fade() {
        let mut machine = returning();
        machine.handle(Event::Start);
        machine.handle(Event::PlayResolved);
        machine.handle(Event::MuteToggled);
        machine.handle(Event::VoiceStarted);

        // No fade while the narration is playing.
        let effects = machine.handle(Event::MuteToggled);
        assert_eq!(effects, vec![Effect::PersistMuted(false)]);

        let effects = machine.handle(Event::VoiceEnded);
        assert_eq!(effects, vec![Effect::ResumePlayback, Effect::FadeToTarget]);
    }
}
