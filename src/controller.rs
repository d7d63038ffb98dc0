//! The per-page player: owns the audio element, the continuity state
//! machine, the fade task, and the persisted session, and routes DOM
//! events through the machine.

use std::cell::RefCell;
use std::rc::Rc;

use gloo_console::{debug, warn};
use gloo_timers::callback::Interval;
use gloo_timers::future::TimeoutFuture;
use thiserror::Error;
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{HtmlAudioElement, HtmlElement};

use crate::dom;
use crate::fade::{FadeRamp, FadeTask};
use crate::session::{BrowserStore, SessionStore};
use crate::settings::{PlayerSettings, CONFIG_ELEMENT_ID};
use crate::state::{Continuity, DeferredSeek, Effect, Event};

/// `HTMLMediaElement.readyState` at which seeking is safe.
const HAVE_METADATA: u16 = 1;

#[derive(Debug, Error)]
pub enum BootError {
    #[error("no document available")]
    NoDocument,
    #[error("could not create the background audio element")]
    AudioElement,
}

/// One controller per page load. Discarded on navigation; only the
/// persisted session survives.
pub struct Player {
    audio: HtmlAudioElement,
    settings: PlayerSettings,
    machine: Continuity,
    store: BrowserStore,
    fade: FadeTask,
    overlay: Option<HtmlElement>,
    pending_seek: DeferredSeek,
}

type Shared = Rc<RefCell<Player>>;

thread_local! {
    // Keeps the controller alive for the lifetime of the page.
    static PLAYER: RefCell<Option<Shared>> = const { RefCell::new(None) };
}

/// Boot now, or on `DOMContentLoaded` if the document is still loading.
pub fn boot_when_ready() {
    let Some(document) = dom::document() else {
        return;
    };
    if document.ready_state() == "loading" {
        dom::listen_once(&document, "DOMContentLoaded", || report_boot(boot()));
    } else {
        report_boot(boot());
    }
}

fn report_boot(result: Result<(), BootError>) {
    if let Err(err) = result {
        warn!(format!("everplay: boot failed: {err}"));
    }
}

fn boot() -> Result<(), BootError> {
    if dom::document().is_none() {
        return Err(BootError::NoDocument);
    }

    let settings = load_settings();
    let store = BrowserStore::new(&settings.storage_prefix);
    let machine = Continuity::new(&store.load());
    let audio = dom::get_or_create_audio_element(&settings).ok_or(BootError::AudioElement)?;

    dom::update_toggle_button(&settings, machine.is_muted());

    let player = Rc::new(RefCell::new(Player {
        audio,
        settings,
        machine,
        store,
        fade: FadeTask::new(),
        overlay: None,
        pending_seek: DeferredSeek::default(),
    }));

    wire_toggle_button(&player);
    wire_voice_note(&player);
    start_position_persistence(&player);
    wire_unload_flush(&player);

    dispatch(&player, Event::Start);

    PLAYER.with(|slot| *slot.borrow_mut() = Some(player));
    Ok(())
}

fn load_settings() -> PlayerSettings {
    let Some(raw) = dom::read_inline_config(CONFIG_ELEMENT_ID) else {
        return PlayerSettings::default();
    };
    match PlayerSettings::from_json(&raw) {
        Ok(settings) => settings,
        Err(err) => {
            warn!(format!("everplay: invalid inline config, using defaults: {err}"));
            PlayerSettings::default()
        }
    }
}

/// Run an event through the machine and apply the resulting effects.
fn dispatch(player: &Shared, event: Event) {
    let effects = player.borrow_mut().machine.handle(event);
    for effect in effects {
        apply_effect(player, effect);
    }
}

/// Dispatch after yielding to the event loop, for call sites that would
/// otherwise re-enter the controller borrow.
fn defer_dispatch(player: &Shared, event: Event) {
    let player = Rc::clone(player);
    spawn_local(async move {
        TimeoutFuture::new(0).await;
        dispatch(&player, event);
    });
}

fn apply_effect(player: &Shared, effect: Effect) {
    match effect {
        Effect::SeekToSaved => seek_to_saved(player),
        Effect::RequestPlay => request_play(player),
        Effect::FadeToTarget => {
            let mut p = player.borrow_mut();
            let ramp = FadeRamp::new(
                p.audio.volume(),
                p.settings.clamped_target_volume(),
                p.settings.fade_duration_ms,
                p.settings.fade_step_ms,
            );
            let audio = p.audio.clone();
            let step_ms = p.settings.fade_step_ms;
            p.fade.start(audio, ramp, step_ms);
        }
        Effect::CutVolume => {
            let mut p = player.borrow_mut();
            p.fade.cancel();
            p.audio.set_volume(0.0);
        }
        Effect::ShowOverlay => show_overlay(player),
        Effect::HideOverlay => {
            if let Some(overlay) = player.borrow_mut().overlay.take() {
                dom::fade_out_and_remove(overlay);
            }
        }
        Effect::PersistUnlocked => player.borrow_mut().store.save_unlocked(true),
        Effect::PersistMuted(muted) => {
            let mut p = player.borrow_mut();
            p.store.save_muted(muted);
            dom::update_toggle_button(&p.settings, muted);
        }
        Effect::PauseBackground => {
            let _ = player.borrow().audio.pause();
        }
        Effect::ResumePlayback => resume_playback(player),
    }
}

/// Restore the persisted position, deferring the seek to `loadedmetadata`
/// when the track's metadata is not in yet. Seeking earlier would throw
/// and lose the resume point. Repeat requests before metadata arrives
/// retarget the one armed listener instead of stacking more.
fn seek_to_saved(player: &Shared) {
    let (audio, position) = {
        let p = player.borrow();
        (p.audio.clone(), p.store.load().position)
    };
    if position <= 0.0 {
        return;
    }
    if audio.ready_state() >= HAVE_METADATA {
        audio.set_current_time(position);
        return;
    }
    if !player.borrow_mut().pending_seek.request(position) {
        return;
    }
    let handle = Rc::clone(player);
    let deferred = audio.clone();
    dom::listen_once(&audio, "loadedmetadata", move || {
        if let Some(position) = handle.borrow_mut().pending_seek.take() {
            deferred.set_current_time(position);
        }
    });
}

/// Issue the play request and report its settlement back as an event.
/// A rejection is the expected autoplay-blocked signal, never an error.
fn request_play(player: &Shared) {
    let audio = player.borrow().audio.clone();
    match audio.play() {
        Ok(promise) => {
            let player = Rc::clone(player);
            spawn_local(async move {
                match JsFuture::from(promise).await {
                    Ok(_) => dispatch(&player, Event::PlayResolved),
                    Err(_) => dispatch(&player, Event::PlayRejected),
                }
            });
        }
        // A synchronous throw counts as blocked too.
        Err(_) => defer_dispatch(player, Event::PlayRejected),
    }
}

/// Resume after ducking. Best-effort: the gesture that started the voice
/// note already unlocked the page, so a rejection here is not expected.
fn resume_playback(player: &Shared) {
    let audio = player.borrow().audio.clone();
    match audio.play() {
        Ok(promise) => spawn_local(async move {
            if JsFuture::from(promise).await.is_err() {
                warn!("everplay: resume after narration was rejected");
            }
        }),
        Err(_) => warn!("everplay: resume after narration was rejected"),
    }
}

/// Show the overlay, or re-arm its consumed one-shot listeners when a
/// gesture-initiated play was rejected again and the overlay is already
/// up.
fn show_overlay(player: &Shared) {
    if let Some(overlay) = player.borrow().overlay.clone() {
        arm_overlay(player, &overlay);
        return;
    }
    let settings = player.borrow().settings.clone();
    let Some(overlay) = dom::build_overlay(&settings) else {
        return;
    };
    arm_overlay(player, &overlay);
    player.borrow_mut().overlay = Some(overlay);
}

fn arm_overlay(player: &Shared, overlay: &HtmlElement) {
    // A stale listener left over from a previous arming can fire an extra
    // gesture; the machine ignores it outside `Blocked`.
    for event in ["click", "touchstart"] {
        let player = Rc::clone(player);
        dom::listen_once(overlay, event, move || dispatch(&player, Event::Gesture));
    }
}

fn wire_toggle_button(player: &Shared) {
    let button_id = player.borrow().settings.toggle_button_id.clone();
    let Some(button) = dom::document().and_then(|d| d.get_element_by_id(&button_id)) else {
        debug!("everplay: no mute control on this page");
        return;
    };
    let player = Rc::clone(player);
    dom::listen(&button, "click", move || {
        dispatch(&player, Event::MuteToggled);
    });
}

fn wire_voice_note(player: &Shared) {
    let settings = player.borrow().settings.clone();
    let Some(voice) = dom::find_voice_note(&settings) else {
        return;
    };
    {
        let player = Rc::clone(player);
        dom::listen(&voice, "play", move || {
            dispatch(&player, Event::VoiceStarted);
        });
    }
    // `ended` also fires `pause`; the machine treats the second as a no-op.
    for event in ["pause", "ended"] {
        let player = Rc::clone(player);
        dom::listen(&voice, event, move || {
            dispatch(&player, Event::VoiceEnded);
        });
    }
}

/// Repeating position write for the page's whole lifetime, plus a
/// best-effort flush right before navigation to shrink the staleness
/// window.
fn start_position_persistence(player: &Shared) {
    let interval_ms = player.borrow().settings.persist_interval_ms.max(250);
    let player = Rc::clone(player);
    Interval::new(interval_ms, move || persist_position(&player)).forget();
}

fn wire_unload_flush(player: &Shared) {
    let Some(window) = web_sys::window() else {
        return;
    };
    let player = Rc::clone(player);
    dom::listen(&window, "beforeunload", move || persist_position(&player));
}

fn persist_position(player: &Shared) {
    let mut p = player.borrow_mut();
    if p.machine.should_persist_position() && !p.audio.paused() {
        let position = p.audio.current_time();
        p.store.save_position(position);
    }
}
