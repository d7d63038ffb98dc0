//! Browser glue: element lookup/creation, the unlock overlay, the mute
//! control, and event-listener plumbing. Everything here is best-effort;
//! a missing element skips the dependent wiring instead of failing.

use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::{window, AddEventListenerOptions, Document, EventTarget, HtmlAudioElement, HtmlElement};

use crate::settings::PlayerSettings;

pub const OVERLAY_ELEMENT_ID: &str = "everplay-overlay";

pub fn document() -> Option<Document> {
    window()?.document()
}

/// Initialize the background audio element once per page. The element is
/// looked up by id first so a double boot cannot create a second track.
pub fn get_or_create_audio_element(settings: &PlayerSettings) -> Option<HtmlAudioElement> {
    let document = document()?;

    if let Some(existing) = document.get_element_by_id(&settings.audio_element_id) {
        return existing.dyn_into::<HtmlAudioElement>().ok();
    }

    let audio: HtmlAudioElement = document.create_element("audio").ok()?.dyn_into().ok()?;
    audio.set_id(&settings.audio_element_id);
    audio.set_src(&settings.track_src);
    audio.set_loop(true);
    audio.set_attribute("preload", "auto").ok()?;
    // Start silent so a successful start fades in instead of popping.
    audio.set_volume(0.0);
    document.body()?.append_child(&audio).ok()?;

    Some(audio)
}

/// The page-local narrated clip, when this page has one.
pub fn find_voice_note(settings: &PlayerSettings) -> Option<HtmlAudioElement> {
    document()?
        .get_element_by_id(&settings.voice_note_id)?
        .dyn_into::<HtmlAudioElement>()
        .ok()
}

/// Inline JSON config block, when the page embeds one.
pub fn read_inline_config(element_id: &str) -> Option<String> {
    let text = document()?.get_element_by_id(element_id)?.text_content()?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Build the full-viewport "tap to begin" overlay and attach it to the
/// body. The caller wires the activation handlers.
pub fn build_overlay(settings: &PlayerSettings) -> Option<HtmlElement> {
    let document = document()?;
    let overlay: HtmlElement = document.create_element("div").ok()?.dyn_into().ok()?;
    overlay.set_id(OVERLAY_ELEMENT_ID);
    overlay.set_text_content(Some(&settings.overlay_text));

    let style = overlay.style();
    let _ = style.set_property("position", "fixed");
    let _ = style.set_property("inset", "0");
    let _ = style.set_property("display", "flex");
    let _ = style.set_property("align-items", "center");
    let _ = style.set_property("justify-content", "center");
    let _ = style.set_property("background", "rgba(0, 0, 0, 0.75)");
    let _ = style.set_property("color", "#fff");
    let _ = style.set_property("font-size", "1.4rem");
    let _ = style.set_property("cursor", "pointer");
    let _ = style.set_property("user-select", "none");
    let _ = style.set_property("z-index", "9999");
    let _ = style.set_property("opacity", "1");
    let _ = style.set_property("transition", "opacity 0.4s ease");

    document.body()?.append_child(&overlay).ok()?;
    Some(overlay)
}

/// Fade the overlay out, then detach it once the transition has run.
pub fn fade_out_and_remove(overlay: HtmlElement) {
    let _ = overlay.style().set_property("opacity", "0");
    gloo_timers::callback::Timeout::new(450, move || {
        overlay.remove();
    })
    .forget();
}

/// Reflect the mute state on the page's toggle control, when present.
pub fn update_toggle_button(settings: &PlayerSettings, muted: bool) {
    let Some(document) = document() else {
        return;
    };
    if let Some(icon) = document.get_element_by_id(&settings.toggle_icon_id) {
        let glyph = if muted {
            &settings.muted_icon
        } else {
            &settings.unmuted_icon
        };
        icon.set_text_content(Some(glyph));
    }
    if let Some(button) = document.get_element_by_id(&settings.toggle_button_id) {
        let label = if muted { "Unmute music" } else { "Mute music" };
        let _ = button.set_attribute("aria-label", label);
        let class_list = button.class_list();
        let _ = if muted {
            class_list.add_1("muted")
        } else {
            class_list.remove_1("muted")
        };
    }
}

/// Attach a listener for the page's lifetime. The closure is leaked; it
/// has to outlive every future dispatch of the event.
pub fn listen(target: &EventTarget, event: &str, callback: impl FnMut() + 'static) {
    let closure = Closure::wrap(Box::new(callback) as Box<dyn FnMut()>);
    let _ = target.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref());
    closure.forget();
}

/// Attach a one-shot listener that the browser removes after the first
/// activation, so a double tap cannot double-start playback.
pub fn listen_once(target: &EventTarget, event: &str, callback: impl FnOnce() + 'static) {
    let closure = Closure::once_into_js(callback);
    let options = AddEventListenerOptions::new();
    options.set_once(true);
    let _ = target.add_event_listener_with_callback_and_add_event_listener_options(
        event,
        closure.unchecked_ref::<js_sys::Function>(),
        &options,
    );
}
