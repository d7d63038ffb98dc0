//! Player configuration with sensible defaults for every field, so a page
//! can override just the bits it cares about (usually only `track_src`).

use serde::{Deserialize, Serialize};

/// Id of the optional inline JSON config block a page may embed:
/// `<script type="application/json" id="everplay-config">{...}</script>`
pub const CONFIG_ELEMENT_ID: &str = "everplay-config";

/// Settings for the playback continuity controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSettings {
    /// Source URL of the looping background track.
    #[serde(default = "default_track_src")]
    pub track_src: String,
    /// Ceiling the fade-in ramps up to. Deliberately below full volume.
    #[serde(default = "default_target_volume")]
    pub target_volume: f64,
    #[serde(default = "default_fade_duration_ms")]
    pub fade_duration_ms: u32,
    #[serde(default = "default_fade_step_ms")]
    pub fade_step_ms: u32,
    /// Cadence of the position-persistence timer. A tunable, not a contract.
    #[serde(default = "default_persist_interval_ms")]
    pub persist_interval_ms: u32,
    /// Prefix for the localStorage keys, see [`crate::session`].
    #[serde(default = "default_storage_prefix")]
    pub storage_prefix: String,
    #[serde(default = "default_audio_element_id")]
    pub audio_element_id: String,
    #[serde(default = "default_toggle_button_id")]
    pub toggle_button_id: String,
    #[serde(default = "default_toggle_icon_id")]
    pub toggle_icon_id: String,
    /// Id of the page-local narrated clip, when one exists.
    #[serde(default = "default_voice_note_id")]
    pub voice_note_id: String,
    #[serde(default = "default_overlay_text")]
    pub overlay_text: String,
    #[serde(default = "default_muted_icon")]
    pub muted_icon: String,
    #[serde(default = "default_unmuted_icon")]
    pub unmuted_icon: String,
}

fn default_track_src() -> String {
    "song.mp3".to_string()
}

fn default_target_volume() -> f64 {
    0.55
}

fn default_fade_duration_ms() -> u32 {
    1200
}

fn default_fade_step_ms() -> u32 {
    30
}

fn default_persist_interval_ms() -> u32 {
    1000
}

fn default_storage_prefix() -> String {
    "everplay".to_string()
}

fn default_audio_element_id() -> String {
    "everplay-audio".to_string()
}

fn default_toggle_button_id() -> String {
    "musicToggleBtn".to_string()
}

fn default_toggle_icon_id() -> String {
    "musicIcon".to_string()
}

fn default_voice_note_id() -> String {
    "voiceNote".to_string()
}

fn default_overlay_text() -> String {
    "Tap to begin".to_string()
}

fn default_muted_icon() -> String {
    "🔇".to_string()
}

fn default_unmuted_icon() -> String {
    "🎵".to_string()
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            track_src: default_track_src(),
            target_volume: default_target_volume(),
            fade_duration_ms: default_fade_duration_ms(),
            fade_step_ms: default_fade_step_ms(),
            persist_interval_ms: default_persist_interval_ms(),
            storage_prefix: default_storage_prefix(),
            audio_element_id: default_audio_element_id(),
            toggle_button_id: default_toggle_button_id(),
            toggle_icon_id: default_toggle_icon_id(),
            voice_note_id: default_voice_note_id(),
            overlay_text: default_overlay_text(),
            muted_icon: default_muted_icon(),
            unmuted_icon: default_unmuted_icon(),
        }
    }
}

impl PlayerSettings {
    /// Parse a page-provided JSON config. Unknown fields are ignored and
    /// missing fields fall back to defaults.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Target volume clamped to the valid element range.
    pub fn clamped_target_volume(&self) -> f64 {
        self.target_volume.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_fills_defaults() {
        let settings = PlayerSettings::from_json(r#"{"track_src":"theme.ogg"}"#).unwrap();
        assert_eq!(settings.track_src, "theme.ogg");
        assert_eq!(settings.target_volume, 0.55);
        assert_eq!(settings.persist_interval_ms, 1000);
        assert_eq!(settings.toggle_button_id, "musicToggleBtn");
    }

    #[test]
    fn empty_config_is_default() {
        let settings = PlayerSettings::from_json("{}").unwrap();
        assert_eq!(settings, PlayerSettings::default());
    }

    #[test]
    fn garbage_config_is_an_error() {
        assert!(PlayerSettings::from_json("not json").is_err());
    }

    #[test]
    fn target_volume_is_clamped() {
        let settings = PlayerSettings::from_json(r#"{"target_volume":1.8}"#).unwrap();
        assert_eq!(settings.clamped_target_volume(), 1.0);
    }
}
