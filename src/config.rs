//! Card configuration: every asset name, selector, timing and particle count
//! the page controller uses. `CardConfig::default()` reproduces the stock card;
//! hosts may override any subset through `start_card_with_config(json)`.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::celebration::{BatchSpec, ContentSpec, Layout};
use crate::error::{CardError, Result};

/// Upper bound for evasion distances; keeps the sampling range finite.
pub const MAX_EVASION_DISTANCE_PX: f64 = 10_000.0;

/// One audio asset and how it should be played.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct TrackSpec {
    pub src: String,
    pub volume: f64,
    pub looping: bool,
}

impl Default for TrackSpec {
    fn default() -> Self {
        Self { src: String::new(), volume: 1.0, looping: false }
    }
}

/// Element ids and selectors the controller looks up at start.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct Selectors {
    pub envelope: String,
    pub letter: String,
    pub letter_window: String,
    pub no_button: String,
    pub yes_button: String,
    pub title: String,
    pub image: String,
    pub buttons: String,
    pub message: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            envelope: "#envelope-container".into(),
            letter: "#letter-container".into(),
            letter_window: ".letter-window".into(),
            no_button: ".no-btn".into(),
            yes_button: ".btn[alt='Yes']".into(),
            title: "#letter-title".into(),
            image: "#letter-cat".into(),
            buttons: "#letter-buttons".into(),
            message: "#love-message".into(),
        }
    }
}

/// Annulus and cooldown for the evasive button.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct EvasionConfig {
    pub min_distance_px: f64,
    pub max_distance_px: f64,
    /// Lock after a relocation; matches the CSS transition below.
    pub cooldown_ms: u32,
    pub transition: String,
}

impl Default for EvasionConfig {
    fn default() -> Self {
        Self {
            min_distance_px: 100.0,
            max_distance_px: 250.0,
            cooldown_ms: 500,
            transition: "transform 0.5s ease-out".into(),
        }
    }
}

/// Audio assets and retry timing.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct AudioConfig {
    pub background: TrackSpec,
    pub confirmation: TrackSpec,
    pub confirmation_retry_ms: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            background: TrackSpec { src: "background_music.mp3".into(), volume: 0.3, looping: true },
            confirmation: TrackSpec { src: "sunsets-with-you.mp3".into(), volume: 0.5, looping: false },
            confirmation_retry_ms: 100,
        }
    }
}

/// What the letter turns into once "Yes" is pressed.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct CelebrationConfig {
    pub title: String,
    pub title_class: String,
    pub image_src: String,
    pub window_classes: Vec<String>,
    pub batches: Vec<BatchSpec>,
}

impl Default for CelebrationConfig {
    fn default() -> Self {
        Self {
            title: "Yippeeee!".into(),
            title_class: "celebrate".into(),
            image_src: "cat_dance.gif".into(),
            window_classes: vec!["final".into(), "shake".into()],
            batches: vec![
                BatchSpec {
                    class_name: "confetti".into(),
                    count: 60,
                    lifetime_ms: 3500,
                    layout: Layout::Scatter { max_delay_s: 0.5 },
                    content: ContentSpec::Plain,
                },
                BatchSpec {
                    class_name: "floating-heart".into(),
                    count: 20,
                    lifetime_ms: 4000,
                    layout: Layout::Scatter { max_delay_s: 0.4 },
                    content: ContentSpec::Glyphs {
                        glyphs: ["💕", "❤️", "💗", "💖", "💝"].iter().map(|g| g.to_string()).collect(),
                    },
                },
                BatchSpec {
                    class_name: "firework".into(),
                    count: 15,
                    lifetime_ms: 2500,
                    layout: Layout::Burst { center_pct: 50.0, spread_pct: 20.0, max_delay_s: 0.3 },
                    content: ContentSpec::Plain,
                },
            ],
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct CardConfig {
    pub selectors: Selectors,
    pub evasion: EvasionConfig,
    pub audio: AudioConfig,
    pub celebration: CelebrationConfig,
    /// Batch launched on window load, before any interaction.
    pub intro: IntroConfig,
    /// Delay between showing the letter and adding the `open` class.
    pub letter_open_delay_ms: u32,
    /// `tracing-subscriber` filter directives.
    pub log_filter: String,
}

impl Default for CardConfig {
    fn default() -> Self {
        Self {
            selectors: Selectors::default(),
            evasion: EvasionConfig::default(),
            audio: AudioConfig::default(),
            celebration: CelebrationConfig::default(),
            intro: IntroConfig::default(),
            letter_open_delay_ms: 50,
            log_filter: "envelope_card=debug".into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct IntroConfig {
    pub enabled: bool,
    pub batch: BatchSpec,
}

impl Default for IntroConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            batch: BatchSpec {
                class_name: "flying-photo".into(),
                count: 8,
                lifetime_ms: 4000,
                layout: Layout::Staggered { step_s: 0.1 },
                content: ContentSpec::Photos {
                    sources: vec!["photo1.jpg".into(), "photo2.jpg".into(), "photo3.jpg".into()],
                    min_width_px: 80.0,
                    max_width_px: 140.0,
                },
            },
        }
    }
}

impl CardConfig {
    /// Parse a (possibly partial) JSON document; absent fields keep defaults.
    #[cfg(feature = "serde_json")]
    pub fn from_json(json: &str) -> Result<Self> {
        let cfg: CardConfig = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let ev = &self.evasion;
        if !(ev.min_distance_px >= 0.0
            && ev.min_distance_px <= ev.max_distance_px
            && ev.max_distance_px <= MAX_EVASION_DISTANCE_PX)
        {
            return Err(CardError::Config(format!(
                "evasion distance range [{}, {}] is invalid",
                ev.min_distance_px, ev.max_distance_px
            )));
        }
        for (name, track) in [("background", &self.audio.background), ("confirmation", &self.audio.confirmation)] {
            if track.src.trim().is_empty() {
                return Err(CardError::Config(format!("{name} track has no source")));
            }
            if !(0.0..=1.0).contains(&track.volume) {
                return Err(CardError::Config(format!(
                    "{name} track volume {} outside [0, 1]",
                    track.volume
                )));
            }
        }
        let intro = self.intro.enabled.then_some(&self.intro.batch);
        for batch in self.celebration.batches.iter().chain(intro) {
            batch.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let cfg = CardConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.letter_open_delay_ms, 50);
        assert_eq!(cfg.celebration.batches.len(), 3);
        assert!(cfg.audio.background.looping);
        assert!(!cfg.audio.confirmation.looping);
    }

    #[test]
    fn inverted_distance_range_rejected() {
        let mut cfg = CardConfig::default();
        cfg.evasion.min_distance_px = 300.0;
        assert!(matches!(cfg.validate(), Err(CardError::Config(_))));
    }

    #[test]
    fn loud_or_sourceless_tracks_rejected() {
        let mut cfg = CardConfig::default();
        cfg.audio.confirmation.volume = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = CardConfig::default();
        cfg.audio.background.src = "  ".into();
        assert!(cfg.validate().is_err());
    }

    #[cfg(feature = "serde_json")]
    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = CardConfig::from_json(r#"{"evasion":{"max_distance_px":300.0},"letter_open_delay_ms":80}"#)
            .unwrap();
        assert_eq!(cfg.evasion.max_distance_px, 300.0);
        assert_eq!(cfg.evasion.min_distance_px, 100.0);
        assert_eq!(cfg.letter_open_delay_ms, 80);
        assert_eq!(cfg.audio, AudioConfig::default());
    }

    #[test]
    fn oversized_distance_rejected() {
        let mut cfg = CardConfig::default();
        cfg.evasion.max_distance_px = f64::MAX;
        assert!(cfg.validate().is_err());
        cfg.evasion.max_distance_px = f64::INFINITY;
        assert!(cfg.validate().is_err());
        cfg.evasion.max_distance_px = MAX_EVASION_DISTANCE_PX;
        assert!(cfg.validate().is_ok());
    }

    #[cfg(feature = "serde_json")]
    #[test]
    fn huge_distance_json_rejected() {
        let res = CardConfig::from_json(r#"{"evasion":{"max_distance_px":1.7976931348623157e308}}"#);
        assert!(matches!(res, Err(CardError::Config(_))));
    }

    #[cfg(feature = "serde_json")]
    #[test]
    fn huge_particle_spread_json_rejected() {
        let json = r#"{"celebration":{"batches":[{"class_name":"firework","count":3,"lifetime_ms":100,
            "layout":{"kind":"burst","center_pct":50.0,"spread_pct":1e308,"max_delay_s":0.3},
            "content":{"kind":"plain"}}]}}"#;
        assert!(CardConfig::from_json(json).is_err());
    }

    #[cfg(feature = "serde_json")]
    #[test]
    fn invalid_json_config_rejected() {
        assert!(CardConfig::from_json(r#"{"evasion":{"min_distance_px":500.0}}"#).is_err());
        assert!(CardConfig::from_json("[1,2").is_err());
    }
}
