//! Particle batches: confetti, floating hearts, firework sparks and the intro
//! flying photos.
//!
//! A `BatchSpec` describes a batch (class, count, lifetime, placement, content)
//! and `spawn()` rolls the per-particle randomness. A `LiveBatch` owns the nodes
//! a `ParticleHost` created for one launch and removes every one of them in
//! `retire()`; the page controller calls it from a timer once `lifetime_ms`
//! elapses. Keeping the host behind a trait lets tests count attach/detach
//! without a browser.

use rand::Rng;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{CardError, Result};

// --- Descriptors -------------------------------------------------------------

/// Longest accepted animation delay (or stagger step), in seconds.
pub const MAX_DELAY_S: f64 = 60.0;
/// Widest accepted photo particle.
pub const MAX_PHOTO_WIDTH_PX: f64 = 10_000.0;

/// Where particles of a batch start and when their animation kicks in.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(tag = "kind", rename_all = "snake_case"))]
pub enum Layout {
    /// Random horizontal position across the viewport, random delay.
    Scatter { max_delay_s: f64 },
    /// Clustered around a centre point on both axes (radial sparks).
    Burst { center_pct: f64, spread_pct: f64, max_delay_s: f64 },
    /// Random horizontal position, delay growing by `step_s` per particle.
    Staggered { step_s: f64 },
}

/// What goes inside each particle element.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(tag = "kind", rename_all = "snake_case"))]
pub enum ContentSpec {
    Plain,
    /// One glyph per particle, picked uniformly.
    Glyphs { glyphs: Vec<String> },
    /// An image per particle cycling through `sources`, random width.
    Photos { sources: Vec<String>, min_width_px: f64, max_width_px: f64 },
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BatchSpec {
    pub class_name: String,
    pub count: usize,
    pub lifetime_ms: u32,
    pub layout: Layout,
    pub content: ContentSpec,
}

/// Content of one spawned particle.
#[derive(Clone, Debug, PartialEq)]
pub enum ParticleContent {
    Empty,
    Glyph(String),
    Image { src: String, width_px: f64 },
}

/// One decorative element, fully resolved and ready to be attached.
#[derive(Clone, Debug, PartialEq)]
pub struct Particle {
    pub class_name: String,
    pub left_pct: f64,
    pub top_pct: Option<f64>,
    pub delay_s: f64,
    pub content: ParticleContent,
}

impl Particle {
    /// Inline style for the element: position plus animation delay.
    pub fn style(&self) -> String {
        let mut style = format!("left:{:.3}%;animation-delay:{:.3}s;", self.left_pct, self.delay_s);
        if let Some(top) = self.top_pct {
            style.push_str(&format!("top:{top:.3}%;"));
        }
        style
    }
}

impl BatchSpec {
    pub fn validate(&self) -> Result<()> {
        if self.lifetime_ms == 0 {
            return Err(CardError::Config(format!("batch '{}' has zero lifetime", self.class_name)));
        }
        let in_range = |v: f64, max: f64| v.is_finite() && (0.0..=max).contains(&v);
        let layout_ok = match self.layout {
            Layout::Scatter { max_delay_s } => in_range(max_delay_s, MAX_DELAY_S),
            Layout::Burst { center_pct, spread_pct, max_delay_s } => {
                in_range(center_pct, 100.0) && in_range(spread_pct, 100.0) && in_range(max_delay_s, MAX_DELAY_S)
            }
            Layout::Staggered { step_s } => in_range(step_s, MAX_DELAY_S),
        };
        if !layout_ok {
            return Err(CardError::Config(format!(
                "batch '{}' layout {:?} is out of range",
                self.class_name, self.layout
            )));
        }
        match &self.content {
            ContentSpec::Glyphs { glyphs } if glyphs.is_empty() => Err(CardError::Config(format!(
                "batch '{}' has no glyphs",
                self.class_name
            ))),
            ContentSpec::Photos { sources, .. } if sources.is_empty() => Err(CardError::Config(
                format!("batch '{}' has no photo sources", self.class_name),
            )),
            ContentSpec::Photos { min_width_px, max_width_px, .. }
                if !in_range(*min_width_px, MAX_PHOTO_WIDTH_PX)
                    || !in_range(*max_width_px, MAX_PHOTO_WIDTH_PX)
                    || min_width_px > max_width_px =>
            {
                Err(CardError::Config(format!(
                    "batch '{}' width range [{min_width_px}, {max_width_px}] is invalid",
                    self.class_name
                )))
            }
            _ => Ok(()),
        }
    }

    /// Roll `count` particles.
    pub fn spawn<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<Particle> {
        (0..self.count).map(|i| self.spawn_one(i, rng)).collect()
    }

    fn spawn_one<R: Rng + ?Sized>(&self, index: usize, rng: &mut R) -> Particle {
        let (left_pct, top_pct, delay_s) = match self.layout {
            Layout::Scatter { max_delay_s } => (rng.gen_range(0.0..100.0), None, upto(rng, max_delay_s)),
            Layout::Burst { center_pct, spread_pct, max_delay_s } => {
                let left = center_pct + (rng.r#gen::<f64>() - 0.5) * spread_pct;
                let top = center_pct + (rng.r#gen::<f64>() - 0.5) * spread_pct;
                (left, Some(top), upto(rng, max_delay_s))
            }
            Layout::Staggered { step_s } => (rng.gen_range(0.0..100.0), None, index as f64 * step_s),
        };
        let content = match &self.content {
            ContentSpec::Plain => ParticleContent::Empty,
            ContentSpec::Glyphs { glyphs } if glyphs.is_empty() => ParticleContent::Empty,
            ContentSpec::Glyphs { glyphs } => ParticleContent::Glyph(glyphs[rng.gen_range(0..glyphs.len())].clone()),
            ContentSpec::Photos { sources, .. } if sources.is_empty() => ParticleContent::Empty,
            ContentSpec::Photos { sources, min_width_px, max_width_px } => ParticleContent::Image {
                src: sources[index % sources.len()].clone(),
                width_px: min_width_px + rng.r#gen::<f64>() * (max_width_px - min_width_px),
            },
        };
        Particle { class_name: self.class_name.clone(), left_pct, top_pct, delay_s, content }
    }
}

fn upto<R: Rng + ?Sized>(rng: &mut R, max: f64) -> f64 {
    rng.r#gen::<f64>() * max
}

// --- Live batches ------------------------------------------------------------

/// Something that can materialise particles, the DOM in production.
pub trait ParticleHost {
    type Node;

    fn attach(&mut self, particle: &Particle) -> Result<Self::Node>;
    fn detach(&mut self, node: Self::Node);
}

/// Nodes created for one launch of a batch.
pub struct LiveBatch<N> {
    class_name: String,
    lifetime_ms: u32,
    nodes: Vec<N>,
}

impl<N> LiveBatch<N> {
    /// Spawn and attach every particle of `spec`. A failed attach detaches what
    /// was already attached so nothing is left orphaned on the page.
    pub fn launch<H, R>(spec: &BatchSpec, host: &mut H, rng: &mut R) -> Result<Self>
    where
        H: ParticleHost<Node = N>,
        R: Rng + ?Sized,
    {
        let mut nodes = Vec::with_capacity(spec.count);
        for particle in spec.spawn(rng) {
            match host.attach(&particle) {
                Ok(node) => nodes.push(node),
                Err(e) => {
                    for node in nodes {
                        host.detach(node);
                    }
                    return Err(e);
                }
            }
        }
        tracing::debug!(class = %spec.class_name, count = nodes.len(), lifetime_ms = spec.lifetime_ms, "batch launched");
        Ok(Self { class_name: spec.class_name.clone(), lifetime_ms: spec.lifetime_ms, nodes })
    }

    pub fn lifetime_ms(&self) -> u32 {
        self.lifetime_ms
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Remove every node this batch attached.
    pub fn retire<H: ParticleHost<Node = N>>(self, host: &mut H) {
        let count = self.nodes.len();
        for node in self.nodes {
            host.detach(node);
        }
        tracing::trace!(class = %self.class_name, count, "batch retired");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CelebrationConfig, IntroConfig};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn burst_stays_within_spread() {
        let spec = &CelebrationConfig::default().batches[2];
        let mut rng = StdRng::seed_from_u64(7);
        for p in spec.spawn(&mut rng) {
            assert!((40.0..=60.0).contains(&p.left_pct), "left {}", p.left_pct);
            let top = p.top_pct.expect("sparks carry a top offset");
            assert!((40.0..=60.0).contains(&top), "top {top}");
            assert!((0.0..0.3).contains(&p.delay_s));
        }
    }

    #[test]
    fn hearts_pick_from_glyph_pool() {
        let spec = &CelebrationConfig::default().batches[1];
        let ContentSpec::Glyphs { glyphs: pool } = &spec.content else { panic!("hearts use glyphs") };
        let mut rng = StdRng::seed_from_u64(11);
        let particles = spec.spawn(&mut rng);
        assert_eq!(particles.len(), 20);
        for p in particles {
            match p.content {
                ParticleContent::Glyph(g) => assert!(pool.contains(&g)),
                other => panic!("unexpected content {other:?}"),
            }
        }
    }

    #[test]
    fn photos_cycle_sources_and_stagger() {
        let spec = IntroConfig::default().batch;
        let mut rng = StdRng::seed_from_u64(3);
        let particles = spec.spawn(&mut rng);
        assert_eq!(particles.len(), 8);
        for (i, p) in particles.iter().enumerate() {
            assert!((p.delay_s - i as f64 * 0.1).abs() < 1e-9);
            let ParticleContent::Image { src, width_px } = &p.content else { panic!("photo batch") };
            assert_eq!(src, &format!("photo{}.jpg", i % 3 + 1));
            assert!((80.0..140.0).contains(width_px));
        }
    }

    #[test]
    fn style_includes_top_only_for_bursts() {
        let p = Particle {
            class_name: "confetti".into(),
            left_pct: 12.5,
            top_pct: None,
            delay_s: 0.25,
            content: ParticleContent::Empty,
        };
        assert_eq!(p.style(), "left:12.500%;animation-delay:0.250s;");
        let spark = Particle { top_pct: Some(48.0), ..p };
        assert!(spark.style().ends_with("top:48.000%;"));
    }

    #[test]
    fn empty_glyph_pool_fails_validation() {
        let spec = BatchSpec {
            class_name: "floating-heart".into(),
            count: 3,
            lifetime_ms: 100,
            layout: Layout::Scatter { max_delay_s: 0.1 },
            content: ContentSpec::Glyphs { glyphs: vec![] },
        };
        assert!(spec.validate().is_err());
    }

    #[test]
    fn unbounded_layout_fails_validation() {
        let mut spec = BatchSpec {
            class_name: "firework".into(),
            count: 3,
            lifetime_ms: 100,
            layout: Layout::Burst { center_pct: 50.0, spread_pct: f64::MAX, max_delay_s: 0.3 },
            content: ContentSpec::Plain,
        };
        assert!(spec.validate().is_err());
        spec.layout = Layout::Scatter { max_delay_s: f64::NAN };
        assert!(spec.validate().is_err());
        spec.layout = Layout::Staggered { step_s: -0.1 };
        assert!(spec.validate().is_err());
        spec.layout = Layout::Burst { center_pct: 50.0, spread_pct: 20.0, max_delay_s: 0.3 };
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn oversized_photo_width_fails_validation() {
        let spec = BatchSpec {
            class_name: "flying-photo".into(),
            count: 2,
            lifetime_ms: 100,
            layout: Layout::Staggered { step_s: 0.1 },
            content: ContentSpec::Photos { sources: vec!["a.jpg".into()], min_width_px: 80.0, max_width_px: f64::INFINITY },
        };
        assert!(spec.validate().is_err());
    }
}
