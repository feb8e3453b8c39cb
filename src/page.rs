//! Page controller: looks up the card's elements, registers the event
//! handlers and owns every piece of runtime state (evasion, playback, live
//! particle batches, timers). The controller lives in a thread-local cell the
//! same way the rest of the crate's browser glue does; handlers borrow it for
//! the duration of one event.

use std::cell::{Cell, RefCell};

use gloo_timers::callback::Timeout;
use js_sys::Promise;
use rand::SeedableRng;
use rand::rngs::StdRng;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, spawn_local};
use web_sys::{
    Document, Element, Event, EventTarget, HtmlAudioElement, HtmlElement, HtmlImageElement,
    HtmlMediaElement, window,
};

use crate::celebration::{BatchSpec, LiveBatch, Particle, ParticleContent, ParticleHost};
use crate::config::{CardConfig, Selectors, TrackSpec};
use crate::error::{CardError, Result};
use crate::evasion::EvasionController;
use crate::playback::{AudioSink, PlaybackBootstrapper};

thread_local! {
    static CARD: RefCell<Option<Card>> = const { RefCell::new(None) };
    static NEXT_GENERATION: Cell<u64> = const { Cell::new(1) };
}

/// Something that belongs to one `mount()` call.
trait Mounted {
    fn generation(&self) -> u64;
}

/// Apply `f` to the slot's occupant only if it is still the mount that
/// scheduled the callback. Returns whether `f` ran.
fn apply_current<T: Mounted>(slot: &mut Option<T>, generation: u64, f: impl FnOnce(&mut T)) -> bool {
    match slot.as_mut() {
        Some(item) if item.generation() == generation => {
            f(item);
            true
        }
        _ => false,
    }
}

/// Run `f` against the card mounted as `generation`. Callbacks that outlive
/// their mount (unmounted or replaced), or arrive while the card is already
/// borrowed, are dropped.
fn with_mount(generation: u64, f: impl FnOnce(&mut Card)) {
    CARD.with(|cell| match cell.try_borrow_mut() {
        Ok(mut guard) => {
            if !apply_current(&mut *guard, generation, f) {
                tracing::debug!(generation, "callback from a previous mount ignored");
            }
        }
        Err(_) => tracing::warn!("card busy; event dropped"),
    });
}

fn next_generation() -> u64 {
    NEXT_GENERATION.with(|next| {
        let generation = next.get();
        next.set(generation + 1);
        generation
    })
}

pub fn mount(cfg: CardConfig) -> Result<()> {
    cfg.validate()?;
    crate::logging::init(&cfg.log_filter);

    let win = window().ok_or_else(|| CardError::MissingElement("window".into()))?;
    let doc = win.document().ok_or_else(|| CardError::MissingElement("document".into()))?;
    let body = doc.body().ok_or_else(|| CardError::MissingElement("body".into()))?;
    let els = Elements::lookup(&doc, &cfg.selectors)?;

    // Remounting replaces the previous controller wholesale.
    unmount();
    let generation = next_generation();

    let listeners = vec![
        Listener::new(els.envelope.as_ref(), "click", move |_| with_mount(generation, Card::open_letter))?,
        Listener::new(els.envelope.as_ref(), "touchstart", move |evt| {
            evt.prevent_default();
            with_mount(generation, Card::open_letter);
        })?,
        Listener::new(els.no_button.as_ref(), "mouseenter", move |_| with_mount(generation, Card::evade))?,
        Listener::new(els.no_button.as_ref(), "touchstart", move |evt| {
            evt.prevent_default();
            with_mount(generation, Card::evade);
        })?,
        Listener::new(els.yes_button.as_ref(), "click", move |_| with_mount(generation, Card::celebrate))?,
        Listener::new(els.yes_button.as_ref(), "touchstart", move |evt| {
            evt.prevent_default();
            with_mount(generation, Card::celebrate);
        })?,
        Listener::new(win.as_ref(), "load", move |_| with_mount(generation, Card::on_load))?,
    ];
    let gesture_listeners = vec![
        Listener::new(doc.as_ref(), "click", move |_| with_mount(generation, Card::on_gesture))?,
        Listener::new(doc.as_ref(), "touchstart", move |_| with_mount(generation, Card::on_gesture))?,
    ];

    let card = Card {
        evasion: EvasionController::new(cfg.evasion.clone()),
        playback: PlaybackBootstrapper::new(cfg.audio.clone()),
        audio: DomAudio::new(doc.clone(), generation),
        particles: DomParticles { doc: doc.clone(), body },
        rng: StdRng::from_entropy(),
        els,
        live: Vec::new(),
        next_batch_id: 0,
        timers: Vec::new(),
        listeners,
        gesture_listeners,
        letter_opened: false,
        intro_launched: false,
        cfg,
        generation,
    };
    CARD.with(|cell| cell.replace(Some(card)));
    tracing::info!(generation, "card mounted");

    // Try right away; the `load` handler retries through the same guard.
    with_mount(generation, |card| {
        card.playback.start(&mut card.audio);
    });
    if doc.ready_state() == "complete" {
        with_mount(generation, Card::on_load);
    }
    Ok(())
}

/// Detach every listener, cancel pending timers, clear particles and stop audio.
pub fn unmount() {
    let card = CARD.with(|cell| cell.borrow_mut().take());
    if let Some(card) = card {
        let generation = card.generation;
        card.shutdown();
        tracing::info!(generation, "card unmounted");
    }
}

// --- Elements ----------------------------------------------------------------

struct Elements {
    envelope: HtmlElement,
    letter: HtmlElement,
    letter_window: Element,
    no_button: HtmlElement,
    yes_button: HtmlElement,
    title: Element,
    image: HtmlImageElement,
    buttons: HtmlElement,
    message: HtmlElement,
}

impl Elements {
    fn lookup(doc: &Document, sel: &Selectors) -> Result<Self> {
        Ok(Self {
            envelope: find(doc, &sel.envelope)?,
            letter: find(doc, &sel.letter)?,
            letter_window: find(doc, &sel.letter_window)?,
            no_button: find(doc, &sel.no_button)?,
            yes_button: find(doc, &sel.yes_button)?,
            title: find(doc, &sel.title)?,
            image: find(doc, &sel.image)?,
            buttons: find(doc, &sel.buttons)?,
            message: find(doc, &sel.message)?,
        })
    }
}

fn find<T: JsCast>(doc: &Document, selector: &str) -> Result<T> {
    doc.query_selector(selector)?
        .ok_or_else(|| CardError::MissingElement(selector.to_string()))?
        .dyn_into::<T>()
        .map_err(|_| CardError::MissingElement(format!("{selector} (unexpected element type)")))
}

fn set_style(el: &HtmlElement, prop: &str, value: &str) {
    if let Err(e) = el.style().set_property(prop, value) {
        tracing::warn!(prop, value, error = ?e, "style update failed");
    }
}

fn add_class(el: &Element, class: &str) {
    if let Err(e) = el.class_list().add_1(class) {
        tracing::warn!(class, error = ?e, "class update failed");
    }
}

// --- Listeners ---------------------------------------------------------------

/// Registered event handler; removing it from the target on drop.
struct Listener {
    target: EventTarget,
    kind: &'static str,
    closure: Closure<dyn FnMut(Event)>,
}

impl Listener {
    fn new(target: &EventTarget, kind: &'static str, handler: impl FnMut(Event) + 'static) -> Result<Self> {
        let closure = Closure::wrap(Box::new(handler) as Box<dyn FnMut(Event)>);
        target.add_event_listener_with_callback(kind, closure.as_ref().unchecked_ref())?;
        Ok(Self { target: target.clone(), kind, closure })
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Err(e) = self
            .target
            .remove_event_listener_with_callback(self.kind, self.closure.as_ref().unchecked_ref())
        {
            tracing::warn!(kind = self.kind, error = %describe_js(e), "listener removal failed");
        }
    }
}

// --- Controller --------------------------------------------------------------

struct Card {
    cfg: CardConfig,
    els: Elements,
    rng: StdRng,
    evasion: EvasionController,
    playback: PlaybackBootstrapper,
    audio: DomAudio,
    particles: DomParticles,
    live: Vec<(u64, LiveBatch<Element>)>,
    next_batch_id: u64,
    timers: Vec<Timeout>,
    listeners: Vec<Listener>,
    gesture_listeners: Vec<Listener>,
    letter_opened: bool,
    intro_launched: bool,
    generation: u64,
}

impl Mounted for Card {
    fn generation(&self) -> u64 {
        self.generation
    }
}

impl Card {
    fn on_load(&mut self) {
        self.playback.start(&mut self.audio);
        if self.cfg.intro.enabled && !self.intro_launched {
            self.intro_launched = true;
            let intro = self.cfg.intro.batch.clone();
            self.launch_batch(&intro);
        }
    }

    fn on_gesture(&mut self) {
        self.playback.on_gesture(&mut self.audio);
        if !self.playback.gesture_armed() {
            // Runs inside one of these closures; detach once it has returned.
            let generation = self.generation;
            spawn_local(async move {
                with_mount(generation, |card| card.gesture_listeners.clear());
            });
        }
    }

    fn open_letter(&mut self) {
        if self.letter_opened {
            return;
        }
        self.letter_opened = true;
        set_style(&self.els.envelope, "display", "none");
        set_style(&self.els.letter, "display", "flex");
        let window_el = self.els.letter_window.clone();
        self.timers.push(Timeout::new(self.cfg.letter_open_delay_ms, move || {
            add_class(&window_el, "open");
        }));
        tracing::debug!("letter opened");
    }

    fn evade(&mut self) {
        let now = crate::performance_now();
        if let Some(d) = self.evasion.trigger(now, &mut self.rng) {
            set_style(&self.els.no_button, "transition", self.evasion.transition());
            set_style(&self.els.no_button, "transform", &d.css_transform());
        }
    }

    fn celebrate(&mut self) {
        if !self.playback.confirm(&mut self.audio) {
            return;
        }
        self.gesture_listeners.clear();

        let scene = &self.cfg.celebration;
        self.els.title.set_text_content(Some(scene.title.as_str()));
        add_class(&self.els.title, &scene.title_class);
        self.els.image.set_src(&scene.image_src);
        for class in &scene.window_classes {
            add_class(&self.els.letter_window, class);
        }
        set_style(&self.els.buttons, "display", "none");
        set_style(&self.els.message, "display", "block");

        let batches = scene.batches.clone();
        for spec in &batches {
            self.launch_batch(spec);
        }
        tracing::info!(batches = batches.len(), "celebration started");
    }

    fn launch_batch(&mut self, spec: &BatchSpec) {
        match LiveBatch::launch(spec, &mut self.particles, &mut self.rng) {
            Ok(batch) => {
                let id = self.next_batch_id;
                self.next_batch_id += 1;
                let lifetime = batch.lifetime_ms();
                let generation = self.generation;
                self.live.push((id, batch));
                self.timers.push(Timeout::new(lifetime, move || {
                    with_mount(generation, |card| card.retire_batch(id));
                }));
            }
            Err(e) => tracing::warn!(class = %spec.class_name, error = %e, "particle batch failed"),
        }
    }

    fn retire_batch(&mut self, id: u64) {
        if let Some(pos) = self.live.iter().position(|(bid, _)| *bid == id) {
            let (_, batch) = self.live.swap_remove(pos);
            batch.retire(&mut self.particles);
        }
    }

    fn shutdown(mut self) {
        self.listeners.clear();
        self.gesture_listeners.clear();
        self.timers.clear();
        for (_, batch) in self.live.drain(..) {
            batch.retire(&mut self.particles);
        }
        self.audio.discard_background();
        self.audio.stop_confirmation();
    }
}

// --- Audio -------------------------------------------------------------------

#[derive(Clone, Copy)]
enum Channel {
    Background,
    Confirmation,
}

/// `AudioSink` backed by detached `HtmlAudioElement`s.
struct DomAudio {
    doc: Document,
    background: Option<HtmlAudioElement>,
    confirmation: Option<HtmlAudioElement>,
    retry: Option<Timeout>,
    generation: u64,
}

impl DomAudio {
    fn new(doc: Document, generation: u64) -> Self {
        Self { doc, background: None, confirmation: None, retry: None, generation }
    }

    fn create(track: &TrackSpec) -> Option<HtmlAudioElement> {
        match HtmlAudioElement::new_with_src(&track.src) {
            Ok(audio) => {
                audio.set_volume(track.volume);
                audio.set_loop(track.looping);
                audio.set_preload("auto");
                Some(audio)
            }
            Err(e) => {
                tracing::warn!(src = %track.src, error = ?e, "audio not supported");
                None
            }
        }
    }

    fn stop_confirmation(&mut self) {
        self.retry = None;
        if let Some(audio) = self.confirmation.take() {
            silence(&audio);
        }
    }
}

fn silence(media: &HtmlMediaElement) {
    if let Err(e) = media.pause() {
        tracing::warn!(src = %media.current_src(), error = %describe_js(e), "pause failed");
    }
    media.set_current_time(0.0);
    media.set_volume(0.0);
    media.set_loop(false);
}

/// Await a `play()` promise and hand the outcome back to the bootstrapper.
/// Always deferred, since the caller is still holding the card.
fn watch_play(media: &HtmlMediaElement, channel: Channel, generation: u64) {
    let started: std::result::Result<Promise, JsValue> = media.play();
    spawn_local(async move {
        let outcome = match started {
            Ok(promise) => JsFuture::from(promise).await.map(|_| ()),
            Err(e) => Err(e),
        }
        .map_err(describe_js);
        with_mount(generation, |card| match channel {
            Channel::Background => card.playback.background_outcome(&mut card.audio, outcome),
            Channel::Confirmation => card.playback.confirmation_outcome(&mut card.audio, outcome),
        });
    });
}

/// Readable form of a rejection: the message of an `Error`, else the value itself.
fn describe_js(value: JsValue) -> String {
    if let Some(err) = value.dyn_ref::<js_sys::Error>() {
        return String::from(err.message());
    }
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}

impl AudioSink for DomAudio {
    fn start_background(&mut self, track: &TrackSpec) {
        if let Some(audio) = Self::create(track) {
            watch_play(&audio, Channel::Background, self.generation);
            self.background = Some(audio);
        }
    }

    fn resume_background(&mut self) {
        if let Some(audio) = &self.background {
            watch_play(audio, Channel::Background, self.generation);
        }
    }

    fn discard_background(&mut self) {
        if let Some(audio) = self.background.take() {
            silence(&audio);
            audio.set_src("");
        }
    }

    fn silence_others(&mut self) {
        let nodes = match self.doc.query_selector_all("audio") {
            Ok(nodes) => nodes,
            Err(e) => {
                tracing::warn!(error = ?e, "could not enumerate audio elements");
                return;
            }
        };
        for i in 0..nodes.length() {
            if let Some(media) = nodes.get(i).and_then(|n| n.dyn_into::<HtmlMediaElement>().ok()) {
                silence(&media);
            }
        }
    }

    fn play_confirmation(&mut self, track: &TrackSpec) {
        if let Some(audio) = Self::create(track) {
            watch_play(&audio, Channel::Confirmation, self.generation);
            self.confirmation = Some(audio);
        }
    }

    fn schedule_confirmation_retry(&mut self, delay_ms: u32) {
        let generation = self.generation;
        self.retry = Some(Timeout::new(delay_ms, move || {
            with_mount(generation, |card| card.playback.confirmation_retry_due(&mut card.audio));
        }));
    }

    fn replay_confirmation(&mut self) {
        if let Some(audio) = &self.confirmation {
            watch_play(audio, Channel::Confirmation, self.generation);
        }
    }
}

// --- Particles ---------------------------------------------------------------

/// `ParticleHost` that appends plain `<div>`s to `<body>`.
struct DomParticles {
    doc: Document,
    body: HtmlElement,
}

impl ParticleHost for DomParticles {
    type Node = Element;

    fn attach(&mut self, particle: &Particle) -> Result<Element> {
        let el = self.doc.create_element("div")?;
        el.class_list().add_1(&particle.class_name)?;
        el.set_attribute("style", &particle.style())?;
        match &particle.content {
            ParticleContent::Empty => {}
            ParticleContent::Glyph(glyph) => el.set_text_content(Some(glyph.as_str())),
            ParticleContent::Image { src, width_px } => {
                let img: HtmlImageElement = self
                    .doc
                    .create_element("img")?
                    .dyn_into()
                    .map_err(|_| CardError::Dom("img is not an HtmlImageElement".into()))?;
                img.set_src(src);
                img.set_attribute("style", &format!("width:{width_px:.1}px;"))?;
                el.append_child(&img)?;
            }
        }
        self.body.append_child(&el)?;
        Ok(el)
    }

    fn detach(&mut self, node: Element) {
        node.remove();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stub {
        generation: u64,
        hits: u32,
    }

    impl Mounted for Stub {
        fn generation(&self) -> u64 {
            self.generation
        }
    }

    #[test]
    fn callbacks_reach_only_their_own_mount() {
        let mut slot = Some(Stub { generation: 2, hits: 0 });
        // a play() outcome or timer scheduled by mount 1 lands after remount
        assert!(!apply_current(&mut slot, 1, |s| s.hits += 1));
        assert!(apply_current(&mut slot, 2, |s| s.hits += 1));
        assert_eq!(slot.as_ref().map(|s| s.hits), Some(1));
    }

    #[test]
    fn callbacks_after_unmount_are_dropped() {
        let mut slot: Option<Stub> = None;
        assert!(!apply_current(&mut slot, 1, |s| s.hits += 1));
    }

    #[test]
    fn generations_are_never_reused() {
        let a = next_generation();
        let b = next_generation();
        assert!(b > a);
    }
}
