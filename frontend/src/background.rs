use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;

use log::{debug, info, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{Document, Element, Event, HtmlElement, HtmlImageElement, HtmlVideoElement, Window};

use crate::dom::{self, DomError, ObserveOptions};
use crate::environment::{BrowserProbe, Environment, EnvironmentProbe};
use crate::scheduler::{Scheduler, TaskId};

/// A section background that prefers video but can show a still image.
#[derive(Debug, Clone, Copy)]
pub struct SlotSpec {
    pub name: &'static str,
    pub selector: &'static str,
    pub stagger: Duration,
}

pub const SLOTS: [SlotSpec; 3] = [
    SlotSpec {
        name: "services",
        selector: ".services-video",
        stagger: Duration::from_millis(100),
    },
    SlotSpec {
        name: "contact",
        selector: ".contact-video",
        stagger: Duration::from_millis(300),
    },
    SlotSpec {
        name: "service-item",
        selector: ".service-item-video",
        stagger: Duration::from_millis(500),
    },
];

/// Delay between revealing a video and asking it to play.
pub const PLAY_DELAY: Duration = Duration::from_millis(100);
pub const RESIZE_SETTLE: Duration = Duration::from_millis(250);
pub const RESIZE_DELTA: f64 = 100.0;
const VISIBILITY: ObserveOptions = ObserveOptions {
    threshold: 0.1,
    root_margin: None,
};
const LAZY_IMAGES: ObserveOptions = ObserveOptions {
    threshold: 0.1,
    root_margin: Some("100px"),
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suppression {
    NarrowViewport,
    ReducedMotion,
    SlowNetwork,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presentation {
    Video,
    Fallback(Suppression),
}

pub fn decide(env: &Environment) -> Presentation {
    if env.is_narrow() {
        Presentation::Fallback(Suppression::NarrowViewport)
    } else if env.reduced_motion {
        Presentation::Fallback(Suppression::ReducedMotion)
    } else if env.effective_type.is_slow() {
        Presentation::Fallback(Suppression::SlowNetwork)
    } else {
        Presentation::Video
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    /// Activation is scheduled but has not fired yet.
    Pending,
    Playing,
    Paused,
    Suppressed,
    Failed,
}

/// Why a slot shows its still image instead of video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackCause {
    Suppressed,
    MediaError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotCommand {
    Schedule { slot: usize, delay: Duration },
    /// `reload` asks the element to fetch its source again after a failure.
    Show { slot: usize, autoplay: bool, reload: bool },
    Fallback { slot: usize, cause: FallbackCause },
    Play { slot: usize },
    Pause { slot: usize },
}

/// Presentation state of every slot. Pure: callers carry out the
/// returned commands.
#[derive(Debug)]
pub struct BackgroundManager {
    states: Vec<SlotState>,
    visible: Vec<bool>,
    reload: Vec<bool>,
    stagger: Vec<Duration>,
}

impl BackgroundManager {
    pub fn new(specs: &[SlotSpec]) -> Self {
        Self {
            states: vec![SlotState::Idle; specs.len()],
            visible: vec![true; specs.len()],
            reload: vec![false; specs.len()],
            stagger: specs.iter().map(|spec| spec.stagger).collect(),
        }
    }

    pub fn state(&self, slot: usize) -> Option<SlotState> {
        self.states.get(slot).copied()
    }

    pub fn initialize(&mut self, env: &Environment) -> Vec<SlotCommand> {
        match decide(env) {
            Presentation::Fallback(reason) => {
                debug!("Background videos suppressed: {:?}", reason);
                self.suppress_all()
            }
            Presentation::Video => {
                let mut commands = Vec::new();
                for (slot, state) in self.states.iter_mut().enumerate() {
                    if matches!(state, SlotState::Idle | SlotState::Suppressed | SlotState::Failed) {
                        self.reload[slot] |= *state == SlotState::Failed;
                        *state = SlotState::Pending;
                        commands.push(SlotCommand::Schedule {
                            slot,
                            delay: self.stagger[slot],
                        });
                    }
                }
                commands
            }
        }
    }

    pub fn network_changed(&mut self, env: &Environment) -> Vec<SlotCommand> {
        if env.effective_type.is_slow() {
            warn!("Slow connection detected. Disabling video backgrounds.");
            self.suppress_all()
        } else if env.effective_type.is_fast() && !env.is_narrow() {
            info!("Good connection detected. Enabling video backgrounds.");
            self.initialize(env)
        } else {
            Vec::new()
        }
    }

    fn suppress_all(&mut self) -> Vec<SlotCommand> {
        let mut commands = Vec::new();
        for (slot, state) in self.states.iter_mut().enumerate() {
            if *state != SlotState::Suppressed {
                self.reload[slot] |= *state == SlotState::Failed;
                *state = SlotState::Suppressed;
                commands.push(SlotCommand::Fallback {
                    slot,
                    cause: FallbackCause::Suppressed,
                });
            }
        }
        commands
    }

    /// A scheduled activation fired. Nothing happens if the slot was
    /// suppressed in the meantime.
    pub fn activation_due(&mut self, slot: usize) -> Option<SlotCommand> {
        let state = self.states.get_mut(slot)?;
        if *state != SlotState::Pending {
            return None;
        }
        let autoplay = self.visible[slot];
        *state = if autoplay {
            SlotState::Playing
        } else {
            SlotState::Paused
        };
        let reload = std::mem::take(&mut self.reload[slot]);
        Some(SlotCommand::Show { slot, autoplay, reload })
    }

    pub fn visibility_changed(&mut self, slot: usize, visible: bool) -> Option<SlotCommand> {
        let state = self.states.get_mut(slot)?;
        self.visible[slot] = visible;
        match (*state, visible) {
            (SlotState::Paused, true) => {
                *state = SlotState::Playing;
                Some(SlotCommand::Play { slot })
            }
            (SlotState::Playing, false) => {
                *state = SlotState::Paused;
                Some(SlotCommand::Pause { slot })
            }
            _ => None,
        }
    }

    pub fn media_failed(&mut self, slot: usize) -> Option<SlotCommand> {
        let state = self.states.get_mut(slot)?;
        match *state {
            SlotState::Pending | SlotState::Playing | SlotState::Paused => {
                *state = SlotState::Failed;
                Some(SlotCommand::Fallback {
                    slot,
                    cause: FallbackCause::MediaError,
                })
            }
            _ => None,
        }
    }
}

/// Remembers the last width a layout decision was made for.
#[derive(Debug)]
pub struct ResizeTracker {
    last_width: f64,
}

impl ResizeTracker {
    pub fn new(width: f64) -> Self {
        Self { last_width: width }
    }

    /// True when `width` moved far enough to warrant a new decision.
    pub fn observe(&mut self, width: f64) -> bool {
        if (width - self.last_width).abs() > RESIZE_DELTA {
            self.last_width = width;
            true
        } else {
            false
        }
    }
}

/// Where slot commands are rendered.
pub trait MediaSurface {
    fn show(&self, slot: usize, reload: bool);
    fn play(&self, slot: usize);
    fn pause(&self, slot: usize);
    fn fallback(&self, slot: usize, cause: FallbackCause);
}

pub struct BackgroundController<S, M, P> {
    manager: RefCell<BackgroundManager>,
    pending: RefCell<Vec<Option<TaskId>>>,
    resize: RefCell<ResizeTracker>,
    resize_task: Cell<Option<TaskId>>,
    scheduler: S,
    surface: M,
    probe: P,
}

impl<S, M, P> BackgroundController<S, M, P>
where
    S: Scheduler + 'static,
    M: MediaSurface + 'static,
    P: EnvironmentProbe + 'static,
{
    pub fn new(specs: &[SlotSpec], scheduler: S, surface: M, probe: P) -> Rc<Self> {
        let width = probe.snapshot().viewport_width;
        Rc::new(Self {
            manager: RefCell::new(BackgroundManager::new(specs)),
            pending: RefCell::new(vec![None; specs.len()]),
            resize: RefCell::new(ResizeTracker::new(width)),
            resize_task: Cell::new(None),
            scheduler,
            surface,
            probe,
        })
    }

    pub fn slot_state(&self, slot: usize) -> Option<SlotState> {
        self.manager.borrow().state(slot)
    }

    pub fn surface(&self) -> &M {
        &self.surface
    }

    pub fn initialize(this: &Rc<Self>) {
        let env = this.probe.snapshot();
        let commands = this.manager.borrow_mut().initialize(&env);
        Self::apply(this, commands);
    }

    pub fn network_changed(this: &Rc<Self>) {
        let env = this.probe.snapshot();
        let commands = this.manager.borrow_mut().network_changed(&env);
        Self::apply(this, commands);
    }

    pub fn visibility_changed(this: &Rc<Self>, slot: usize, visible: bool) {
        let command = this.manager.borrow_mut().visibility_changed(slot, visible);
        Self::apply(this, command.into_iter().collect());
    }

    pub fn media_failed(this: &Rc<Self>, slot: usize) {
        let command = this.manager.borrow_mut().media_failed(slot);
        Self::apply(this, command.into_iter().collect());
    }

    /// Debounced: each resize supersedes the previous pending check.
    pub fn resized(this: &Rc<Self>) {
        if let Some(previous) = this.resize_task.take() {
            this.scheduler.cancel(previous);
        }
        let weak = Rc::downgrade(this);
        let id = this.scheduler.schedule(
            RESIZE_SETTLE,
            Box::new(move || {
                if let Some(controller) = weak.upgrade() {
                    controller.resize_task.set(None);
                    let width = controller.probe.snapshot().viewport_width;
                    let significant = controller.resize.borrow_mut().observe(width);
                    if significant {
                        Self::initialize(&controller);
                    }
                }
            }),
        );
        this.resize_task.set(Some(id));
    }

    fn apply(this: &Rc<Self>, commands: Vec<SlotCommand>) {
        for command in commands {
            match command {
                SlotCommand::Schedule { slot, delay } => {
                    let weak = Rc::downgrade(this);
                    let id = this
                        .scheduler
                        .schedule(delay, Box::new(move || Self::activate(&weak, slot)));
                    let previous = this.pending.borrow_mut()[slot].replace(id);
                    if let Some(previous) = previous {
                        this.scheduler.cancel(previous);
                    }
                }
                SlotCommand::Show { slot, autoplay, reload } => {
                    this.surface.show(slot, reload);
                    if autoplay {
                        let weak = Rc::downgrade(this);
                        this.scheduler.schedule(
                            PLAY_DELAY,
                            Box::new(move || {
                                if let Some(controller) = weak.upgrade() {
                                    if controller.slot_state(slot) == Some(SlotState::Playing) {
                                        controller.surface.play(slot);
                                    }
                                }
                            }),
                        );
                    }
                }
                SlotCommand::Fallback { slot, cause } => {
                    let pending = this.pending.borrow_mut()[slot].take();
                    if let Some(pending) = pending {
                        this.scheduler.cancel(pending);
                    }
                    this.surface.fallback(slot, cause);
                }
                SlotCommand::Play { slot } => this.surface.play(slot),
                SlotCommand::Pause { slot } => this.surface.pause(slot),
            }
        }
    }

    fn activate(weak: &Weak<Self>, slot: usize) {
        if let Some(controller) = weak.upgrade() {
            controller.pending.borrow_mut()[slot] = None;
            let command = controller.manager.borrow_mut().activation_due(slot);
            Self::apply(&controller, command.into_iter().collect());
        }
    }
}

/// What a video element reports about itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoStatus {
    pub loaded: bool,
    pub playing: bool,
}

pub fn status_line(name: &str, status: Option<VideoStatus>, state: Option<SlotState>) -> String {
    let Some(status) = status else {
        return format!("{} video: not found", name);
    };
    let loaded = if status.loaded { "loaded" } else { "loading" };
    let playing = if status.playing { "playing" } else { "paused" };
    match state {
        Some(state) => format!("{} video: {}, {} ({:?})", name, loaded, playing, state),
        None => format!("{} video: {}, {}", name, loaded, playing),
    }
}

/// Video elements found in the page, one per slot.
pub struct VideoSurface {
    names: Vec<&'static str>,
    videos: Vec<Option<HtmlVideoElement>>,
    on_failure: RefCell<Option<Rc<dyn Fn(usize)>>>,
}

impl VideoSurface {
    pub fn discover(doc: &Document, specs: &[SlotSpec]) -> Self {
        let videos = specs
            .iter()
            .map(|spec| {
                let video = dom::query(doc, spec.selector)
                    .and_then(|el| el.dyn_into::<HtmlVideoElement>().ok());
                if video.is_none() {
                    warn!("{} video element not found", spec.name);
                }
                video
            })
            .collect();
        Self {
            names: specs.iter().map(|spec| spec.name).collect(),
            videos,
            on_failure: RefCell::new(None),
        }
    }

    pub fn set_failure_hook(&self, hook: Rc<dyn Fn(usize)>) {
        *self.on_failure.borrow_mut() = Some(hook);
    }

    fn video(&self, slot: usize) -> Option<&HtmlVideoElement> {
        self.videos.get(slot).and_then(Option::as_ref)
    }

    pub fn status(&self, slot: usize) -> Option<VideoStatus> {
        self.video(slot).map(|video| VideoStatus {
            loaded: video.class_list().contains("loaded"),
            playing: !video.paused(),
        })
    }

    fn elements(&self) -> impl Iterator<Item = (usize, &HtmlVideoElement)> {
        self.videos
            .iter()
            .enumerate()
            .filter_map(|(slot, video)| video.as_ref().map(|v| (slot, v)))
    }
}

impl MediaSurface for VideoSurface {
    fn show(&self, slot: usize, reload: bool) {
        if let Some(video) = self.video(slot) {
            if reload {
                let _ = video.class_list().remove_1("loaded");
                video.load();
            }
            dom::apply_style(video, &[("opacity", "1"), ("display", "block")]);
            let _ = video.class_list().add_1("loaded");
            info!("Initializing {} video: {}", self.names[slot], video.src());
        }
    }

    fn play(&self, slot: usize) {
        let Some(video) = self.video(slot) else { return };
        if !video.paused() {
            return;
        }
        let promise = match video.play() {
            Ok(promise) => promise,
            Err(e) => {
                warn!("{} video refused to play: {:?}", self.names[slot], e);
                return;
            }
        };
        let name = self.names[slot];
        let hook = self.on_failure.borrow().clone();
        spawn_local(async move {
            if let Err(e) = JsFuture::from(promise).await {
                warn!("Failed to play {} video: {:?}", name, e);
                if let Some(hook) = hook {
                    hook(slot);
                }
            }
        });
    }

    fn pause(&self, slot: usize) {
        if let Some(video) = self.video(slot) {
            if !video.paused() {
                let _ = video.pause();
            }
        }
    }

    fn fallback(&self, slot: usize, cause: FallbackCause) {
        let Some(video) = self.video(slot) else { return };
        dom::apply_style(video, &[("display", "none")]);
        let _ = video.pause();

        let section = dom::containing_section(video).and_then(|el| dom::as_html(&el));
        let image = video.get_attribute("data-fallback");
        if let (Some(section), Some(image)) = (section, image) {
            let url = format!("url('{}')", image);
            dom::apply_style(
                &section,
                &[
                    ("background-image", url.as_str()),
                    ("background-size", "cover"),
                    ("background-position", "center"),
                ],
            );
            if cause == FallbackCause::MediaError {
                dom::apply_style(&section, &[("background-attachment", "fixed")]);
            }
        }
    }
}

pub type BrowserBackgrounds = BackgroundController<Rc<dyn Scheduler>, Rc<VideoSurface>, BrowserProbe>;

/// Logs one line per background video.
pub fn log_status(controller: &BrowserBackgrounds) {
    for (slot, spec) in SLOTS.iter().enumerate() {
        let status = controller.surface().status(slot);
        info!("{}", status_line(spec.name, status, controller.slot_state(slot)));
    }
}

impl<T: MediaSurface + ?Sized> MediaSurface for Rc<T> {
    fn show(&self, slot: usize, reload: bool) {
        (**self).show(slot, reload)
    }

    fn play(&self, slot: usize) {
        (**self).play(slot)
    }

    fn pause(&self, slot: usize) {
        (**self).pause(slot)
    }

    fn fallback(&self, slot: usize, cause: FallbackCause) {
        (**self).fallback(slot, cause)
    }
}

/// Wires the page's background videos and returns the controller so other
/// components (the asset poller) can ask for a re-evaluation.
pub fn install(
    window: &Window,
    doc: &Document,
    scheduler: Rc<dyn Scheduler>,
) -> Result<Rc<BrowserBackgrounds>, DomError> {
    let surface = Rc::new(VideoSurface::discover(doc, &SLOTS));
    let probe = BrowserProbe::new(window.clone());
    let connection = probe.connection();
    let controller = BackgroundController::new(&SLOTS, scheduler, surface.clone(), probe);

    let weak = Rc::downgrade(&controller);
    surface.set_failure_hook(Rc::new(move |slot| {
        if let Some(controller) = weak.upgrade() {
            BackgroundController::media_failed(&controller, slot);
        }
    }));

    for (slot, video) in surface.elements() {
        let name = SLOTS[slot].name;
        let weak = Rc::downgrade(&controller);
        dom::listen(video, "error", move |_: Event| {
            warn!("{} video failed to load", name);
            if let Some(controller) = weak.upgrade() {
                BackgroundController::media_failed(&controller, slot);
            }
        })?;
        for event in ["canplaythrough", "loadeddata"] {
            let target = video.clone();
            dom::listen(video, event, move |_: Event| {
                let _ = target.class_list().add_1("loaded");
                debug!("{} video {}", name, event);
            })?;
        }

        if let Some(section) = dom::containing_section(video) {
            let weak = Rc::downgrade(&controller);
            dom::observe_intersections(&[section], VISIBILITY, move |entry, _| {
                if let Some(controller) = weak.upgrade() {
                    BackgroundController::visibility_changed(&controller, slot, entry.is_intersecting());
                }
            })?;
        }
    }

    if let Some(connection) = connection {
        let weak = Rc::downgrade(&controller);
        dom::listen(&connection, "change", move |_: Event| {
            if let Some(controller) = weak.upgrade() {
                BackgroundController::network_changed(&controller);
            }
        })?;
    }

    let weak = Rc::downgrade(&controller);
    dom::listen(window, "resize", move |_: Event| {
        if let Some(controller) = weak.upgrade() {
            BackgroundController::resized(&controller);
        }
    })?;

    BackgroundController::initialize(&controller);
    Ok(controller)
}

/// Lazy-loads decorative `.section-bg-image` elements as they approach.
pub fn install_lazy_images(doc: &Document) -> Result<(), DomError> {
    let images = dom::query_all(doc, ".section-bg-image");
    if images.is_empty() {
        return Ok(());
    }
    dom::observe_intersections(&images, LAZY_IMAGES, |entry, observer| {
        if !entry.is_intersecting() {
            return;
        }
        let target: Element = entry.target();
        observer.unobserve(&target);
        let Ok(image) = target.dyn_into::<HtmlImageElement>() else {
            return;
        };
        let loaded = image.clone();
        let _ = dom::listen(&image, "load", move |_: Event| {
            let _ = loaded.class_list().add_1("loaded");
        });
        let failed: HtmlElement = image.clone().into();
        let _ = dom::listen(&image, "error", move |_: Event| {
            warn!("Background image failed to load: {:?}", failed.get_attribute("src"));
            dom::apply_style(&failed, &[("display", "none")]);
        });
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::EffectiveType;
    use crate::scheduler::ManualScheduler;

    fn env(width: f64, reduced_motion: bool, effective_type: EffectiveType) -> Environment {
        Environment {
            viewport_width: width,
            reduced_motion,
            effective_type,
        }
    }

    fn wide() -> Environment {
        env(1440.0, false, EffectiveType::FourG)
    }

    #[test]
    fn narrow_viewports_always_fall_back() {
        for width in [0.0, 320.0, 480.0, 767.0, 768.0] {
            for kind in [
                EffectiveType::Slow2g,
                EffectiveType::TwoG,
                EffectiveType::ThreeG,
                EffectiveType::FourG,
                EffectiveType::Unknown,
            ] {
                let mut manager = BackgroundManager::new(&SLOTS);
                let commands = manager.initialize(&env(width, false, kind));
                assert!(commands
                    .iter()
                    .all(|c| matches!(c, SlotCommand::Fallback { .. })));
                assert_eq!(commands.len(), SLOTS.len());

                let later = manager.network_changed(&env(width, false, EffectiveType::FourG));
                assert!(later.is_empty(), "width {} must never schedule playback", width);
            }
        }
    }

    #[test]
    fn slow_networks_suppress_and_fast_networks_play() {
        for kind in [EffectiveType::Slow2g, EffectiveType::TwoG] {
            assert_eq!(
                decide(&env(1024.0, false, kind)),
                Presentation::Fallback(Suppression::SlowNetwork)
            );
        }
        for kind in [EffectiveType::ThreeG, EffectiveType::FourG] {
            assert_eq!(decide(&env(1024.0, false, kind)), Presentation::Video);
        }
    }

    #[test]
    fn reduced_motion_suppresses_video() {
        assert_eq!(
            decide(&env(1440.0, true, EffectiveType::FourG)),
            Presentation::Fallback(Suppression::ReducedMotion)
        );
    }

    #[test]
    fn unknown_network_on_wide_screen_plays() {
        assert_eq!(decide(&env(1440.0, false, EffectiveType::Unknown)), Presentation::Video);
    }

    #[test]
    fn video_mode_schedules_staggered_activations() {
        let mut manager = BackgroundManager::new(&SLOTS);
        let commands = manager.initialize(&wide());
        assert_eq!(
            commands,
            vec![
                SlotCommand::Schedule { slot: 0, delay: Duration::from_millis(100) },
                SlotCommand::Schedule { slot: 1, delay: Duration::from_millis(300) },
                SlotCommand::Schedule { slot: 2, delay: Duration::from_millis(500) },
            ]
        );
        assert!(manager.initialize(&wide()).is_empty(), "pending slots are not restarted");
    }

    #[test]
    fn suppression_wins_over_a_pending_activation() {
        let mut manager = BackgroundManager::new(&SLOTS);
        manager.initialize(&wide());
        manager.network_changed(&env(1440.0, false, EffectiveType::TwoG));
        assert_eq!(manager.activation_due(0), None);
        assert_eq!(manager.state(0), Some(SlotState::Suppressed));
    }

    #[test]
    fn visibility_pauses_and_resumes() {
        let mut manager = BackgroundManager::new(&SLOTS);
        manager.initialize(&wide());
        assert_eq!(manager.activation_due(0), Some(SlotCommand::Show { slot: 0, autoplay: true, reload: false }));
        assert_eq!(manager.visibility_changed(0, false), Some(SlotCommand::Pause { slot: 0 }));
        assert_eq!(manager.visibility_changed(0, false), None);
        assert_eq!(manager.visibility_changed(0, true), Some(SlotCommand::Play { slot: 0 }));
    }

    #[test]
    fn offscreen_slot_activates_paused() {
        let mut manager = BackgroundManager::new(&SLOTS);
        manager.initialize(&wide());
        manager.visibility_changed(1, false);
        assert_eq!(manager.activation_due(1), Some(SlotCommand::Show { slot: 1, autoplay: false, reload: false }));
        assert_eq!(manager.state(1), Some(SlotState::Paused));
    }

    #[test]
    fn media_failure_falls_back_and_retries_on_next_initialize() {
        let mut manager = BackgroundManager::new(&SLOTS);
        manager.initialize(&wide());
        manager.activation_due(2);
        assert_eq!(
            manager.media_failed(2),
            Some(SlotCommand::Fallback { slot: 2, cause: FallbackCause::MediaError })
        );
        assert_eq!(manager.media_failed(2), None);
        assert_eq!(
            manager.initialize(&wide()),
            vec![SlotCommand::Schedule { slot: 2, delay: Duration::from_millis(500) }]
        );
    }

    #[test]
    fn unknown_network_change_is_ignored() {
        let mut manager = BackgroundManager::new(&SLOTS);
        manager.initialize(&env(1440.0, false, EffectiveType::TwoG));
        assert!(manager
            .network_changed(&env(1440.0, false, EffectiveType::Unknown))
            .is_empty());
    }

    #[test]
    fn status_line_describes_each_video() {
        let playing = VideoStatus { loaded: true, playing: true };
        assert_eq!(
            status_line("services", Some(playing), Some(SlotState::Playing)),
            "services video: loaded, playing (Playing)"
        );
        let waiting = VideoStatus { loaded: false, playing: false };
        assert_eq!(status_line("contact", Some(waiting), None), "contact video: loading, paused");
        assert_eq!(
            status_line("service-item", None, Some(SlotState::Idle)),
            "service-item video: not found"
        );
    }

    #[test]
    fn resize_tracker_needs_more_than_the_delta() {
        let mut tracker = ResizeTracker::new(1200.0);
        assert!(!tracker.observe(1300.0));
        assert!(tracker.observe(1301.0));
        assert!(!tracker.observe(1250.0));
        assert!(tracker.observe(700.0));
    }

    #[derive(Default)]
    struct RecordingSurface {
        log: RefCell<Vec<(&'static str, usize)>>,
    }

    impl RecordingSurface {
        fn take(&self) -> Vec<(&'static str, usize)> {
            self.log.borrow_mut().drain(..).collect()
        }
    }

    impl MediaSurface for RecordingSurface {
        fn show(&self, slot: usize, reload: bool) {
            let label = if reload { "reload" } else { "show" };
            self.log.borrow_mut().push((label, slot));
        }
        fn play(&self, slot: usize) {
            self.log.borrow_mut().push(("play", slot));
        }
        fn pause(&self, slot: usize) {
            self.log.borrow_mut().push(("pause", slot));
        }
        fn fallback(&self, slot: usize, cause: FallbackCause) {
            let label = match cause {
                FallbackCause::Suppressed => "fallback",
                FallbackCause::MediaError => "error-fallback",
            };
            self.log.borrow_mut().push((label, slot));
        }
    }

    struct FixedProbe(Rc<Cell<Environment>>);

    impl EnvironmentProbe for FixedProbe {
        fn snapshot(&self) -> Environment {
            self.0.get()
        }
    }

    struct Harness {
        scheduler: Rc<ManualScheduler>,
        surface: Rc<RecordingSurface>,
        env: Rc<Cell<Environment>>,
        controller: Rc<BackgroundController<Rc<ManualScheduler>, Rc<RecordingSurface>, FixedProbe>>,
    }

    fn harness(initial: Environment) -> Harness {
        let scheduler = Rc::new(ManualScheduler::default());
        let surface = Rc::new(RecordingSurface::default());
        let env = Rc::new(Cell::new(initial));
        let controller = BackgroundController::new(
            &SLOTS,
            scheduler.clone(),
            surface.clone(),
            FixedProbe(env.clone()),
        );
        Harness { scheduler, surface, env, controller }
    }

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn controller_staggers_activation_and_delays_playback() {
        let h = harness(wide());
        BackgroundController::initialize(&h.controller);
        assert!(h.surface.take().is_empty());

        h.scheduler.advance(ms(100));
        assert_eq!(h.surface.take(), vec![("show", 0)]);
        h.scheduler.advance(ms(100));
        assert_eq!(h.surface.take(), vec![("play", 0)]);

        h.scheduler.advance(ms(100));
        assert_eq!(h.surface.take(), vec![("show", 1)]);
        h.scheduler.advance(ms(300));
        assert_eq!(h.surface.take(), vec![("play", 1), ("show", 2), ("play", 2)]);
        assert_eq!(h.scheduler.pending(), 0);
    }

    #[test]
    fn controller_never_plays_on_narrow_viewport() {
        let h = harness(env(375.0, false, EffectiveType::FourG));
        BackgroundController::initialize(&h.controller);
        BackgroundController::network_changed(&h.controller);
        h.scheduler.advance(Duration::from_secs(5));
        let log = h.surface.take();
        assert_eq!(log, vec![("fallback", 0), ("fallback", 1), ("fallback", 2)]);
    }

    #[test]
    fn controller_cancels_pending_activations_on_slow_network() {
        let h = harness(wide());
        BackgroundController::initialize(&h.controller);
        h.scheduler.advance(ms(150));
        h.surface.take();

        h.env.set(env(1440.0, false, EffectiveType::Slow2g));
        BackgroundController::network_changed(&h.controller);
        assert_eq!(h.surface.take(), vec![("fallback", 0), ("fallback", 1), ("fallback", 2)]);

        h.scheduler.advance(Duration::from_secs(2));
        assert!(h.surface.take().is_empty());
        assert_eq!(h.scheduler.pending(), 0);
    }

    #[test]
    fn controller_pauses_offscreen_video_before_delayed_play() {
        let h = harness(wide());
        BackgroundController::initialize(&h.controller);
        h.scheduler.advance(ms(100));
        BackgroundController::visibility_changed(&h.controller, 0, false);
        h.scheduler.advance(ms(100));
        assert_eq!(h.surface.take(), vec![("show", 0), ("pause", 0)]);
    }

    #[test]
    fn controller_falls_back_on_media_failure() {
        let h = harness(wide());
        BackgroundController::initialize(&h.controller);
        h.scheduler.advance(ms(600));
        h.surface.take();
        BackgroundController::media_failed(&h.controller, 1);
        assert_eq!(h.surface.take(), vec![("error-fallback", 1)]);
        assert_eq!(h.controller.slot_state(1), Some(SlotState::Failed));
    }

    #[test]
    fn failed_slot_reloads_its_source_when_initialized_again() {
        let h = harness(wide());
        BackgroundController::initialize(&h.controller);
        h.scheduler.advance(ms(600));
        BackgroundController::media_failed(&h.controller, 1);
        h.surface.take();

        BackgroundController::initialize(&h.controller);
        h.scheduler.advance(ms(300));
        assert_eq!(h.surface.take(), vec![("reload", 1)]);
        h.scheduler.advance(ms(100));
        assert_eq!(h.surface.take(), vec![("play", 1)]);
        assert_eq!(h.controller.slot_state(1), Some(SlotState::Playing));

        BackgroundController::media_failed(&h.controller, 1);
        BackgroundController::network_changed(&h.controller);
        h.surface.take();
        BackgroundController::initialize(&h.controller);
        h.scheduler.advance(ms(300));
        assert_eq!(h.surface.take(), vec![("reload", 1)]);
    }

    #[test]
    fn reload_is_not_requested_after_plain_suppression() {
        let mut manager = BackgroundManager::new(&SLOTS);
        manager.initialize(&env(1440.0, false, EffectiveType::TwoG));
        manager.initialize(&wide());
        assert_eq!(
            manager.activation_due(0),
            Some(SlotCommand::Show { slot: 0, autoplay: true, reload: false })
        );
    }

    #[test]
    fn resize_is_debounced_and_needs_a_significant_change() {
        let h = harness(wide());
        BackgroundController::initialize(&h.controller);
        h.scheduler.advance(ms(600));
        h.surface.take();

        h.env.set(env(1400.0, false, EffectiveType::FourG));
        BackgroundController::resized(&h.controller);
        h.scheduler.advance(ms(300));
        assert!(h.surface.take().is_empty());

        h.env.set(env(600.0, false, EffectiveType::FourG));
        BackgroundController::resized(&h.controller);
        h.scheduler.advance(ms(100));
        BackgroundController::resized(&h.controller);
        h.scheduler.advance(ms(200));
        assert!(h.surface.take().is_empty(), "second resize supersedes the first");
        h.scheduler.advance(ms(50));
        assert_eq!(h.surface.take(), vec![("fallback", 0), ("fallback", 1), ("fallback", 2)]);
    }
}
