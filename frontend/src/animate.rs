use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use log::debug;
use web_sys::{Document, Element, Event, HtmlElement, Window};

use crate::dom::{self, DomError, FrameGate, ObserveOptions};
use crate::environment::{prefers_reduced_motion, NARROW_VIEWPORT_MAX};
use crate::scheduler::Scheduler;

pub const REVEAL_STAGGER: Duration = Duration::from_millis(100);
pub const COUNTER_FRAMES: u32 = 60;
const REVEAL: ObserveOptions = ObserveOptions {
    threshold: 0.2,
    root_margin: Some("0px 0px -50px 0px"),
};
const COUNTER: ObserveOptions = ObserveOptions {
    threshold: 0.5,
    root_margin: None,
};

/// Fires once per element, however often it re-enters the viewport.
#[derive(Debug, Default)]
pub struct RevealLatch {
    fired: bool,
}

impl RevealLatch {
    /// Delay before revealing the `index`-th item, or `None` if it already
    /// revealed.
    pub fn trigger(&mut self, index: usize) -> Option<Duration> {
        if self.fired {
            return None;
        }
        self.fired = true;
        let index = u32::try_from(index).unwrap_or(u32::MAX);
        Some(REVEAL_STAGGER.saturating_mul(index))
    }
}

/// A statistic like `"250+"` split into what gets counted and what stays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterSpec {
    pub prefix: String,
    pub target: u64,
    pub suffix: String,
}

impl CounterSpec {
    /// Digits anywhere between the first and last digit are joined, so
    /// `"1,200+"` counts to 1200. `None` when there is nothing to count.
    pub fn parse(text: &str) -> Option<Self> {
        let first = text.find(|c: char| c.is_ascii_digit())?;
        let last = text.rfind(|c: char| c.is_ascii_digit())?;
        let digits: String = text[first..=last]
            .chars()
            .filter(char::is_ascii_digit)
            .collect();
        Some(Self {
            prefix: text[..first].to_string(),
            target: digits.parse().ok()?,
            suffix: text[last + 1..].to_string(),
        })
    }

    /// Text for the given frame; frame `COUNTER_FRAMES` shows the target.
    pub fn frame(&self, step: u32) -> String {
        let step = step.min(COUNTER_FRAMES);
        let value = u128::from(self.target) * u128::from(step) / u128::from(COUNTER_FRAMES);
        format!("{}{}{}", self.prefix, value, self.suffix)
    }
}

/// Hero opacity for a scroll offset: fades to half over the hero's height.
pub fn hero_opacity(scrolled: f64, hero_height: f64) -> f64 {
    if hero_height <= 0.0 {
        return 1.0;
    }
    let ratio = (scrolled / hero_height).clamp(0.0, 1.0);
    (1.0 - ratio * 0.5).max(0.5)
}

pub fn portfolio_link(project: &str) -> String {
    format!("portfolio.html#{}", project)
}

pub fn install(window: &Window, doc: &Document, scheduler: Rc<dyn Scheduler>) -> Result<(), DomError> {
    install_reveal(doc, scheduler)?;
    install_counters(doc)?;
    install_hero_fade(window, doc)?;
    install_work_items(window, doc)?;
    Ok(())
}

fn install_reveal(doc: &Document, scheduler: Rc<dyn Scheduler>) -> Result<(), DomError> {
    for (index, item) in dom::query_all(doc, ".service-item").into_iter().enumerate() {
        let Some(html) = dom::as_html(&item) else { continue };
        dom::apply_style(
            &html,
            &[
                ("opacity", "0"),
                ("transform", "translateY(30px)"),
                ("transition", "all 0.8s ease-out"),
            ],
        );

        let latch = RefCell::new(RevealLatch::default());
        let scheduler = scheduler.clone();
        dom::observe_intersections(&[item], REVEAL, move |entry, observer| {
            if !entry.is_intersecting() {
                return;
            }
            observer.unobserve(&entry.target());
            if let Some(delay) = latch.borrow_mut().trigger(index) {
                let html = html.clone();
                scheduler.schedule(
                    delay,
                    Box::new(move || {
                        dom::apply_style(&html, &[("opacity", "1"), ("transform", "translateY(0)")]);
                    }),
                );
            }
        })?;
    }
    Ok(())
}

fn install_counters(doc: &Document) -> Result<(), DomError> {
    for counter in dom::query_all(doc, ".stat-number") {
        let Some(spec) = counter.text_content().as_deref().and_then(CounterSpec::parse) else {
            debug!("Skipping counter without a number: {:?}", counter.text_content());
            continue;
        };
        let spec = Rc::new(spec);
        let latch = RefCell::new(RevealLatch::default());
        dom::observe_intersections(&[counter], COUNTER, move |entry, observer| {
            if !entry.is_intersecting() {
                return;
            }
            let target = entry.target();
            observer.unobserve(&target);
            if latch.borrow_mut().trigger(0).is_some() {
                count_up(target, spec.clone(), 1);
            }
        })?;
    }
    Ok(())
}

fn count_up(el: Element, spec: Rc<CounterSpec>, step: u32) {
    el.set_text_content(Some(&spec.frame(step)));
    if step >= COUNTER_FRAMES {
        return;
    }
    let fallback = el.clone();
    let final_spec = spec.clone();
    if dom::request_frame(move || count_up(el, spec, step + 1)).is_err() {
        fallback.set_text_content(Some(&final_spec.frame(COUNTER_FRAMES)));
    }
}

fn install_hero_fade(window: &Window, doc: &Document) -> Result<(), DomError> {
    let Some(hero) = dom::query(doc, ".hero").and_then(|el| dom::as_html(&el)) else {
        return Ok(());
    };
    if prefers_reduced_motion(window) {
        return Ok(());
    }

    let gate = Rc::new(RefCell::new(FrameGate::default()));
    let scroll_window = window.clone();
    dom::listen(window, "scroll", move |_: Event| {
        if dom::viewport_width(&scroll_window) <= NARROW_VIEWPORT_MAX || !gate.borrow_mut().request() {
            return;
        }
        let frame_gate = gate.clone();
        let window = scroll_window.clone();
        let hero = hero.clone();
        let scheduled = dom::request_frame(move || {
            fade_hero(&window, &hero);
            frame_gate.borrow_mut().release();
        });
        if scheduled.is_err() {
            gate.borrow_mut().release();
        }
    })
}

fn fade_hero(window: &Window, hero: &HtmlElement) {
    let opacity = hero_opacity(dom::scroll_offset(window), f64::from(hero.offset_height()));
    let value = opacity.to_string();
    dom::apply_style(hero, &[("opacity", value.as_str())]);
}

fn install_work_items(window: &Window, doc: &Document) -> Result<(), DomError> {
    for item in dom::query_all(doc, ".work-item") {
        let Some(html) = dom::as_html(&item) else { continue };
        let lifted = html.clone();
        dom::listen(&item, "mouseenter", move |_: Event| {
            dom::apply_style(
                &lifted,
                &[
                    ("transform", "translateY(-8px) scale(1.02)"),
                    ("box-shadow", "0 25px 50px rgba(0, 0, 0, 0.2)"),
                ],
            );
        })?;
        dom::listen(&item, "mouseleave", move |_: Event| {
            dom::apply_style(
                &html,
                &[
                    ("transform", "translateY(-4px) scale(1)"),
                    ("box-shadow", "0 20px 40px rgba(0, 0, 0, 0.15)"),
                ],
            );
        })?;
    }

    for item in dom::query_all(doc, ".work-item-hau[data-project]") {
        let Some(project) = item.get_attribute("data-project") else { continue };
        let window = window.clone();
        dom::listen(&item, "click", move |_: Event| {
            let _ = window.location().set_href(&portfolio_link(&project));
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reveal_fires_once_with_index_stagger() {
        let mut latch = RevealLatch::default();
        assert_eq!(latch.trigger(3), Some(Duration::from_millis(300)));
        assert_eq!(latch.trigger(3), None);
        assert_eq!(latch.trigger(3), None);
    }

    #[test]
    fn first_item_reveals_immediately() {
        assert_eq!(RevealLatch::default().trigger(0), Some(Duration::ZERO));
    }

    #[test]
    fn counter_parses_target_and_suffix() {
        let spec = CounterSpec::parse("250+").unwrap();
        assert_eq!(spec.target, 250);
        assert_eq!(spec.suffix, "+");
        assert_eq!(spec.prefix, "");
    }

    #[test]
    fn counter_ends_on_exact_text() {
        let spec = CounterSpec::parse("250+").unwrap();
        let frames: Vec<String> = (1..=COUNTER_FRAMES).map(|step| spec.frame(step)).collect();
        assert_eq!(frames.len(), 60);
        assert_eq!(frames.last().map(String::as_str), Some("250+"));
        assert_eq!(frames[0], "4+");
    }

    #[test]
    fn counter_never_overshoots() {
        let spec = CounterSpec::parse("7 ans").unwrap();
        let mut previous = 0;
        for step in 1..=COUNTER_FRAMES + 5 {
            let shown: u64 = spec.frame(step).trim_end_matches(" ans").parse().unwrap();
            assert!(shown >= previous && shown <= 7);
            previous = shown;
        }
        assert_eq!(spec.frame(COUNTER_FRAMES), "7 ans");
    }

    #[test]
    fn counter_keeps_prefix_and_joins_grouped_digits() {
        let spec = CounterSpec::parse("$1,200+").unwrap();
        assert_eq!(spec.prefix, "$");
        assert_eq!(spec.target, 1200);
        assert_eq!(spec.suffix, "+");
        assert_eq!(spec.frame(COUNTER_FRAMES), "$1200+");
    }

    #[test]
    fn text_without_digits_is_not_a_counter() {
        assert_eq!(CounterSpec::parse("Clients"), None);
        assert_eq!(CounterSpec::parse(""), None);
    }

    #[test]
    fn hero_fades_to_half() {
        assert_eq!(hero_opacity(0.0, 800.0), 1.0);
        assert_eq!(hero_opacity(400.0, 800.0), 0.75);
        assert_eq!(hero_opacity(800.0, 800.0), 0.5);
        assert_eq!(hero_opacity(5000.0, 800.0), 0.5);
        assert_eq!(hero_opacity(100.0, 0.0), 1.0);
    }

    #[test]
    fn work_items_link_into_portfolio() {
        assert_eq!(portfolio_link("podcast-larza"), "portfolio.html#podcast-larza");
    }
}
