use std::cell::{Cell, RefCell};
use std::rc::Rc;

use log::debug;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlElement, KeyboardEvent, MouseEvent, Node, Window};

use crate::dom::{self, DomError, FrameGate};

pub const HEADER_SCROLL_THRESHOLD: f64 = 100.0;
/// Space left above a section when jumping to it from the menu.
pub const ANCHOR_OFFSET: f64 = 80.0;
/// Extra lead before a section counts as the current one.
const SECTION_LEAD: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuState {
    Closed,
    Open,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuEvent {
    Toggle,
    LinkClicked,
    OutsideClick,
    Escape,
}

impl MenuState {
    pub fn on(self, event: MenuEvent) -> Self {
        match (self, event) {
            (MenuState::Closed, MenuEvent::Toggle) => MenuState::Open,
            (MenuState::Open, MenuEvent::Toggle) => MenuState::Closed,
            (_, MenuEvent::LinkClicked | MenuEvent::OutsideClick | MenuEvent::Escape) => {
                MenuState::Closed
            }
        }
    }

    pub fn is_open(self) -> bool {
        self == MenuState::Open
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderAppearance {
    pub background: &'static str,
    pub backdrop: &'static str,
    pub back_to_top: bool,
}

impl HeaderAppearance {
    pub fn for_scroll(offset: f64) -> Self {
        if offset > HEADER_SCROLL_THRESHOLD {
            Self {
                background: "rgba(255, 255, 255, 0.98)",
                backdrop: "blur(15px)",
                back_to_top: true,
            }
        } else {
            Self {
                background: "rgba(255, 255, 255, 0.95)",
                backdrop: "blur(10px)",
                back_to_top: false,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SectionBounds {
    pub id: String,
    pub top: f64,
    pub height: f64,
}

/// The section whose (nav-adjusted) span contains the scroll offset. When
/// spans overlap the later section wins.
pub fn active_section(sections: &[SectionBounds], scroll_top: f64, nav_height: f64) -> Option<&str> {
    sections
        .iter()
        .filter(|section| {
            let top = section.top - nav_height - SECTION_LEAD;
            scroll_top >= top && scroll_top < top + section.height
        })
        .last()
        .map(|section| section.id.as_str())
}

/// `#id` links scroll in-page; anything else navigates normally.
pub fn anchor_target(href: &str) -> Option<&str> {
    href.strip_prefix('#').filter(|id| !id.is_empty())
}

struct Menu {
    container: Element,
    links: Element,
    toggle: Element,
    state: Cell<MenuState>,
}

impl Menu {
    fn send(&self, event: MenuEvent) {
        let next = self.state.get().on(event);
        if next != self.state.get() {
            debug!("Menu {:?} -> {:?}", self.state.get(), next);
        }
        self.state.set(next);
        let open = next.is_open();
        let _ = self.links.class_list().toggle_with_force("active", open);
        let _ = self.toggle.class_list().toggle_with_force("active", open);
    }
}

pub fn install(window: &Window, doc: &Document) -> Result<(), DomError> {
    let container = dom::query(doc, "#floating-nav");
    let links = dom::query(doc, ".nav-links");
    let toggle = dom::query(doc, "#mobile-toggle");
    let back_to_top = dom::query(doc, "#backToTop").and_then(|el| dom::as_html(&el));

    let menu = match (container.clone(), links, toggle) {
        (Some(container), Some(links), Some(toggle)) => Some(Rc::new(Menu {
            container,
            links,
            toggle,
            state: Cell::new(MenuState::Closed),
        })),
        _ => {
            debug!("Mobile menu markup not present");
            None
        }
    };

    if let Some(menu) = &menu {
        install_menu(doc, menu)?;
    }

    for link in dom::query_all(doc, ".nav-link") {
        let menu = menu.clone();
        let window = window.clone();
        let doc = doc.clone();
        let href = link.get_attribute("href").unwrap_or_default();
        dom::listen(&link, "click", move |e: MouseEvent| {
            if let Some(menu) = &menu {
                menu.send(MenuEvent::LinkClicked);
            }
            if let Some(id) = anchor_target(&href) {
                e.prevent_default();
                if let Some(target) = doc.get_element_by_id(id).and_then(|el| dom::as_html(&el)) {
                    dom::smooth_scroll_to(&window, f64::from(target.offset_top()) - ANCHOR_OFFSET);
                }
            }
        })?;
    }

    if let Some(button) = &back_to_top {
        let window = window.clone();
        dom::listen(button, "click", move |_: MouseEvent| {
            dom::smooth_scroll_to(&window, 0.0);
        })?;
    }

    let header = container.and_then(|el| dom::as_html(&el));
    let gate = Rc::new(RefCell::new(FrameGate::default()));
    let scroll_window = window.clone();
    let doc = doc.clone();
    dom::listen(window, "scroll", move |_: web_sys::Event| {
        if !gate.borrow_mut().request() {
            return;
        }
        let frame_gate = gate.clone();
        let window = scroll_window.clone();
        let doc = doc.clone();
        let header = header.clone();
        let back_to_top = back_to_top.clone();
        let scheduled = dom::request_frame(move || {
            update_on_scroll(&window, &doc, header.as_ref(), back_to_top.as_ref());
            frame_gate.borrow_mut().release();
        });
        if scheduled.is_err() {
            gate.borrow_mut().release();
        }
    })?;
    Ok(())
}

fn install_menu(doc: &Document, menu: &Rc<Menu>) -> Result<(), DomError> {
    let toggle_menu = menu.clone();
    dom::listen(&menu.toggle, "click", move |_: MouseEvent| {
        toggle_menu.send(MenuEvent::Toggle);
    })?;

    let outside_menu = menu.clone();
    dom::listen(doc, "click", move |e: MouseEvent| {
        let target = e.target().and_then(|t| t.dyn_into::<Node>().ok());
        if !outside_menu.container.contains(target.as_ref()) {
            outside_menu.send(MenuEvent::OutsideClick);
        }
    })?;

    let escape_menu = menu.clone();
    dom::listen(doc, "keydown", move |e: KeyboardEvent| {
        if e.key() == "Escape" && escape_menu.state.get().is_open() {
            escape_menu.send(MenuEvent::Escape);
        }
    })?;
    Ok(())
}

fn update_on_scroll(
    window: &Window,
    doc: &Document,
    header: Option<&HtmlElement>,
    back_to_top: Option<&HtmlElement>,
) {
    let offset = dom::scroll_offset(window);
    let appearance = HeaderAppearance::for_scroll(offset);
    if let Some(header) = header {
        dom::apply_style(
            header,
            &[
                ("background", appearance.background),
                ("backdrop-filter", appearance.backdrop),
            ],
        );
    }
    if let Some(button) = back_to_top {
        let _ = button.class_list().toggle_with_force("show", appearance.back_to_top);
    }

    let sections: Vec<SectionBounds> = dom::query_all(doc, "section[id], main[id]")
        .iter()
        .filter_map(|el| {
            let html = dom::as_html(el)?;
            Some(SectionBounds {
                id: el.id(),
                top: f64::from(html.offset_top()),
                height: f64::from(html.offset_height()),
            })
        })
        .collect();
    let nav_height = header.map(|h| f64::from(h.offset_height())).unwrap_or(0.0);
    let current = active_section(&sections, offset, nav_height).map(|id| format!("#{}", id));

    for link in dom::query_all(doc, ".hau-nav-link") {
        let is_current = current.is_some() && link.get_attribute("href") == current;
        let _ = link.class_list().toggle_with_force("active", is_current);
    }
}
