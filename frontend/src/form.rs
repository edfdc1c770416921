use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use wasm_bindgen::JsCast;
use web_sys::{
    Document, Element, Event, HtmlButtonElement, HtmlElement, HtmlFormElement, HtmlInputElement,
    HtmlSelectElement, HtmlTextAreaElement,
};

use crate::dom::{self, DomError};
use crate::notify::{self, NotificationKind};
use crate::scheduler::Scheduler;

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

pub const SUBMITTING_LABEL: &str = "Envoi en cours...";
pub const INVALID_FORM_MESSAGE: &str = "Veuillez corriger les erreurs dans le formulaire.";
const CONFIRMATION_VISIBLE: Duration = Duration::from_millis(5000);
const FOCUS_DELAY: Duration = Duration::from_millis(100);

pub fn is_valid_email(value: &str) -> bool {
    EMAIL.is_match(value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Email,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldInput<'a> {
    pub kind: FieldKind,
    pub required: bool,
    pub value: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldProblem {
    Missing,
    MalformedEmail,
}

pub fn check_field(field: &FieldInput) -> Option<FieldProblem> {
    if field.required && field.value.trim().is_empty() {
        Some(FieldProblem::Missing)
    } else if field.kind == FieldKind::Email && !field.value.is_empty() && !is_valid_email(field.value) {
        Some(FieldProblem::MalformedEmail)
    } else {
        None
    }
}

/// Indexes of the fields blocking submission.
pub fn validate(fields: &[FieldInput]) -> Vec<(usize, FieldProblem)> {
    fields
        .iter()
        .enumerate()
        .filter_map(|(i, field)| check_field(field).map(|problem| (i, problem)))
        .collect()
}

/// Visual treatment of a form input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldStyle {
    /// Inline overrides removed; the stylesheet decides.
    Neutral,
    Resting,
    Focused,
    Error,
    /// Error flagged on leaving the field, over the resting background.
    BlurError,
}

impl FieldStyle {
    pub fn after_blur(field: &FieldInput) -> Self {
        if check_field(field).is_some() {
            FieldStyle::BlurError
        } else {
            FieldStyle::Resting
        }
    }

    /// Typing clears a previously flagged error.
    pub fn after_input(self) -> Self {
        match self {
            FieldStyle::Error | FieldStyle::BlurError => FieldStyle::Resting,
            other => other,
        }
    }

    pub fn declarations(self) -> &'static [(&'static str, &'static str)] {
        match self {
            FieldStyle::Neutral => &[("border-color", ""), ("box-shadow", "")],
            FieldStyle::Resting => &[
                ("border-color", "rgba(255, 255, 255, 0.3)"),
                ("box-shadow", ""),
                ("background", "rgba(255, 255, 255, 0.1)"),
            ],
            FieldStyle::Focused => &[
                ("border-color", "rgba(255, 255, 255, 0.8)"),
                ("box-shadow", "0 0 0 1px rgba(255, 255, 255, 0.8)"),
                ("background", "rgba(255, 255, 255, 0.15)"),
            ],
            FieldStyle::Error => &[("border-color", "#ef4444"), ("box-shadow", "0 0 0 1px #ef4444")],
            FieldStyle::BlurError => &[
                ("border-color", "#ef4444"),
                ("box-shadow", "0 0 0 1px #ef4444"),
                ("background", "rgba(255, 255, 255, 0.1)"),
            ],
        }
    }
}

/// Last style applied to each field, keyed by element identity.
#[derive(Debug)]
pub struct StyleBook<K> {
    entries: Vec<(K, FieldStyle)>,
}

impl<K> Default for StyleBook<K> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<K: PartialEq> StyleBook<K> {
    pub fn get(&self, key: &K) -> Option<FieldStyle> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, style)| *style)
    }

    pub fn set(&mut self, key: K, style: FieldStyle) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = style,
            None => self.entries.push((key, style)),
        }
    }
}

/// Which half of the contact block is on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactPanel {
    Info,
    Form,
}

impl ContactPanel {
    pub fn toggled(self) -> Self {
        match self {
            ContactPanel::Info => ContactPanel::Form,
            ContactPanel::Form => ContactPanel::Info,
        }
    }

    pub fn button_label(self) -> &'static str {
        match self {
            ContactPanel::Info => "PRENDRE CONTACT",
            ContactPanel::Form => "ANNULER",
        }
    }
}

struct Field {
    element: HtmlElement,
    kind: FieldKind,
    required: bool,
    value: String,
}

impl Field {
    fn read(el: &Element) -> Option<Self> {
        let (kind, required, value) = if let Some(input) = el.dyn_ref::<HtmlInputElement>() {
            let kind = if input.type_() == "email" {
                FieldKind::Email
            } else {
                FieldKind::Text
            };
            (kind, input.required(), input.value())
        } else if let Some(area) = el.dyn_ref::<HtmlTextAreaElement>() {
            (FieldKind::Text, area.required(), area.value())
        } else if let Some(select) = el.dyn_ref::<HtmlSelectElement>() {
            (FieldKind::Text, select.required(), select.value())
        } else {
            return None;
        };
        Some(Self {
            element: dom::as_html(el)?,
            kind,
            required,
            value,
        })
    }

    fn input(&self) -> FieldInput<'_> {
        FieldInput {
            kind: self.kind,
            required: self.required,
            value: &self.value,
        }
    }
}

type SharedBook = Rc<RefCell<StyleBook<HtmlElement>>>;

fn paint(book: &SharedBook, el: &HtmlElement, style: FieldStyle) {
    dom::apply_style(el, style.declarations());
    book.borrow_mut().set(el.clone(), style);
}

pub fn install(doc: &Document, scheduler: Rc<dyn Scheduler>) -> Result<(), DomError> {
    let book: SharedBook = Rc::default();
    if let Some(form) = dom::query(doc, ".contact-form") {
        install_validation(&form, &book)?;
    }
    install_contact_panel(doc, scheduler)?;
    Ok(())
}

fn install_validation(form: &Element, book: &SharedBook) -> Result<(), DomError> {
    let button = dom::query_all_in(form, ".form-submit")
        .into_iter()
        .next()
        .and_then(|el| el.dyn_into::<HtmlButtonElement>().ok());
    let idle_label = button
        .as_ref()
        .and_then(|b| b.text_content())
        .unwrap_or_default();

    let submit_form = form.clone();
    let submit_book = book.clone();
    dom::listen(form, "submit", move |e: Event| {
        if let Some(button) = &button {
            button.set_disabled(true);
            button.set_text_content(Some(SUBMITTING_LABEL));
            dom::apply_style(button, &[("opacity", "0.7")]);
        }

        let fields: Vec<Field> = dom::query_all_in(&submit_form, "[required], input[type=\"email\"]")
            .iter()
            .filter_map(Field::read)
            .collect();
        let inputs: Vec<FieldInput> = fields.iter().map(Field::input).collect();
        let problems = validate(&inputs);

        for (i, field) in fields.iter().enumerate() {
            let flagged = problems.iter().any(|(index, _)| *index == i);
            if flagged {
                paint(&submit_book, &field.element, FieldStyle::Error);
            } else if field.required {
                paint(&submit_book, &field.element, FieldStyle::Neutral);
            }
        }

        if problems.is_empty() {
            info!("Contact form passed validation, submitting");
            return;
        }

        e.prevent_default();
        if let Some(button) = &button {
            button.set_disabled(false);
            button.set_text_content(Some(idle_label.as_str()));
            dom::apply_style(button, &[("opacity", "1")]);
        }
        notify::show_or_log(INVALID_FORM_MESSAGE, NotificationKind::Error);
    })?;

    for el in dom::query_all_in(form, ".form-input") {
        let Some(html) = dom::as_html(&el) else { continue };

        let focus_book = book.clone();
        let focused = html.clone();
        dom::listen(&el, "focus", move |_: Event| {
            paint(&focus_book, &focused, FieldStyle::Focused);
        })?;

        let blur_book = book.clone();
        let blurred = el.clone();
        dom::listen(&el, "blur", move |_: Event| {
            if let Some(field) = Field::read(&blurred) {
                paint(&blur_book, &field.element, FieldStyle::after_blur(&field.input()));
            }
        })?;

        let input_book = book.clone();
        dom::listen(&el, "input", move |_: Event| {
            let current = input_book.borrow().get(&html);
            if let Some(current) = current {
                let next = current.after_input();
                if next != current {
                    paint(&input_book, &html, next);
                }
            }
        })?;
    }
    Ok(())
}

fn install_contact_panel(doc: &Document, scheduler: Rc<dyn Scheduler>) -> Result<(), DomError> {
    let button = dom::query(doc, ".hau-contact-button");
    let form_section = dom::query(doc, ".contact-form-section").and_then(|el| dom::as_html(&el));
    let info_section = dom::query(doc, ".contact-info-section").and_then(|el| dom::as_html(&el));
    let (Some(button), Some(form_section)) = (button, form_section) else {
        return Ok(());
    };

    let initial = if form_section.style().get_property_value("display").ok().as_deref() == Some("none") {
        ContactPanel::Info
    } else {
        ContactPanel::Form
    };
    let panel = Rc::new(Cell::new(initial));

    let render = {
        let button = button.clone();
        let form_section = form_section.clone();
        let info_section = info_section.clone();
        Rc::new(move |state: ContactPanel| {
            let (form_display, info_display) = match state {
                ContactPanel::Form => ("block", "none"),
                ContactPanel::Info => ("none", "block"),
            };
            dom::apply_style(&form_section, &[("display", form_display)]);
            if let Some(info) = &info_section {
                dom::apply_style(info, &[("display", info_display)]);
            }
            button.set_text_content(Some(state.button_label()));
        })
    };

    {
        let panel = panel.clone();
        let render = render.clone();
        let form_section = form_section.clone();
        let scheduler = scheduler.clone();
        dom::listen(&button, "click", move |_: Event| {
            let next = panel.get().toggled();
            panel.set(next);
            render(next);
            if next == ContactPanel::Form {
                let first = dom::query_all_in(&form_section, "input[type=\"text\"]")
                    .into_iter()
                    .next()
                    .and_then(|el| dom::as_html(&el));
                if let Some(first) = first {
                    scheduler.schedule(FOCUS_DELAY, Box::new(move || {
                        let _ = first.focus();
                    }));
                }
            }
        })?;
    }

    if let Some(form) = dom::query(doc, ".hau-contact-form") {
        let success = dom::query(doc, "#contact-success").and_then(|el| dom::as_html(&el));
        let reset_target = form.dyn_ref::<HtmlFormElement>().cloned();
        dom::listen(&form, "submit", move |_: Event| {
            if let Some(success) = &success {
                dom::apply_style(success, &[("display", "block")]);
                let success = success.clone();
                scheduler.schedule(CONFIRMATION_VISIBLE, Box::new(move || {
                    dom::apply_style(&success, &[("display", "none")]);
                }));
            }
            if let Some(form) = &reset_target {
                form.reset();
            }
            panel.set(ContactPanel::Info);
            render(ContactPanel::Info);
            info!("Contact form submitted to the form handler");
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(value: &str) -> FieldInput<'_> {
        FieldInput {
            kind: FieldKind::Email,
            required: true,
            value,
        }
    }

    fn text(value: &str, required: bool) -> FieldInput<'_> {
        FieldInput {
            kind: FieldKind::Text,
            required,
            value,
        }
    }

    #[test]
    fn email_needs_a_dotted_domain() {
        assert!(!is_valid_email("a@b"));
        assert!(is_valid_email("a@b.com"));
        assert!(is_valid_email("prenom.nom@mass-com.co.cd"));
        assert!(!is_valid_email("a b@c.com"));
        assert!(!is_valid_email("@b.com"));
        assert!(!is_valid_email("a@@b.com"));
    }

    #[test]
    fn blank_required_fields_block_submission() {
        let fields = [text("Jean", true), text("   ", true), text("", false), email("a@b.com")];
        assert_eq!(validate(&fields), vec![(1, FieldProblem::Missing)]);
    }

    #[test]
    fn malformed_email_blocks_submission() {
        let fields = [text("Jean", true), email("a@b")];
        assert_eq!(validate(&fields), vec![(1, FieldProblem::MalformedEmail)]);
    }

    #[test]
    fn optional_empty_email_is_fine() {
        let optional = FieldInput {
            kind: FieldKind::Email,
            required: false,
            value: "",
        };
        assert_eq!(check_field(&optional), None);
    }

    #[test]
    fn blur_flags_or_rests() {
        assert_eq!(FieldStyle::after_blur(&text("", true)), FieldStyle::BlurError);
        assert_eq!(FieldStyle::after_blur(&email("nope")), FieldStyle::BlurError);
        assert_eq!(FieldStyle::after_blur(&email("a@b.com")), FieldStyle::Resting);
        assert_eq!(FieldStyle::after_blur(&text("", false)), FieldStyle::Resting);
    }

    #[test]
    fn typing_clears_only_errors() {
        assert_eq!(FieldStyle::Error.after_input(), FieldStyle::Resting);
        assert_eq!(FieldStyle::BlurError.after_input(), FieldStyle::Resting);
        assert_eq!(FieldStyle::Focused.after_input(), FieldStyle::Focused);
    }

    #[test]
    fn focus_and_error_styles_are_fixed() {
        assert_eq!(FieldStyle::Focused.declarations(), FieldStyle::Focused.declarations());
        assert!(FieldStyle::Error
            .declarations()
            .iter()
            .any(|(prop, value)| *prop == "border-color" && *value == "#ef4444"));
    }

    #[test]
    fn invalid_field_drops_the_focus_background_on_blur() {
        let style = FieldStyle::after_blur(&text("", true));
        let background = |s: FieldStyle| {
            s.declarations()
                .iter()
                .find(|(prop, _)| *prop == "background")
                .map(|(_, value)| *value)
        };
        assert_eq!(background(style), Some("rgba(255, 255, 255, 0.1)"));
        assert_eq!(background(style), background(FieldStyle::Resting));
        assert_ne!(background(style), background(FieldStyle::Focused));
    }

    #[test]
    fn style_book_overwrites_by_key() {
        let mut book = StyleBook::default();
        book.set("name", FieldStyle::Focused);
        book.set("email", FieldStyle::Error);
        book.set("name", FieldStyle::Error);
        assert_eq!(book.get(&"name"), Some(FieldStyle::Error));
        assert_eq!(book.get(&"email"), Some(FieldStyle::Error));
        assert_eq!(book.get(&"message"), None);
    }

    #[test]
    fn contact_panel_toggles_label() {
        let panel = ContactPanel::Info.toggled();
        assert_eq!(panel, ContactPanel::Form);
        assert_eq!(panel.button_label(), "ANNULER");
        assert_eq!(panel.toggled().button_label(), "PRENDRE CONTACT");
    }
}
