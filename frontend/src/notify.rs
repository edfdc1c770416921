use gloo_timers::callback::Timeout;
use log::warn;
use serde::{Deserialize, Serialize};
use wasm_bindgen::JsCast;
use web_sys::{CustomEvent, CustomEventInit, Document, Element};
use yew::prelude::*;

use crate::dom::{self, DomError};

/// `CustomEvent` other page scripts dispatch on `document` to raise a toast.
pub const NOTIFICATION_EVENT: &str = "showNotification";

const TOAST_STYLE: &str = "position: fixed; top: 100px; right: 20px; z-index: 9999; \
    min-width: 300px; max-width: 500px; \
    transition: transform 0.3s cubic-bezier(0.4, 0, 0.2, 1); \
    backdrop-filter: blur(10px); box-shadow: 0 10px 25px rgba(0, 0, 0, 0.1);";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Info,
    Success,
    Error,
}

impl NotificationKind {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "success" => NotificationKind::Success,
            "error" | "danger" => NotificationKind::Error,
            _ => NotificationKind::Info,
        }
    }

    pub fn alert_class(self) -> &'static str {
        match self {
            NotificationKind::Info => "alert alert-info",
            NotificationKind::Success => "alert alert-success",
            NotificationKind::Error => "alert alert-danger",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastPhase {
    Entering,
    Shown,
    Leaving,
    Gone,
}

impl ToastPhase {
    /// Next phase and how long the current one lasts, in milliseconds.
    pub fn next(self) -> Option<(ToastPhase, u32)> {
        match self {
            ToastPhase::Entering => Some((ToastPhase::Shown, 16)),
            ToastPhase::Shown => Some((ToastPhase::Leaving, 5000)),
            ToastPhase::Leaving => Some((ToastPhase::Gone, 300)),
            ToastPhase::Gone => None,
        }
    }

    pub fn transform(self) -> &'static str {
        match self {
            ToastPhase::Shown => "translateX(0)",
            _ => "translateX(100%)",
        }
    }
}

#[derive(Properties, PartialEq)]
pub struct ToastProps {
    pub message: String,
    pub kind: NotificationKind,
    /// Element the toast was mounted into; removed once the toast is gone.
    pub host: Element,
}

#[function_component(Toast)]
pub fn toast(props: &ToastProps) -> Html {
    let phase = use_state(|| ToastPhase::Entering);

    {
        let phase_setter = phase.setter();
        let host = props.host.clone();
        use_effect_with_deps(
            move |current: &ToastPhase| {
                if *current == ToastPhase::Gone {
                    host.remove();
                }
                let timeout = current.next().map(|(next, delay)| {
                    Timeout::new(delay, move || phase_setter.set(next))
                });
                move || drop(timeout)
            },
            *phase,
        );
    }

    if *phase == ToastPhase::Gone {
        return html! {};
    }

    let style = format!("{} transform: {};", TOAST_STYLE, phase.transform());
    html! {
        <div class={props.kind.alert_class()} style={style} role="status">
            { &props.message }
        </div>
    }
}

pub fn show(message: &str, kind: NotificationKind) -> Result<(), DomError> {
    let doc = dom::document()?;
    let body = doc.body().ok_or(DomError::Missing("body"))?;
    let host = doc.create_element("div")?;
    body.append_child(&host)?;
    yew::Renderer::<Toast>::with_root_and_props(
        host.clone(),
        ToastProps {
            message: message.to_string(),
            kind,
            host,
        },
    )
    .render();
    Ok(())
}

/// Notifications are cosmetic; failing to draw one is only logged.
pub fn show_or_log(message: &str, kind: NotificationKind) {
    if let Err(e) = show(message, kind) {
        warn!("Could not show notification {:?}: {}", message, e);
    }
}

/// Detail carried by a `showNotification` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub message: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl NotificationRequest {
    pub fn kind(&self) -> NotificationKind {
        self.kind
            .as_deref()
            .map(NotificationKind::parse)
            .unwrap_or(NotificationKind::Info)
    }
}

/// Raises a notification the same way other page scripts do, by
/// dispatching the custom event on `document`.
pub fn dispatch(doc: &Document, request: &NotificationRequest) -> Result<(), DomError> {
    let init = CustomEventInit::new();
    init.set_detail(&serde_wasm_bindgen::to_value(request)?);
    let event = CustomEvent::new_with_event_init_dict(NOTIFICATION_EVENT, &init)?;
    doc.dispatch_event(&event)?;
    Ok(())
}

pub fn install_event_bridge(doc: &Document) -> Result<(), DomError> {
    dom::listen(doc, NOTIFICATION_EVENT, |event: web_sys::Event| {
        let Some(event) = event.dyn_ref::<CustomEvent>() else { return };
        match serde_wasm_bindgen::from_value::<NotificationRequest>(event.detail()) {
            Ok(request) => show_or_log(&request.message, request.kind()),
            Err(e) => warn!("Ignoring malformed {} event: {}", NOTIFICATION_EVENT, e),
        }
    })
}
