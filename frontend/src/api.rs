use std::rc::Weak;

use log::{debug, info, warn};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsValue;
use web_sys::{js_sys, Document, Window};

use crate::background::{self, BrowserBackgrounds};
use crate::config;
use crate::dom::{self, DomError};
use crate::meta;
use crate::notify::{self, NotificationRequest};

/// Global object holding the helpers other page scripts call.
pub const NAMESPACE: &str = "MassCommunication";

/// Scroll position that puts a section's top just under the header.
pub fn section_scroll_top(section_top: f64, header_height: f64) -> f64 {
    section_top - header_height
}

fn header_height(doc: &Document) -> f64 {
    doc.get_element_by_id("header")
        .and_then(|el| dom::as_html(&el))
        .map(|header| f64::from(header.offset_height()))
        .unwrap_or(0.0)
}

fn expose(target: &JsValue, name: &str, function: &JsValue) -> Result<(), DomError> {
    js_sys::Reflect::set(target, &JsValue::from_str(name), function)?;
    Ok(())
}

/// Publishes `getFullUrl`, `updateMetaTags` and the `MassCommunication`
/// helpers on `window`.
pub fn install(
    window: &Window,
    doc: &Document,
    backgrounds: Option<Weak<BrowserBackgrounds>>,
) -> Result<(), DomError> {
    let full_url = Closure::wrap(
        Box::new(|path: String| config::site().full_url(&path)) as Box<dyn Fn(String) -> String>
    );
    expose(window, "getFullUrl", full_url.as_ref())?;
    full_url.forget();

    let meta_window = window.clone();
    let meta_doc = doc.clone();
    let update_meta = Closure::wrap(Box::new(move || {
        let pathname = meta_window.location().pathname().unwrap_or_default();
        if let Err(e) = meta::update_meta_tags(&meta_doc, config::site(), &pathname) {
            warn!("Could not update meta tags: {}", e);
        }
    }) as Box<dyn Fn()>);
    expose(window, "updateMetaTags", update_meta.as_ref())?;
    update_meta.forget();

    let namespace: JsValue = js_sys::Object::new().into();

    let scroll_window = window.clone();
    let scroll_doc = doc.clone();
    let scroll = Closure::wrap(Box::new(move |id: String| {
        let Some(section) = scroll_doc.get_element_by_id(&id).and_then(|el| dom::as_html(&el)) else {
            debug!("No section with id {:?}", id);
            return;
        };
        let top = section_scroll_top(f64::from(section.offset_top()), header_height(&scroll_doc));
        dom::smooth_scroll_to(&scroll_window, top);
    }) as Box<dyn Fn(String)>);
    expose(&namespace, "scrollToSection", scroll.as_ref())?;
    scroll.forget();

    let notify_doc = doc.clone();
    let show = Closure::wrap(Box::new(move |message: String, kind: Option<String>| {
        let request = NotificationRequest {
            message,
            kind: Some(kind.unwrap_or_else(|| "info".to_string())),
        };
        if let Err(e) = notify::dispatch(&notify_doc, &request) {
            warn!("Could not dispatch notification: {}", e);
        }
    }) as Box<dyn Fn(String, Option<String>)>);
    expose(&namespace, "showNotification", show.as_ref())?;
    show.forget();

    let status = Closure::wrap(Box::new(move || {
        match backgrounds.as_ref().and_then(Weak::upgrade) {
            Some(controller) => background::log_status(&controller),
            None => info!("Background videos are not managed on this page"),
        }
    }) as Box<dyn Fn()>);
    expose(&namespace, "checkVideoStatus", status.as_ref())?;
    status.forget();

    js_sys::Reflect::set(window, &JsValue::from_str(NAMESPACE), &namespace)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_lands_below_the_header() {
        assert_eq!(section_scroll_top(1200.0, 80.0), 1120.0);
    }

    #[test]
    fn missing_header_scrolls_to_the_section_top() {
        assert_eq!(section_scroll_top(640.0, 0.0), 640.0);
    }
}
