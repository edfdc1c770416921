use wasm_bindgen::{JsCast, JsValue};
use web_sys::{js_sys, EventTarget, Window};

use crate::dom;

pub const NARROW_VIEWPORT_MAX: f64 = 768.0;
const REDUCED_MOTION_QUERY: &str = "(prefers-reduced-motion: reduce)";

/// Browser estimate of the connection quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectiveType {
    Slow2g,
    TwoG,
    ThreeG,
    FourG,
    Unknown,
}

impl EffectiveType {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("slow-2g") => EffectiveType::Slow2g,
            Some("2g") => EffectiveType::TwoG,
            Some("3g") => EffectiveType::ThreeG,
            Some("4g") => EffectiveType::FourG,
            _ => EffectiveType::Unknown,
        }
    }

    pub fn is_slow(self) -> bool {
        matches!(self, EffectiveType::Slow2g | EffectiveType::TwoG)
    }

    pub fn is_fast(self) -> bool {
        matches!(self, EffectiveType::ThreeG | EffectiveType::FourG)
    }
}

/// What the page knows about the visitor's device at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Environment {
    pub viewport_width: f64,
    pub reduced_motion: bool,
    pub effective_type: EffectiveType,
}

impl Environment {
    pub fn is_narrow(&self) -> bool {
        self.viewport_width <= NARROW_VIEWPORT_MAX
    }
}

pub trait EnvironmentProbe {
    fn snapshot(&self) -> Environment;
}

pub struct BrowserProbe {
    window: Window,
}

impl BrowserProbe {
    pub fn new(window: Window) -> Self {
        Self { window }
    }

    /// `navigator.connection`, absent outside Chromium browsers.
    pub fn connection(&self) -> Option<EventTarget> {
        js_sys::Reflect::get(&self.window.navigator(), &JsValue::from_str("connection"))
            .ok()
            .filter(|value| !value.is_undefined() && !value.is_null())
            .and_then(|value| value.dyn_into::<EventTarget>().ok())
    }

    fn effective_type(&self) -> EffectiveType {
        let raw = self.connection().and_then(|connection| {
            js_sys::Reflect::get(&connection, &JsValue::from_str("effectiveType"))
                .ok()
                .and_then(|value| value.as_string())
        });
        EffectiveType::parse(raw.as_deref())
    }
}

impl EnvironmentProbe for BrowserProbe {
    fn snapshot(&self) -> Environment {
        Environment {
            viewport_width: dom::viewport_width(&self.window),
            reduced_motion: prefers_reduced_motion(&self.window),
            effective_type: self.effective_type(),
        }
    }
}

pub fn prefers_reduced_motion(window: &Window) -> bool {
    window
        .match_media(REDUCED_MOTION_QUERY)
        .ok()
        .flatten()
        .map(|query| query.matches())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_effective_types() {
        assert_eq!(EffectiveType::parse(Some("slow-2g")), EffectiveType::Slow2g);
        assert_eq!(EffectiveType::parse(Some("2g")), EffectiveType::TwoG);
        assert_eq!(EffectiveType::parse(Some("3g")), EffectiveType::ThreeG);
        assert_eq!(EffectiveType::parse(Some("4g")), EffectiveType::FourG);
        assert_eq!(EffectiveType::parse(Some("5g")), EffectiveType::Unknown);
        assert_eq!(EffectiveType::parse(None), EffectiveType::Unknown);
    }

    #[test]
    fn unknown_is_neither_slow_nor_fast() {
        assert!(!EffectiveType::Unknown.is_slow());
        assert!(!EffectiveType::Unknown.is_fast());
        assert!(EffectiveType::TwoG.is_slow());
        assert!(EffectiveType::FourG.is_fast());
    }

    #[test]
    fn narrow_boundary_is_inclusive() {
        let env = |width| Environment {
            viewport_width: width,
            reduced_motion: false,
            effective_type: EffectiveType::FourG,
        };
        assert!(env(768.0).is_narrow());
        assert!(!env(769.0).is_narrow());
    }
}
