use log::{debug, info, warn};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{js_sys, PerformanceEntry, PerformanceObserver, PerformanceObserverEntryList, Window};

use crate::dom::DomError;

pub const SLOW_LCP_MS: f64 = 4000.0;
const LCP_ENTRY: &str = "largest-contentful-paint";

pub fn is_slow_lcp(start_time: f64) -> bool {
    start_time > SLOW_LCP_MS
}

/// Logs largest-contentful-paint timings. Browsers without
/// `PerformanceObserver` or LCP entries are skipped silently.
pub fn install(window: &Window) -> Result<(), DomError> {
    if !js_sys::Reflect::has(window, &JsValue::from_str("PerformanceObserver")).unwrap_or(false) {
        debug!("PerformanceObserver unavailable, skipping LCP monitoring");
        return Ok(());
    }

    let callback = Closure::wrap(Box::new(
        |list: PerformanceObserverEntryList, _observer: PerformanceObserver| {
            for entry in list.get_entries().iter() {
                let Ok(entry) = entry.dyn_into::<PerformanceEntry>() else { continue };
                if entry.entry_type() != LCP_ENTRY {
                    continue;
                }
                let start = entry.start_time();
                info!("LCP: {}ms", start);
                if is_slow_lcp(start) {
                    warn!("Slow loading detected. Consider optimizing video files.");
                }
            }
        },
    ) as Box<dyn FnMut(PerformanceObserverEntryList, PerformanceObserver)>);
    let observer = PerformanceObserver::new(callback.as_ref().unchecked_ref())?;

    let entry_types = js_sys::Array::of1(&JsValue::from_str(LCP_ENTRY));
    let options = js_sys::Object::new();
    js_sys::Reflect::set(&options, &JsValue::from_str("entryTypes"), &entry_types)?;

    // observe() throws on engines that do not know the entry type
    let observe = js_sys::Reflect::get(&observer, &JsValue::from_str("observe"))?
        .dyn_into::<js_sys::Function>()?;
    match observe.call1(&observer, &options) {
        Ok(_) => callback.forget(),
        Err(e) => debug!("LCP entries unsupported: {:?}", e),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lcp_over_four_seconds_is_slow() {
        assert!(!is_slow_lcp(1200.0));
        assert!(!is_slow_lcp(4000.0));
        assert!(is_slow_lcp(4000.1));
    }
}
