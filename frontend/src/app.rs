use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use log::{info, warn};
use web_sys::{Document, Event, Window};

use crate::assets::{AssetPoller, MANIFEST};
use crate::background::{self, BackgroundController, BrowserBackgrounds};
use crate::dom::{self, DomError};
use crate::scheduler::{Scheduler, TimerScheduler};
use crate::{animate, api, clock, config, form, meta, nav, notify, perf};

/// Wait after a new video shows up before re-running the background decision.
const REINIT_DELAY: Duration = Duration::from_millis(1000);

/// Handles that must outlive the boot call.
struct Site {
    _backgrounds: Option<Rc<BrowserBackgrounds>>,
    _assets: Rc<AssetPoller>,
}

thread_local! {
    static SITE: RefCell<Option<Site>> = RefCell::new(None);
}

fn report(component: &str, result: Result<(), DomError>) {
    if let Err(e) = result {
        warn!("{} unavailable: {}", component, e);
    }
}

/// Boots once the DOM is parsed, whether or not that already happened.
pub fn start() -> Result<(), DomError> {
    let doc = dom::document()?;
    if doc.ready_state() == "loading" {
        dom::listen(&doc, "DOMContentLoaded", |_: Event| {
            report("site", boot());
        })
    } else {
        boot()
    }
}

pub fn boot() -> Result<(), DomError> {
    let window = dom::window()?;
    let doc = dom::document()?;

    let config = config::install(config::load(&doc));
    report("site config", config::publish(&window, config));
    let pathname = window.location().pathname().unwrap_or_default();
    report(
        "meta tags",
        meta::update_meta_tags(&doc, config, &pathname).map(|_| ()),
    );

    let scheduler: Rc<dyn Scheduler> = Rc::new(TimerScheduler::default());

    report("navigation", nav::install(&window, &doc));

    let backgrounds = match background::install(&window, &doc, scheduler.clone()) {
        Ok(controller) => Some(controller),
        Err(e) => {
            warn!("background videos unavailable: {}", e);
            None
        }
    };
    report("background images", background::install_lazy_images(&doc));
    report(
        "page script api",
        api::install(&window, &doc, backgrounds.as_ref().map(Rc::downgrade)),
    );

    report("forms", form::install(&doc, scheduler.clone()));
    report("notifications", notify::install_event_bridge(&doc));
    report("animations", animate::install(&window, &doc, scheduler.clone()));

    let reinit = backgrounds.as_ref().map(Rc::downgrade);
    let assets = AssetPoller::start(
        &MANIFEST,
        Box::new(move || {
            let Some(weak) = reinit.clone() else { return };
            scheduler.schedule(
                REINIT_DELAY,
                Box::new(move || {
                    if let Some(controller) = weak.upgrade() {
                        BackgroundController::initialize(&controller);
                    }
                }),
            );
        }),
    );

    clock::install(&doc);
    report("performance monitor", perf::install(&window));
    report("page load", install_page_load(&window, &doc));

    SITE.with(|site| {
        *site.borrow_mut() = Some(Site {
            _backgrounds: backgrounds,
            _assets: assets,
        });
    });

    info!("{} - {}", config.company.name, config.company.location);
    Ok(())
}

fn finish_loading(doc: &Document) {
    if let Some(body) = doc.body() {
        let _ = body.class_list().add_1("loaded");
    }
    for el in dom::query_all(doc, "[data-loading]") {
        let _ = el.remove_attribute("data-loading");
    }
    info!("{} website loaded", config::site().company.name);
}

fn install_page_load(window: &Window, doc: &Document) -> Result<(), DomError> {
    if doc.ready_state() == "complete" {
        finish_loading(doc);
        return Ok(());
    }
    let doc = doc.clone();
    dom::listen(window, "load", move |_: Event| finish_loading(&doc))
}
