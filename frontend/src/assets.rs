use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use gloo_net::http::{Method, Request};
use gloo_timers::callback::Interval;
use log::{debug, info};
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::HtmlImageElement;

pub const POLL_INTERVAL_MS: u32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Video,
    Image,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Asset {
    pub path: &'static str,
    pub kind: AssetKind,
}

pub const MANIFEST: [Asset; 8] = [
    Asset { path: "static/videos/hero-bg.mp4", kind: AssetKind::Video },
    Asset { path: "static/videos/services-bg.mp4", kind: AssetKind::Video },
    Asset { path: "static/videos/contact-bg.mp4", kind: AssetKind::Video },
    Asset { path: "static/images/hero/hero-fallback.jpg", kind: AssetKind::Image },
    Asset { path: "static/images/services/services-fallback.jpg", kind: AssetKind::Image },
    Asset { path: "static/images/contact/contact-fallback.jpg", kind: AssetKind::Image },
    Asset { path: "static/images/about/about-bg.jpg", kind: AssetKind::Image },
    Asset { path: "static/images/cases/work-bg.jpg", kind: AssetKind::Image },
];

/// Which manifest entries have been seen on the server.
#[derive(Debug)]
pub struct PresenceTracker {
    manifest: Vec<Asset>,
    found: HashSet<Asset>,
}

impl PresenceTracker {
    pub fn new(manifest: &[Asset]) -> Self {
        Self {
            manifest: manifest.to_vec(),
            found: HashSet::new(),
        }
    }

    /// Records a probe result; true only the first time an asset is found.
    pub fn record(&mut self, asset: Asset, present: bool) -> bool {
        present && self.found.insert(asset)
    }

    pub fn outstanding(&self) -> Vec<Asset> {
        self.manifest
            .iter()
            .filter(|asset| !self.found.contains(*asset))
            .copied()
            .collect()
    }

    pub fn complete(&self) -> bool {
        self.found.len() == self.manifest.len()
    }
}

async fn probe(asset: Asset) -> bool {
    match asset.kind {
        AssetKind::Video => match Request::new(asset.path).method(Method::HEAD).send().await {
            Ok(response) => response.ok(),
            Err(_) => false,
        },
        AssetKind::Image => {
            let Ok(image) = HtmlImageElement::new() else { return false };
            image.set_src(asset.path);
            JsFuture::from(image.decode()).await.is_ok()
        }
    }
}

/// Polls for assets uploaded after the page was built. Stops on its own
/// once every manifest entry has shown up.
pub struct AssetPoller {
    tracker: RefCell<PresenceTracker>,
    interval: RefCell<Option<Interval>>,
    on_new_video: Box<dyn Fn()>,
}

impl AssetPoller {
    pub fn start(manifest: &[Asset], on_new_video: Box<dyn Fn()>) -> Rc<Self> {
        let poller = Rc::new(Self {
            tracker: RefCell::new(PresenceTracker::new(manifest)),
            interval: RefCell::new(None),
            on_new_video,
        });
        Self::probe_round(&poller);

        let weak = Rc::downgrade(&poller);
        let interval = Interval::new(POLL_INTERVAL_MS, move || {
            if let Some(poller) = weak.upgrade() {
                Self::probe_round(&poller);
            }
        });
        *poller.interval.borrow_mut() = Some(interval);
        poller
    }

    pub fn stop(&self) {
        if self.interval.borrow_mut().take().is_some() {
            info!("All site assets present, asset polling stopped");
        }
    }

    fn probe_round(this: &Rc<Self>) {
        let outstanding = this.tracker.borrow().outstanding();
        for asset in outstanding {
            let poller = this.clone();
            spawn_local(async move {
                let present = probe(asset).await;
                poller.settle(asset, present);
            });
        }
    }

    fn settle(&self, asset: Asset, present: bool) {
        let newly_found = self.tracker.borrow_mut().record(asset, present);
        if !present {
            debug!("Asset not found yet: {}", asset.path);
            return;
        }
        if newly_found {
            info!("Asset detected: {}", asset.path);
            if asset.kind == AssetKind::Video {
                (self.on_new_video)();
            }
        }
        if self.tracker.borrow().complete() {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIDEO: Asset = MANIFEST[0];
    const IMAGE: Asset = MANIFEST[3];

    #[test]
    fn manifest_lists_three_videos_and_five_images() {
        let videos = MANIFEST.iter().filter(|a| a.kind == AssetKind::Video).count();
        assert_eq!(videos, 3);
        assert_eq!(MANIFEST.len() - videos, 5);
    }

    #[test]
    fn asset_is_new_only_once() {
        let mut tracker = PresenceTracker::new(&MANIFEST);
        assert!(!tracker.record(VIDEO, false));
        assert!(tracker.record(VIDEO, true));
        assert!(!tracker.record(VIDEO, true));
    }

    #[test]
    fn found_assets_leave_the_probe_list() {
        let mut tracker = PresenceTracker::new(&MANIFEST);
        assert_eq!(tracker.outstanding().len(), 8);
        tracker.record(IMAGE, true);
        let outstanding = tracker.outstanding();
        assert_eq!(outstanding.len(), 7);
        assert!(!outstanding.contains(&IMAGE));
    }

    #[test]
    fn tracker_completes_when_everything_is_found() {
        let mut tracker = PresenceTracker::new(&[VIDEO, IMAGE]);
        tracker.record(VIDEO, true);
        assert!(!tracker.complete());
        tracker.record(IMAGE, true);
        assert!(tracker.complete());
        assert!(tracker.outstanding().is_empty());
    }
}
