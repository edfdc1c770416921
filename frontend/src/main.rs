use log::{error, info, Level};

mod animate;
mod api;
mod app;
mod assets;
mod background;
mod clock;
mod config;
mod dom;
mod environment;
mod form;
mod meta;
mod nav;
mod notify;
mod perf;
mod scheduler;

#[cfg(debug_assertions)]
const LOG_LEVEL: Level = Level::Debug;

#[cfg(not(debug_assertions))]
const LOG_LEVEL: Level = Level::Info;

fn main() {
    // Initialize console error panic hook for better error messages
    console_error_panic_hook::set_once();

    if let Err(e) = console_log::init_with_level(LOG_LEVEL) {
        web_sys::console::error_1(&format!("error initializing log: {}", e).into());
    }

    info!("Mass Communication");
    info!("Direction créative & production, Lubumbashi, RDC");
    if let Err(e) = app::start() {
        error!("Site behaviour could not start: {}", e);
    }
}
