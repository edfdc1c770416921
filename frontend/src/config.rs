use log::{info, warn};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use wasm_bindgen::JsValue;
use web_sys::{js_sys, Document, Window};

use crate::dom::{self, DomError};

/// Host baked into the static markup before deployment.
pub const PLACEHOLDER_HOST: &str = "your-site-name.netlify.app";

/// Optional `<script type="application/json">` carrying overrides.
const OVERRIDE_SELECTOR: &str = "script#site-config";

static SITE: OnceCell<SiteConfig> = OnceCell::new();

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SiteConfig {
    pub base_url: String,
    pub social: Social,
    pub contact: Contact,
    pub company: Company,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Social {
    pub linkedin: String,
    pub instagram: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Contact {
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Company {
    pub name: String,
    pub location: String,
    pub description: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://mass-com.com".to_string(),
            social: Social::default(),
            contact: Contact::default(),
            company: Company::default(),
        }
    }
}

impl Default for Social {
    fn default() -> Self {
        Self {
            linkedin: "https://www.linkedin.com/company/mass-communication".to_string(),
            instagram: "https://www.instagram.com/masscommunication".to_string(),
        }
    }
}

impl Default for Contact {
    fn default() -> Self {
        Self {
            email: "office@mass-com.com".to_string(),
            phone: "+243 99 597 47 70".to_string(),
        }
    }
}

impl Default for Company {
    fn default() -> Self {
        Self {
            name: "Mass Communication".to_string(),
            location: "Lubumbashi, RDC".to_string(),
            description: "Agence de marketing digital multidisciplinaire".to_string(),
        }
    }
}

impl SiteConfig {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn full_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Base URL without its scheme, as it appears inside absolute links.
    pub fn host(&self) -> &str {
        self.base_url
            .strip_prefix("https://")
            .or_else(|| self.base_url.strip_prefix("http://"))
            .unwrap_or(&self.base_url)
            .trim_end_matches('/')
    }
}

/// Reads the page override if present, falling back to compiled defaults.
pub fn load(doc: &Document) -> SiteConfig {
    let raw = dom::query(doc, OVERRIDE_SELECTOR).and_then(|el| el.text_content());
    match raw {
        Some(raw) => match SiteConfig::from_json(&raw) {
            Ok(config) => {
                info!("Site config loaded from page override");
                config
            }
            Err(e) => {
                warn!("Ignoring malformed site config override: {}", e);
                SiteConfig::default()
            }
        },
        None => SiteConfig::default(),
    }
}

/// Freezes the config for the rest of the page's lifetime.
pub fn install(config: SiteConfig) -> &'static SiteConfig {
    SITE.get_or_init(|| config)
}

pub fn site() -> &'static SiteConfig {
    SITE.get_or_init(SiteConfig::default)
}

/// Exposes the config as `window.SiteConfig` for other page scripts.
pub fn publish(window: &Window, config: &SiteConfig) -> Result<(), DomError> {
    let value = serde_wasm_bindgen::to_value(config)?;
    js_sys::Reflect::set(window, &JsValue::from_str("SiteConfig"), &value)?;
    Ok(())
}
