use log::info;
use web_sys::Document;

use crate::config::{SiteConfig, PLACEHOLDER_HOST};
use crate::dom::{self, DomError};

/// Replaces the placeholder host in an attribute value. `None` when the
/// value never mentioned it, so untouched tags are left alone.
pub fn rewrite_placeholder(value: &str, host: &str) -> Option<String> {
    value
        .contains(PLACEHOLDER_HOST)
        .then(|| value.replace(PLACEHOLDER_HOST, host))
}

/// Points canonical, Open Graph and Twitter tags at the configured site.
/// Returns how many tags were changed.
pub fn update_meta_tags(doc: &Document, config: &SiteConfig, pathname: &str) -> Result<usize, DomError> {
    let host = config.host();
    let mut updated = 0;

    for link in dom::query_all(doc, r#"link[rel="canonical"]"#) {
        if let Some(href) = link.get_attribute("href") {
            if let Some(rewritten) = rewrite_placeholder(&href, host) {
                link.set_attribute("href", &rewritten)?;
                updated += 1;
            }
        }
    }

    let page_url = config.full_url(pathname);
    for selector in [r#"meta[property="og:url"]"#, r#"meta[name="twitter:url"]"#] {
        if let Some(meta) = dom::query(doc, selector) {
            meta.set_attribute("content", &page_url)?;
            updated += 1;
        }
    }

    let leftover = format!(r#"meta[content*="{}"]"#, PLACEHOLDER_HOST);
    for meta in dom::query_all(doc, &leftover) {
        if let Some(content) = meta.get_attribute("content") {
            if let Some(rewritten) = rewrite_placeholder(&content, host) {
                meta.set_attribute("content", &rewritten)?;
                updated += 1;
            }
        }
    }

    info!("Meta tags updated with base URL: {} ({} tags)", config.base_url, updated);
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_is_replaced_with_host() {
        let rewritten =
            rewrite_placeholder("https://your-site-name.netlify.app/images/og.jpg", "mass-com.com");
        assert_eq!(rewritten.as_deref(), Some("https://mass-com.com/images/og.jpg"));
    }

    #[test]
    fn values_without_placeholder_are_untouched() {
        assert_eq!(rewrite_placeholder("https://mass-com.com/", "mass-com.com"), None);
        assert_eq!(rewrite_placeholder("Agence de marketing", "mass-com.com"), None);
    }

    #[test]
    fn rewriting_happens_once() {
        let first = rewrite_placeholder("https://your-site-name.netlify.app/", "mass-com.com").unwrap();
        assert_eq!(rewrite_placeholder(&first, "mass-com.com"), None);
    }

    #[test]
    fn every_occurrence_in_a_value_is_rewritten() {
        let rewritten = rewrite_placeholder(
            "your-site-name.netlify.app and your-site-name.netlify.app",
            "mass-com.com",
        );
        assert_eq!(rewritten.as_deref(), Some("mass-com.com and mass-com.com"));
    }
}
