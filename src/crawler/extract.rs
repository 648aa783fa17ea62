use std::time::Duration;

use tracing::debug;
use url::Url;

use crate::navigator::Navigator;
use crate::normalize::RawFields;
use crate::settings::Locators;

/// Reads the raw fields of the listing in the navigator's current context.
/// Missing elements leave the field `None`; this never fails.
pub struct FieldExtractor<'a> {
    locators: &'a Locators,
    timeout: Duration,
}

impl<'a> FieldExtractor<'a> {
    pub fn new(locators: &'a Locators, timeout: Duration) -> Self {
        Self { locators, timeout }
    }

    pub async fn extract<N: Navigator + ?Sized>(&self, nav: &mut N, page_url: &Url) -> RawFields {
        let l = self.locators;
        RawFields {
            title: self.text(nav, &l.title).await,
            company: self.text(nav, &l.company).await,
            location_and_date: self.text(nav, &l.location_and_date).await,
            skills: self.text(nav, &l.skills).await,
            salary: self.text(nav, &l.salary).await,
            logo_url: self
                .attribute(nav, &l.logo, "src")
                .await
                .and_then(|src| page_url.join(&src).ok())
                .map(String::from),
        }
    }

    async fn text<N: Navigator + ?Sized>(&self, nav: &mut N, selector: &str) -> Option<String> {
        match nav.wait_for_element(selector, self.timeout).await {
            Ok(el) => Some(el.text().trim().to_string()).filter(|t| !t.is_empty()),
            Err(e) => {
                debug!("Field {} unavailable: {}", selector, e);
                None
            }
        }
    }

    async fn attribute<N: Navigator + ?Sized>(
        &self,
        nav: &mut N,
        selector: &str,
        name: &str,
    ) -> Option<String> {
        match nav.wait_for_element(selector, self.timeout).await {
            Ok(el) => el
                .attribute(name)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string),
            Err(e) => {
                debug!("Field {}[{}] unavailable: {}", selector, name, e);
                None
            }
        }
    }
}
