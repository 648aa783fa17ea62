pub mod extract;

use std::collections::HashSet;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use rand::Rng;
use tracing::{debug, info, warn};
use url::Url;

use crate::listing::Listing;
use crate::navigator::{ContextHandle, NavigationError, Navigator};
use crate::normalize::Normalizer;
use crate::settings::{Delays, Locators};
use extract::FieldExtractor;

const VACANCY_SEGMENT: &str = "/vacancy/";

/// Why the page loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    LimitReached,
    ListingWaitTimedOut,
    NoListings,
    NoNextPage,
}

#[derive(Debug)]
pub struct CrawlOutcome {
    pub listings: Vec<Listing>,
    /// Listings started, including the ones that failed.
    pub attempted: usize,
    pub skipped: usize,
    pub pages: usize,
    pub stop: StopReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingLink {
    pub id: String,
    pub url: Url,
}

pub struct CrawlPlan {
    /// Search URL template containing `{page}`.
    pub base_url: String,
    pub job_limit: Option<usize>,
    pub locators: Locators,
    pub element_wait: Duration,
    pub delays: Delays,
}

impl CrawlPlan {
    fn page_url(&self, page: usize) -> String {
        self.base_url.replace("{page}", &page.to_string())
    }

    fn limit_reached(&self, attempted: usize) -> bool {
        self.job_limit.is_some_and(|limit| attempted >= limit)
    }
}

/// Walks the paginated search results and visits each listing in its own context.
pub struct ListingCrawler<'a> {
    plan: CrawlPlan,
    normalizer: &'a Normalizer,
}

impl<'a> ListingCrawler<'a> {
    pub fn new(plan: CrawlPlan, normalizer: &'a Normalizer) -> Self {
        Self { plan, normalizer }
    }

    /// Crawl until the job limit, an empty page or the last page.
    /// A failed results-page load aborts with an error; a failed listing is skipped.
    pub async fn crawl<N: Navigator + ?Sized>(
        &self,
        nav: &mut N,
    ) -> Result<CrawlOutcome, NavigationError> {
        let home = nav.current_context();
        let pb = progress_bar(self.plan.job_limit);

        let mut listings = Vec::new();
        let mut attempted = 0usize;
        let mut skipped = 0usize;
        let mut page = 0usize;

        let stop = loop {
            if self.plan.limit_reached(attempted) {
                break StopReason::LimitReached;
            }

            let page_url = self.plan.page_url(page);
            info!("Loading results page {}: {}", page, page_url);
            nav.navigate(&page_url).await?;

            match nav
                .wait_for_element(&self.plan.locators.listing_link, self.plan.element_wait)
                .await
            {
                Ok(_) => {}
                Err(e) if e.is_timeout() => {
                    info!("No listings appeared on page {}", page);
                    break StopReason::ListingWaitTimedOut;
                }
                Err(e) => return Err(e),
            }
            pause(self.plan.delays.page_min_ms, self.plan.delays.page_max_ms).await;

            let base = Url::parse(&page_url).map_err(|e| NavigationError::Load {
                url: page_url.clone(),
                reason: e.to_string(),
            })?;
            let links = harvest_links(&nav.find_all(&self.plan.locators.listing_link).await?, &base);
            if links.is_empty() {
                info!("Page {} has no listing links", page);
                break StopReason::NoListings;
            }
            debug!("Page {}: {} listings", page, links.len());

            for link in &links {
                if self.plan.limit_reached(attempted) {
                    break;
                }
                attempted += 1;
                pb.set_message(link.id.clone());
                info!("Processing job #{} | ID: {}", attempted, link.id);

                match self.visit(nav, link, home).await? {
                    Ok(listing) => listings.push(listing),
                    Err(e) => {
                        warn!("Skipping listing {}: {}", link.id, e);
                        skipped += 1;
                    }
                }
                pb.inc(1);
            }

            if self.plan.limit_reached(attempted) {
                continue;
            }
            let has_next = match nav.find_all(&self.plan.locators.next_page).await {
                Ok(found) => !found.is_empty(),
                Err(e) => {
                    debug!("Next-page lookup failed: {}", e);
                    false
                }
            };
            if !has_next {
                info!("No next page after page {}", page);
                break StopReason::NoNextPage;
            }
            page += 1;
        };

        pb.finish_and_clear();
        info!(
            "Crawl stopped ({:?}): {} listings, {} skipped, {} pages",
            stop,
            listings.len(),
            skipped,
            page + 1
        );
        Ok(CrawlOutcome {
            listings,
            attempted,
            skipped,
            pages: page + 1,
            stop,
        })
    }

    /// Open the listing, read it, close it and return to `home`.
    /// The outer error means the main context is gone and the crawl cannot continue.
    async fn visit<N: Navigator + ?Sized>(
        &self,
        nav: &mut N,
        link: &ListingLink,
        home: ContextHandle,
    ) -> Result<Result<Listing, NavigationError>, NavigationError> {
        let result = match nav.open_context(link.url.as_str()).await {
            Ok(_) => {
                let read = self.read_listing(nav, link).await;
                if let Err(e) = nav.close_context().await {
                    warn!("Failed to close listing {}: {}", link.id, e);
                }
                read
            }
            Err(e) => Err(e),
        };
        nav.switch_context(home).await?;
        Ok(result)
    }

    async fn read_listing<N: Navigator + ?Sized>(
        &self,
        nav: &mut N,
        link: &ListingLink,
    ) -> Result<Listing, NavigationError> {
        nav.wait_for_element(&self.plan.locators.title, self.plan.element_wait)
            .await?;
        pause(self.plan.delays.detail_min_ms, self.plan.delays.detail_max_ms).await;

        let raw = FieldExtractor::new(&self.plan.locators, self.plan.element_wait)
            .extract(nav, &link.url)
            .await;
        Ok(self.normalizer.normalize(&link.id, &raw).await)
    }
}

/// Vacancy links in page order, first occurrence of each id.
pub fn harvest_links(elements: &[crate::navigator::Element], base: &Url) -> Vec<ListingLink> {
    let mut seen = HashSet::new();
    elements
        .iter()
        .filter_map(|el| el.attribute("href"))
        .filter_map(|href| base.join(href.trim()).ok())
        .filter_map(|url| listing_id(&url).map(|id| ListingLink { id, url }))
        .filter(|link| seen.insert(link.id.clone()))
        .collect()
}

/// `https://hh.uz/vacancy/123?query=x` -> `123`
pub fn listing_id(url: &Url) -> Option<String> {
    let (_, rest) = url.path().split_once(VACANCY_SEGMENT)?;
    let id = rest.split('/').next()?.trim();
    (!id.is_empty()).then(|| id.to_string())
}

async fn pause(min_ms: u64, max_ms: u64) {
    let ms = if max_ms > min_ms {
        rand::thread_rng().gen_range(min_ms..=max_ms)
    } else {
        min_ms
    };
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

fn progress_bar(limit: Option<usize>) -> ProgressBar {
    match limit {
        Some(n) => {
            let pb = ProgressBar::new(n as u64);
            if let Ok(style) =
                ProgressStyle::default_bar().template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
            {
                pb.set_style(style);
            }
            pb
        }
        None => ProgressBar::new_spinner(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;

    use super::*;
    use crate::navigator::Element;
    use crate::normalize::location::UzbekRegions;
    use crate::normalize::salary::Rates;
    use crate::normalize::translate::{TranslationError, Translator};

    const BASE: &str = "https://hh.test/search/vacancy?page={page}";

    struct Echo;

    #[async_trait]
    impl Translator for Echo {
        async fn translate(&self, text: &str, _target: &str) -> Result<String, TranslationError> {
            Ok(text.to_string())
        }
    }

    fn normalizer() -> Normalizer {
        Normalizer::new(
            Box::new(Echo),
            Box::new(UzbekRegions),
            vec!["Python".into(), "SQL".into()],
            Rates::default(),
            "Uzbekistan",
            "hh.uz",
        )
    }

    fn plan(limit: Option<usize>) -> CrawlPlan {
        CrawlPlan {
            base_url: BASE.into(),
            job_limit: limit,
            locators: Locators::default(),
            element_wait: Duration::from_millis(10),
            delays: Delays::none(),
        }
    }

    /// In-memory site: results pages hold hrefs, detail pages hold selector -> element.
    #[derive(Default)]
    struct FakeSite {
        pages: Vec<Vec<String>>,
        details: HashMap<String, HashMap<String, Element>>,
        unreachable: Vec<String>,
        broken_results: bool,
        broken_wait: bool,
    }

    impl FakeSite {
        fn listing(&mut self, id: &str, title: Option<&str>) {
            let mut fields = HashMap::new();
            let l = Locators::default();
            if let Some(t) = title {
                fields.insert(l.title.clone(), Element::new(t, vec![]));
            }
            fields.insert(l.company.clone(), Element::new("Acme", vec![]));
            fields.insert(
                l.location_and_date.clone(),
                Element::new("Vacancy published July 4, 2024 in Tashkent", vec![]),
            );
            fields.insert(
                l.logo.clone(),
                Element::new("", vec![("src".into(), "/logos/acme.png".into())]),
            );
            self.details.insert(detail_url(id), fields);
        }
    }

    fn detail_url(id: &str) -> String {
        format!("https://hh.test/vacancy/{}", id)
    }

    struct FakeNavigator {
        site: FakeSite,
        contexts: HashMap<u64, String>,
        current: u64,
        next_id: u64,
        max_open: usize,
        opened: Vec<String>,
        navigations: Vec<String>,
    }

    impl FakeNavigator {
        fn new(site: FakeSite) -> Self {
            let mut contexts = HashMap::new();
            contexts.insert(0, "about:blank".to_string());
            Self {
                site,
                contexts,
                current: 0,
                next_id: 1,
                max_open: 0,
                opened: Vec::new(),
                navigations: Vec::new(),
            }
        }

        fn url(&self) -> &str {
            self.contexts.get(&self.current).map(String::as_str).unwrap_or("")
        }

        fn url_without_query(&self) -> &str {
            self.url().split('?').next().unwrap_or("")
        }

        fn results_page(&self) -> Option<usize> {
            let (_, n) = self.url().split_once("page=")?;
            n.parse().ok()
        }
    }

    #[async_trait]
    impl Navigator for FakeNavigator {
        async fn navigate(&mut self, url: &str) -> Result<(), NavigationError> {
            self.navigations.push(url.to_string());
            if self.site.broken_results {
                return Err(NavigationError::Load {
                    url: url.into(),
                    reason: "connection reset".into(),
                });
            }
            self.contexts.insert(self.current, url.to_string());
            Ok(())
        }

        async fn wait_for_element(
            &mut self,
            selector: &str,
            timeout: Duration,
        ) -> Result<Element, NavigationError> {
            let missing = NavigationError::Timeout {
                target: selector.into(),
                timeout,
            };
            if let Some(page) = self.results_page() {
                if self.site.broken_wait {
                    return Err(NavigationError::Protocol("target crashed".into()));
                }
                let links = self.site.pages.get(page).cloned().unwrap_or_default();
                if selector == Locators::default().listing_link && !links.is_empty() {
                    return Ok(Element::new("", vec![("href".into(), links[0].clone())]));
                }
                return Err(missing);
            }
            self.site
                .details
                .get(self.url_without_query())
                .and_then(|fields| fields.get(selector))
                .cloned()
                .ok_or(missing)
        }

        async fn find_all(&mut self, selector: &str) -> Result<Vec<Element>, NavigationError> {
            let l = Locators::default();
            let Some(page) = self.results_page() else {
                return Ok(vec![]);
            };
            if selector == l.listing_link {
                let links = self.site.pages.get(page).cloned().unwrap_or_default();
                return Ok(links
                    .into_iter()
                    .map(|href| Element::new("", vec![("href".into(), href)]))
                    .collect());
            }
            if selector == l.next_page && page + 1 < self.site.pages.len() {
                return Ok(vec![Element::new("Next", vec![])]);
            }
            Ok(vec![])
        }

        fn current_context(&self) -> ContextHandle {
            ContextHandle(self.current)
        }

        // Registers the context before loading and releases it when the load fails,
        // the same order the Chromium navigator uses.
        async fn open_context(&mut self, url: &str) -> Result<ContextHandle, NavigationError> {
            self.opened.push(url.to_string());
            let id = self.next_id;
            self.next_id += 1;
            let previous = self.current;
            self.contexts.insert(id, url.to_string());
            self.current = id;
            self.max_open = self.max_open.max(self.contexts.len() - 1);

            let bare = url.split('?').next().unwrap_or("");
            if self.site.unreachable.iter().any(|u| u == bare) {
                self.contexts.remove(&id);
                self.current = previous;
                return Err(NavigationError::Load {
                    url: url.into(),
                    reason: "net::ERR_FAILED".into(),
                });
            }
            Ok(ContextHandle(id))
        }

        async fn close_context(&mut self) -> Result<(), NavigationError> {
            self.contexts
                .remove(&self.current)
                .map(|_| ())
                .ok_or(NavigationError::UnknownContext(ContextHandle(self.current)))
        }

        async fn switch_context(&mut self, handle: ContextHandle) -> Result<(), NavigationError> {
            if !self.contexts.contains_key(&handle.0) {
                return Err(NavigationError::UnknownContext(handle));
            }
            self.current = handle.0;
            Ok(())
        }
    }

    fn site_with_pages(pages: &[&[&str]]) -> FakeSite {
        let mut site = FakeSite::default();
        for ids in pages {
            site.pages
                .push(ids.iter().map(|id| format!("/vacancy/{}?from=serp", id)).collect());
            for id in *ids {
                site.listing(id, Some(&format!("Developer {}", id)));
            }
        }
        site
    }

    #[tokio::test]
    async fn stops_at_job_limit() {
        let site = site_with_pages(&[&["1", "2", "3", "4"], &["5", "6", "7", "8"]]);
        let mut nav = FakeNavigator::new(site);
        let n = normalizer();
        let crawler = ListingCrawler::new(plan(Some(5)), &n);

        let out = crawler.crawl(&mut nav).await.unwrap();
        assert_eq!(out.attempted, 5);
        assert_eq!(out.listings.len(), 5);
        assert_eq!(out.stop, StopReason::LimitReached);
        assert_eq!(nav.opened.len(), 5);
        assert_eq!(nav.navigations.len(), 2);
        assert_eq!(nav.max_open, 1);
        assert_eq!(nav.contexts.len(), 1, "only the main context remains");
        assert_eq!(nav.current, 0);

        let first = &out.listings[0];
        assert_eq!(first.id, "1");
        assert_eq!(first.raw_title.as_deref(), Some("Developer 1"));
        assert_eq!(first.company.as_deref(), Some("Acme"));
        assert_eq!(first.location.as_deref(), Some("Tashkent"));
        assert_eq!(first.logo_url.as_deref(), Some("https://hh.test/logos/acme.png"));
    }

    #[tokio::test]
    async fn unreachable_and_markerless_listings_are_skipped() {
        let mut site = FakeSite::default();
        site.pages.push(vec![
            "/vacancy/1".into(),
            "/vacancy/2".into(),
            "/vacancy/3".into(),
        ]);
        site.listing("1", Some("Backend"));
        site.listing("3", None);
        site.unreachable.push(detail_url("2"));
        let mut nav = FakeNavigator::new(site);
        let n = normalizer();
        let crawler = ListingCrawler::new(plan(Some(10)), &n);

        let out = crawler.crawl(&mut nav).await.unwrap();
        assert_eq!(out.attempted, 3);
        assert_eq!(out.skipped, 2);
        assert_eq!(out.listings.len(), 1);
        assert_eq!(out.listings[0].id, "1");
        assert_eq!(out.stop, StopReason::NoNextPage);
        assert_eq!(nav.contexts.len(), 1);
        assert_eq!(nav.max_open, 1);
    }

    #[tokio::test]
    async fn results_page_failure_aborts() {
        let mut site = site_with_pages(&[&["1"]]);
        site.broken_results = true;
        let mut nav = FakeNavigator::new(site);
        let n = normalizer();
        let crawler = ListingCrawler::new(plan(None), &n);

        let err = crawler.crawl(&mut nav).await.unwrap_err();
        assert!(matches!(err, NavigationError::Load { .. }));
        assert!(nav.opened.is_empty());
    }

    #[tokio::test]
    async fn failed_open_leaves_only_main_context() {
        let mut site = FakeSite::default();
        site.unreachable.push(detail_url("9"));
        let mut nav = FakeNavigator::new(site);

        let err = nav.open_context(&detail_url("9")).await.unwrap_err();
        assert!(matches!(err, NavigationError::Load { .. }));
        assert_eq!(nav.contexts.len(), 1);
        assert_eq!(nav.current, 0);
    }

    #[tokio::test]
    async fn listing_wait_protocol_failure_aborts() {
        let mut site = site_with_pages(&[&["1", "2"]]);
        site.broken_wait = true;
        let mut nav = FakeNavigator::new(site);
        let n = normalizer();

        let err = ListingCrawler::new(plan(None), &n).crawl(&mut nav).await.unwrap_err();
        assert!(matches!(err, NavigationError::Protocol(_)));
        assert!(nav.opened.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn politeness_delays_stay_within_bounds() {
        let site = site_with_pages(&[&["1", "2", "3"]]);
        let mut nav = FakeNavigator::new(site);
        let n = normalizer();
        let delays = Delays {
            page_min_ms: 100,
            page_max_ms: 200,
            detail_min_ms: 300,
            detail_max_ms: 400,
        };
        let crawler = ListingCrawler::new(CrawlPlan { delays, ..plan(None) }, &n);

        let started = tokio::time::Instant::now();
        let out = crawler.crawl(&mut nav).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(out.listings.len(), 3);
        // one results page, three detail pages
        assert!(elapsed >= Duration::from_millis(100 + 3 * 300), "{:?}", elapsed);
        assert!(elapsed <= Duration::from_millis(200 + 3 * 400), "{:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn equal_bounds_pause_exactly() {
        let started = tokio::time::Instant::now();
        pause(250, 250).await;
        assert_eq!(started.elapsed(), Duration::from_millis(250));

        let started = tokio::time::Instant::now();
        pause(0, 0).await;
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn empty_results_page_ends_crawl() {
        let site = site_with_pages(&[&[]]);
        let mut nav = FakeNavigator::new(site);
        let n = normalizer();
        let out = ListingCrawler::new(plan(None), &n).crawl(&mut nav).await.unwrap();
        assert_eq!(out.stop, StopReason::ListingWaitTimedOut);
        assert!(out.listings.is_empty());
    }

    #[tokio::test]
    async fn page_without_vacancy_links_ends_crawl() {
        let mut site = FakeSite::default();
        site.pages.push(vec!["/employer/42".into(), "https://other.test/x".into()]);
        let mut nav = FakeNavigator::new(site);
        let n = normalizer();
        let out = ListingCrawler::new(plan(None), &n).crawl(&mut nav).await.unwrap();
        assert_eq!(out.stop, StopReason::NoListings);
        assert_eq!(out.attempted, 0);
    }

    #[test]
    fn harvests_vacancy_ids() {
        let base = Url::parse("https://hh.uz/search/vacancy?page=0").unwrap();
        let els = vec![
            Element::new("", vec![("href".into(), "https://hh.uz/vacancy/111?query=go".into())]),
            Element::new("", vec![("href".into(), "/vacancy/222".into())]),
            Element::new("", vec![("href".into(), "/vacancy/111".into())]),
            Element::new("", vec![("href".into(), "/employer/9".into())]),
            Element::new("no href", vec![]),
        ];
        let links = harvest_links(&els, &base);
        let ids: Vec<_> = links.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["111", "222"]);
        assert_eq!(links[1].url.as_str(), "https://hh.uz/vacancy/222");
    }
}
