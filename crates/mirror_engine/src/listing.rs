use engine_logging::engine_warn;
use mirror_core::{MirrorStatus, PluginRecord};
use scraper::{ElementRef, Html, Selector};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ListingError {
    #[error("pagination widget not found")]
    MissingPagination,
    #[error("pagination entry {0:?} is not a page number")]
    MalformedPagination(String),
    #[error("listing container not found")]
    MissingListing,
    #[error("invalid site root {0}")]
    InvalidSiteRoot(String),
}

/// Reads the plugin directory's listing markup.
pub trait ListingParser: Send + Sync {
    /// Highest page number advertised by the pagination widget.
    fn total_pages(&self, html: &str) -> Result<u32, ListingError>;

    /// Every plugin row on one listing page, in page order.
    fn plugin_rows(&self, html: &str) -> Result<Vec<PluginRecord>, ListingError>;
}

/// Parser for pluginmirror.com listing pages.
///
/// Rows live in the first `div.large-9` as `div[class="row"]`. Each row has the
/// plugin link in its own `div.large-9` and the mirror button in `div.large-3`.
/// A button pointing at `javascript:` means the mirror never resolved.
#[derive(Debug, Clone)]
pub struct PluginMirrorParser {
    site_root: Url,
}

impl PluginMirrorParser {
    pub fn new(site_root: &str) -> Result<Self, ListingError> {
        let site_root = Url::parse(site_root)
            .map_err(|_| ListingError::InvalidSiteRoot(site_root.to_string()))?;
        Ok(Self { site_root })
    }

    fn parse_row(&self, row: ElementRef<'_>, selectors: &RowSelectors) -> Option<PluginRecord> {
        let link = row
            .select(&selectors.name_cell)
            .next()
            .and_then(|cell| cell.select(&selectors.anchor).next());
        let Some(link) = link else {
            engine_warn!("listing row without plugin link: {}", row.html());
            return None;
        };
        let Some(href) = link.value().attr("href") else {
            engine_warn!("plugin link without href: {}", link.html());
            return None;
        };
        let plugin_page = match self.site_root.join(href) {
            Ok(url) => url.to_string(),
            Err(err) => {
                engine_warn!("cannot resolve plugin page {:?}: {}", href, err);
                return None;
            }
        };
        let plugin_name = link.text().collect::<String>().trim().to_string();

        let mirror_href = row
            .select(&selectors.mirror_cell)
            .next()
            .and_then(|cell| cell.select(&selectors.button).next())
            .and_then(|button| button.value().attr("href"))
            .map(str::trim);

        let (mirror_status, repository_url) = match mirror_href {
            Some(href) if !href.is_empty() && !is_script_placeholder(href) => {
                (MirrorStatus::Ok, Some(href.to_string()))
            }
            _ => (MirrorStatus::Ko, None),
        };

        Some(PluginRecord {
            plugin_name,
            plugin_page,
            mirror_status,
            repository_url,
        })
    }
}

impl ListingParser for PluginMirrorParser {
    fn total_pages(&self, html: &str) -> Result<u32, ListingError> {
        let doc = Html::parse_document(html);
        let pagination = selector("ul.pagination");
        let item = selector("li");

        let widget = doc
            .select(&pagination)
            .next()
            .ok_or(ListingError::MissingPagination)?;
        let items: Vec<ElementRef<'_>> = widget.select(&item).collect();
        // The last entry is the "next" arrow; the one before it is the last page.
        if items.len() < 2 {
            let text = widget.text().collect::<String>().trim().to_string();
            return Err(ListingError::MalformedPagination(text));
        }
        let text = items[items.len() - 2]
            .text()
            .collect::<String>()
            .trim()
            .to_string();
        text.parse::<u32>()
            .map_err(|_| ListingError::MalformedPagination(text))
    }

    fn plugin_rows(&self, html: &str) -> Result<Vec<PluginRecord>, ListingError> {
        let doc = Html::parse_document(html);
        let selectors = RowSelectors::new();

        let listing = doc
            .select(&selectors.name_cell)
            .next()
            .ok_or(ListingError::MissingListing)?;

        Ok(listing
            .select(&selectors.row)
            .filter_map(|row| self.parse_row(row, &selectors))
            .collect())
    }
}

struct RowSelectors {
    row: Selector,
    name_cell: Selector,
    mirror_cell: Selector,
    anchor: Selector,
    button: Selector,
}

impl RowSelectors {
    fn new() -> Self {
        Self {
            row: selector(r#"div[class="row"]"#),
            name_cell: selector("div.large-9"),
            mirror_cell: selector("div.large-3"),
            anchor: selector("a"),
            button: selector("a.button"),
        }
    }
}

fn is_script_placeholder(href: &str) -> bool {
    href.get(..10)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("javascript"))
}

fn selector(css: &str) -> Selector {
    // Selectors are compile-time constants of this module.
    Selector::parse(css).unwrap_or_else(|err| panic!("invalid selector {css:?}: {err:?}"))
}
