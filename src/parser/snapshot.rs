//! Snapshot extraction from product page HTML
//!
//! This is a static approximation of what a browser shows: visibility is
//! judged from markup (`hidden`, `aria-hidden`, inline `display:none`,
//! utility classes) rather than computed styles, and text is gathered the
//! way `innerText` would, skipping scripts and hidden subtrees.

use scraper::{ElementRef, Html};

use crate::availability::{PrimaryControl, Snapshot};
use crate::parser::sanitize::{normalize_text, snippet, TEXT_SNIPPET_CHARS};
use crate::utils::take_chars;
use crate::parser::selectors::{ProductSelectors, PRODUCT_SECTION_CLASSES};

/// Elements whose text never reaches the reader
const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Elements that break text flow
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr",
    "li", "main", "nav", "ol", "p", "pre", "section", "table", "tbody", "td", "tfoot", "th",
    "thead", "tr", "ul",
];

/// Phrases in a sold-out badge
const SOLD_OUT_PHRASES: &[&str] = &["sold out", "out of stock", "currently unavailable"];

/// Visible product page content extracted from HTML
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPage {
    /// Inference input
    pub snapshot: Snapshot,

    /// Document title, if any
    pub title: Option<String>,

    /// Full normalized body text (not truncated)
    pub page_text: String,
}

impl ParsedPage {
    /// Whether the page text carries typical error-page wording
    pub fn looks_like_error_page(&self) -> bool {
        const ERROR_INDICATORS: &[&str] = &[
            "we are sorry",
            "not a functioning page",
            "page not found",
            "404",
        ];
        ERROR_INDICATORS
            .iter()
            .any(|token| self.snapshot.body_text.contains(token))
    }

    /// Whether the page mentions `needle` anywhere (case-insensitive)
    pub fn mentions(&self, needle: &str) -> bool {
        let needle = normalize_text(needle);
        !needle.is_empty() && self.page_text.contains(&needle)
    }
}

/// Product page parser
pub struct SnapshotParser {
    selectors: ProductSelectors,
}

impl SnapshotParser {
    #[must_use]
    pub fn new() -> Self {
        Self {
            selectors: ProductSelectors::new(),
        }
    }

    /// Parse a product page into a snapshot
    pub fn parse(&self, html: &str) -> ParsedPage {
        let document = Html::parse_document(html);

        let body = document
            .select(self.selectors.body)
            .next()
            .unwrap_or_else(|| document.root_element());

        let control = self.find_primary_control(&document);
        let section = control
            .and_then(closest_product_section)
            .or_else(|| document.select(self.selectors.product_section).next())
            .or_else(|| document.select(self.selectors.main).next())
            .unwrap_or(body);

        let page_text = normalize_text(&visible_text(body));
        let body_text = take_chars(&page_text, TEXT_SNIPPET_CHARS);
        let section_text = if section.id() == body.id() {
            body_text.clone()
        } else {
            snippet(&visible_text(section))
        };

        let snapshot = Snapshot {
            primary_control: control.map(|el| PrimaryControl {
                visible: is_visible(el),
                disabled: is_disabled(el),
            }),
            section_text,
            body_text,
            notify_buttons_count: self.count_notify_buttons(section),
            sold_out_badges_count: self.count_sold_out_badges(section),
        };

        let title = document
            .select(self.selectors.title)
            .next()
            .map(|el| crate::utils::normalize_whitespace(&el.text().collect::<String>()))
            .filter(|title| !title.is_empty());

        ParsedPage {
            snapshot,
            title,
            page_text,
        }
    }

    /// `.add-to-cart`, else the first button or link labelled "add to cart"
    fn find_primary_control<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        document
            .select(self.selectors.primary_control)
            .next()
            .or_else(|| {
                document
                    .select(self.selectors.clickable)
                    .find(|el| normalize_text(&el.text().collect::<String>()).contains("add to cart"))
            })
    }

    fn count_notify_buttons(&self, section: ElementRef<'_>) -> usize {
        section
            .select(self.selectors.clickable)
            .filter(|el| is_visible(*el))
            .filter(|el| normalize_text(&el.text().collect::<String>()).contains("notify me"))
            .count()
    }

    fn count_sold_out_badges(&self, section: ElementRef<'_>) -> usize {
        section
            .select(self.selectors.sold_out_badge)
            .filter(|el| is_visible(*el))
            .filter(|el| {
                let text = normalize_text(&el.text().collect::<String>());
                SOLD_OUT_PHRASES.iter().any(|phrase| text.contains(phrase))
            })
            .count()
    }
}

impl Default for SnapshotParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Nearest product section, starting with the control itself
fn closest_product_section(control: ElementRef<'_>) -> Option<ElementRef<'_>> {
    std::iter::once(control)
        .chain(control.ancestors().filter_map(ElementRef::wrap))
        .find(|el| {
            el.value().name() == "form"
                || el
                    .value()
                    .classes()
                    .any(|class| PRODUCT_SECTION_CLASSES.contains(&class))
        })
}

fn is_disabled(el: ElementRef<'_>) -> bool {
    let element = el.value();
    element.attr("disabled").is_some()
        || element.attr("aria-disabled") == Some("true")
        || element
            .attr("class")
            .is_some_and(|class| class.to_lowercase().contains("disabled"))
}

/// Visible unless the element or one of its ancestors is hidden
fn is_visible(el: ElementRef<'_>) -> bool {
    !is_hidden(el) && !el.ancestors().filter_map(ElementRef::wrap).any(is_hidden)
}

fn is_hidden(el: ElementRef<'_>) -> bool {
    let element = el.value();

    if element.attr("hidden").is_some() || element.attr("aria-hidden") == Some("true") {
        return true;
    }

    if element
        .classes()
        .any(|class| class == "hidden" || class == "d-none")
    {
        return true;
    }

    element.attr("style").is_some_and(|style| {
        let style: String = style
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        style.contains("display:none") || style.contains("visibility:hidden")
    })
}

/// Text a reader would see inside `root`
fn visible_text(root: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(root, &mut out);
    out
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_el) = ElementRef::wrap(child) {
            let name = child_el.value().name();
            if SKIPPED_TAGS.contains(&name) || is_hidden(child_el) {
                continue;
            }

            let block = BLOCK_TAGS.contains(&name);
            if block {
                out.push(' ');
            }
            collect_text(child_el, out);
            if block {
                out.push(' ');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(html: &str) -> ParsedPage {
        SnapshotParser::new().parse(html)
    }

    #[test]
    fn test_enabled_add_to_cart_button() {
        let page = parse(
            r#"<html><body><div class="product-info">
                <h1>Blue Kettle</h1>
                <button class="add-to-cart">Add to cart</button>
            </div></body></html>"#,
        );
        assert_eq!(
            page.snapshot.primary_control,
            Some(PrimaryControl {
                visible: true,
                disabled: false
            })
        );
        assert!(page.snapshot.section_text.contains("blue kettle"));
    }

    #[test]
    fn test_disabled_variants() {
        for button in [
            r#"<button class="add-to-cart" disabled>Add to cart</button>"#,
            r#"<button class="add-to-cart btn-disabled">Add to cart</button>"#,
            r#"<a class="add-to-cart" aria-disabled="true">Add to cart</a>"#,
        ] {
            let page = parse(&format!("<html><body>{button}</body></html>"));
            let control = page.snapshot.primary_control.expect("control");
            assert!(control.disabled, "{button}");
        }
    }

    #[test]
    fn test_hidden_ancestor_hides_control() {
        let page = parse(
            r#"<html><body><div style="display: none"><button>Add to Cart</button></div></body></html>"#,
        );
        let control = page.snapshot.primary_control.expect("control");
        assert!(!control.visible);
    }

    #[test]
    fn test_scripts_are_not_text() {
        let page = parse(
            r#"<html><head><title>Shop</title></head><body><p>Sold out</p><script>var s = "in stock";</script></body></html>"#,
        );
        assert_eq!(page.snapshot.body_text, "sold out");
        assert_eq!(page.title.as_deref(), Some("Shop"));
    }

    #[test]
    fn test_block_elements_separate_words() {
        let page = parse("<html><body><div>Sold</div><div>out</div></body></html>");
        assert_eq!(page.snapshot.body_text, "sold out");
    }

    #[test]
    fn test_section_falls_back_to_main() {
        let page = parse(
            "<html><body><nav>menu</nav><main><p>Ready to ship</p></main></body></html>",
        );
        assert_eq!(page.snapshot.section_text, "ready to ship");
        assert_eq!(page.snapshot.body_text, "menu ready to ship");
    }

    #[test]
    fn test_control_can_be_its_own_section() {
        let page = parse(
            r#"<html><body><div class="product-info">
                <p>Related: sold out</p>
                <form class="add-to-cart"><p>Ready to ship</p><button>Add</button></form>
            </div></body></html>"#,
        );
        assert_eq!(page.snapshot.section_text, "ready to ship add");
        assert_eq!(page.snapshot.body_text, "related: sold out ready to ship add");
    }

    #[test]
    fn test_body_text_is_truncated_page_text() {
        let words = "in stock ".repeat(100);
        let page = parse(&format!("<html><body><p>{words}</p></body></html>"));
        assert_eq!(page.snapshot.body_text.chars().count(), TEXT_SNIPPET_CHARS);
        assert!(page.page_text.len() > page.snapshot.body_text.len());
        assert!(page.page_text.starts_with(&page.snapshot.body_text));
        assert_eq!(page.snapshot.section_text, page.snapshot.body_text);
    }

    #[test]
    fn test_error_page_and_mentions() {
        let page = parse("<html><body><h1>Page not found</h1><p>Deliver to 560001</p></body></html>");
        assert!(page.looks_like_error_page());
        assert!(page.mentions("560001"));
        assert!(!page.mentions("110001"));
        assert!(!page.mentions("  "));
    }
}
