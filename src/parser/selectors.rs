//! CSS selectors for product pages
//!
//! Storefronts mark up their purchase controls and product sections in many
//! different ways; the lists below are tried in order.

use lazy_static::lazy_static;
use scraper::Selector;

// Helper macro to parse selectors safely at compile time
macro_rules! parse_selector {
    ($s:expr) => {
        Selector::parse($s).expect(concat!("Invalid CSS selector: ", $s))
    };
}

/// Class names that identify the product section of a page
pub const PRODUCT_SECTION_CLASSES: &[&str] = &[
    "product-detail",
    "product-details",
    "product-info",
    "product-content",
    "product-right",
    "product_page",
    "product-layout",
    "product-summary",
];

lazy_static! {
    static ref PRIMARY_CONTROL: Selector = parse_selector!(".add-to-cart");

    static ref CLICKABLE: Selector = parse_selector!("button, a");

    static ref PRODUCT_SECTION: Selector = parse_selector!(
        ".product-detail, .product-details, .product-info, .product-content, \
         .product-right, .product_page, .product-layout, .product-summary"
    );

    static ref MAIN: Selector = parse_selector!("main");

    static ref BODY: Selector = parse_selector!("body");

    static ref TITLE: Selector = parse_selector!("title");

    static ref SOLD_OUT_BADGE: Selector =
        parse_selector!("[class*=\"sold\"], [class*=\"out\"], [id*=\"sold\"], [id*=\"out\"]");
}

/// Selectors used to build a snapshot
pub struct ProductSelectors {
    pub primary_control: &'static Selector,
    pub clickable: &'static Selector,
    pub product_section: &'static Selector,
    pub main: &'static Selector,
    pub body: &'static Selector,
    pub title: &'static Selector,
    pub sold_out_badge: &'static Selector,
}

impl ProductSelectors {
    pub fn new() -> Self {
        Self {
            primary_control: &PRIMARY_CONTROL,
            clickable: &CLICKABLE,
            product_section: &PRODUCT_SECTION,
            main: &MAIN,
            body: &BODY,
            title: &TITLE,
            sold_out_badge: &SOLD_OUT_BADGE,
        }
    }
}

impl Default for ProductSelectors {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn test_selectors_compile() {
        let selectors = ProductSelectors::new();
        let doc = Html::parse_document(
            r#"<html><body><main><div class="product-info"><button class="add-to-cart">Add</button></div></main></body></html>"#,
        );
        assert_eq!(doc.select(selectors.primary_control).count(), 1);
        assert_eq!(doc.select(selectors.product_section).count(), 1);
        assert_eq!(doc.select(selectors.main).count(), 1);
    }

    #[test]
    fn test_sold_out_badge_matches_partial_class() {
        let selectors = ProductSelectors::new();
        let doc = Html::parse_document(
            r#"<div><span class="badge-soldout">Sold out</span><span id="stock-out">x</span></div>"#,
        );
        assert_eq!(doc.select(selectors.sold_out_badge).count(), 2);
    }
}
