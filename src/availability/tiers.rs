//! Ordered inference tiers
//!
//! Each tier is a pure function returning a definite status or `None` for
//! "no opinion". The text tiers only decide when exactly one of the
//! positive and negative sides matches; pages that advertise both (a
//! stocked item next to sold-out related products) fall through.

use super::{Snapshot, StockStatus};

/// A named inference step
#[derive(Clone, Copy)]
pub struct Tier {
    pub name: &'static str,
    pub decide: fn(&Snapshot) -> Option<StockStatus>,
}

/// Tiers in evaluation order
pub static TIERS: &[Tier] = &[
    Tier {
        name: "primary_control",
        decide: primary_control,
    },
    Tier {
        name: "section_text",
        decide: section_text,
    },
    Tier {
        name: "body_text",
        decide: body_text,
    },
];

/// Positive phrases looked for in the product section
pub const SECTION_POSITIVE: &[&str] = &["in stock", "available now", "ready to ship"];

/// Positive phrases looked for in the whole page
pub const BODY_POSITIVE: &[&str] = &["add to cart", "in stock"];

/// Negative phrases shared by both text tiers
pub const NEGATIVE: &[&str] = &[
    "out of stock",
    "sold out",
    "currently unavailable",
    "notify me",
];

/// A visible purchase control is decisive
pub fn primary_control(snapshot: &Snapshot) -> Option<StockStatus> {
    let control = snapshot.primary_control.filter(|control| control.visible)?;

    Some(if control.disabled {
        StockStatus::OutOfStock
    } else {
        StockStatus::InStock
    })
}

/// Phrases in the product section, plus notify buttons and sold-out badges
pub fn section_text(snapshot: &Snapshot) -> Option<StockStatus> {
    let text = snapshot.section_text.to_lowercase();

    let positive = contains_any(&text, SECTION_POSITIVE);
    let negative = contains_any(&text, NEGATIVE)
        || snapshot.notify_buttons_count > 0
        || snapshot.sold_out_badges_count > 0;

    one_sided(positive, negative)
}

/// Phrases anywhere on the page
pub fn body_text(snapshot: &Snapshot) -> Option<StockStatus> {
    let text = snapshot.body_text.to_lowercase();

    one_sided(
        contains_any(&text, BODY_POSITIVE),
        contains_any(&text, NEGATIVE),
    )
}

fn contains_any(text: &str, tokens: &[&str]) -> bool {
    tokens.iter().any(|token| text.contains(token))
}

fn one_sided(positive: bool, negative: bool) -> Option<StockStatus> {
    match (positive, negative) {
        (true, false) => Some(StockStatus::InStock),
        (false, true) => Some(StockStatus::OutOfStock),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_control_tier() {
        let enabled = Snapshot::default().with_primary_control(true, false);
        assert_eq!(primary_control(&enabled), Some(StockStatus::InStock));

        let disabled = Snapshot::default().with_primary_control(true, true);
        assert_eq!(primary_control(&disabled), Some(StockStatus::OutOfStock));

        let hidden = Snapshot::default().with_primary_control(false, false);
        assert_eq!(primary_control(&hidden), None);

        assert_eq!(primary_control(&Snapshot::default()), None);
    }

    #[test]
    fn test_section_tier_counts_badges_as_negative() {
        let badge = Snapshot::default().with_sold_out_badges(1);
        assert_eq!(section_text(&badge), Some(StockStatus::OutOfStock));

        let button = Snapshot::default().with_notify_buttons(2);
        assert_eq!(section_text(&button), Some(StockStatus::OutOfStock));

        let conflicting = Snapshot::default()
            .with_section_text("ready to ship")
            .with_notify_buttons(1);
        assert_eq!(section_text(&conflicting), None);
    }

    #[test]
    fn test_section_tier_positive_tokens() {
        for token in SECTION_POSITIVE {
            let snapshot = Snapshot::default().with_section_text(format!("item {token} today"));
            assert_eq!(section_text(&snapshot), Some(StockStatus::InStock), "{token}");
        }
    }

    #[test]
    fn test_body_tier_does_not_use_section_only_tokens() {
        // "available now" is only a section-level token
        let snapshot = Snapshot::default().with_body_text("available now");
        assert_eq!(body_text(&snapshot), None);

        let snapshot = Snapshot::default().with_body_text("Add To Cart");
        assert_eq!(body_text(&snapshot), Some(StockStatus::InStock));
    }

    #[test]
    fn test_tiers_are_ordered() {
        let names: Vec<_> = TIERS.iter().map(|tier| tier.name).collect();
        assert_eq!(names, vec!["primary_control", "section_text", "body_text"]);
    }
}
