use anyhow::{Context, Result};

use stockwatch::availability::infer_with_tier;
use stockwatch::config::RendererConfig;
use stockwatch::crawler::HttpRenderer;

/// Render a product page once and print the inferred stock status
pub async fn check(
    url: String,
    location: String,
    location_param: Option<String>,
    json: bool,
) -> Result<()> {
    let config = RendererConfig {
        location_param,
        ..RendererConfig::default()
    };
    let renderer = HttpRenderer::new(&config).context("Failed to create renderer")?;

    let page = renderer
        .fetch_page(&url, &location)
        .await
        .with_context(|| format!("Failed to render {url}"))?;

    let (result, tier) = infer_with_tier(&page.snapshot);

    if json {
        let output = serde_json::json!({
            "url": url,
            "locationFilter": location,
            "title": page.title,
            "result": result,
            "tier": tier,
            "snapshot": page.snapshot,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Stock check");
    println!("===========");
    println!("  URL: {url}");
    if !location.is_empty() {
        println!("  Location: {location}");
    }
    if let Some(title) = &page.title {
        println!("  Title: {title}");
    }
    println!();
    println!("  Status: {}", result.status.label());
    println!("  Decided by: {}", tier.unwrap_or("no tier matched"));

    let snapshot = &page.snapshot;
    match snapshot.primary_control {
        Some(control) => println!(
            "  Add to cart: visible={} disabled={}",
            control.visible, control.disabled
        ),
        None => println!("  Add to cart: not found"),
    }
    println!("  Notify buttons: {}", snapshot.notify_buttons_count);
    println!("  Sold-out badges: {}", snapshot.sold_out_badges_count);

    Ok(())
}
