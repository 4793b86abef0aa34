//! Batch operations over a collection, plus events and deferred work.
//!
//! Run with: cargo run --example batch_collection

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chain::{Page, ReplaceOptions};

#[tokio::main]
async fn main() -> chain::Result<()> {
    tracing_subscriber::fmt::init();

    let page = Page::from_html(
        "<ul id=\"todo\">\
           <li>buy milk</li>\
           <li>ship release</li>\
           <li>water plants</li>\
         </ul>",
    )?;

    let clicks = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&clicks);

    let items = page
        .select("li")
        .add_class("pending")
        .on("click", move |event| {
            counter.fetch_add(1, Ordering::SeqCst);
            tracing::info!(node = event.node, "item clicked");
        })
        .trigger("click")
        .defer(|items| async move {
            // Runs only after everything above has finished.
            tracing::info!(count = items.len(), "list ready");
            Ok(())
        });
    items.settled().await;

    println!("clicks: {}", clicks.load(Ordering::SeqCst));
    println!("{}", page.html());

    // Swap the whole list out; the returned chain is bound to the heading.
    let heading = page
        .select("#todo")
        .replace_with("<h2>All done</h2>", ReplaceOptions::default());
    heading.settled().await;

    println!("{}", page.html());
    Ok(())
}
