//! Build a small fragment with one chain and print the resulting markup.
//!
//! Run with: cargo run --example basic_chain

use std::time::Duration;

use chain::{Lazy, Page};

#[tokio::main]
async fn main() -> chain::Result<()> {
    tracing_subscriber::fmt::init();

    let page = Page::from_html("<div id=\"app\"><p>loading...</p></div>")?;

    let username = Lazy::future(async {
        // Stand-in for a real lookup.
        tokio::time::sleep(Duration::from_millis(50)).await;
        "alice"
    });

    let app = page
        .select("#app")
        .add_class("ready")
        .attr("data-user", username)
        .html("<h1>Welcome</h1>")
        .append("<p>Signed in.</p>")
        .css("padding", "16px");
    app.settled().await;

    println!("{}", page.html());
    Ok(())
}
