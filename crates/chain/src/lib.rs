//! Chainable, queue-ordered DOM manipulation.
//!
//! A [`Page`] owns an in-memory document; [`Page::select`] resolves a
//! selector, a markup fragment, or raw node handles into a [`Chain`] — a
//! façade whose operations enqueue work on a per-target queue and return
//! immediately. Items run strictly one at a time in enqueue order (with an
//! immediate lane that jumps the line and a deferred lane that runs last),
//! async arguments are awaited before their operation applies, and a
//! failing item is reported to the configured [`ErrorSink`] and skipped
//! while the rest of the chain continues.
//!
//! ```no_run
//! use chain::Page;
//!
//! # async fn demo() -> chain::Result<()> {
//! let page = Page::from_html("<ul><li>a</li><li>b</li></ul>")?;
//! let items = page.select("li").add_class("done").attr("data-ok", "1");
//! items.settled().await;
//! # Ok(())
//! # }
//! ```

pub mod chain;
pub mod events;
pub mod hook;
pub mod options;
pub mod page;
pub mod promise;
pub mod queue;
pub mod resolve;
pub mod value;

pub use chain::Chain;
pub use events::{EventRef, ListenerId, ListenerRegistry};
pub use hook::{default_hook, ChainError, ErrorContext, ErrorHook, ErrorSink, Result};
pub use options::{ContentOptions, InsertMode, Pairing, Position, ReplaceOptions};
pub use page::Page;
pub use promise::{promisify, PromisifyOptions, Rejecter, Resolver};
pub use queue::Lane;
pub use resolve::Source;
pub use value::Lazy;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn end_to_end_card_build() {
        let page = Page::new();
        let card = page
            .select("<div class=\"card\"></div>")
            .append("<h3>Title</h3>")
            .append("<p>Body</p>")
            .css("margin", "8px");
        card.settled().await;
        assert_eq!(
            card.outer_html_now(),
            "<div class=\"card\" style=\"margin: 8px\"><h3>Title</h3><p>Body</p></div>"
        );
    }
}
