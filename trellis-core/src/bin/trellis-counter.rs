//! Counter demo.
//!
//! ```text
//! trellis-counter [config.toml]
//! ```
//!
//! Serves a counter page at `/`, a per-name greeting at `/greet/{name}` and
//! a streamed countdown. Open two browser tabs to see per-connection state.

use std::path::Path;
use std::time::Duration;

use futures_util::stream;
use serde_json::json;
use trellis_core::logging::init_logging;
use trellis_core::prelude::*;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(Path::new(&path))?,
        None => Config::from_env()?,
    };
    init_logging(&config.logging)?;

    let counter = StateSchema::new("Counter")
        .field("count", 0)
        .field("step", 1)
        .computed("doubled", |state| {
            json!(state.get_as::<i64>("count").unwrap_or(0) * 2)
        })
        .method("increment", |state, _| {
            let step = state.get_as::<i64>("step")?;
            state.update("count", |n: i64| n + step)?;
            Ok(Reply::None)
        })
        .method("decrement", |state, _| {
            let step = state.get_as::<i64>("step")?;
            state.update("count", |n: i64| n - step)?;
            Ok(Reply::None)
        })
        .method("reset", |state, _| {
            state.set("count", 0)?;
            Ok(Action::toast_with("Counter reset", ToastVariant::Success, 2000).into())
        })
        .build();

    let increment = counter.handler("increment")?;
    let decrement = counter.handler("decrement")?;
    let reset = counter.handler("reset")?;
    let set_step = counter.setter("step")?;

    let countdown = Handler::streaming("countdown", |_| {
        stream::unfold(3, |n| async move {
            if n == 0 {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
            let reply: HandlerResult = Ok(Action::toast(format!("{n}...")).into());
            Some((reply, n - 1))
        })
    });

    let page_state = counter.clone();
    App::with_config(config)
        .state(&counter)
        .page("/", move |ctx: &PageContext| {
            let count = ctx.state().read(&page_state, "count").unwrap_or_default();
            let doubled = ctx.state().read(&page_state, "doubled").unwrap_or_default();
            let step = ctx.state().read(&page_state, "step").unwrap_or_default();

            Ok(Node::new("main")
                .class("counter")
                .child(Node::with("h1", format!("Count: {count}")))
                .child(Node::with("p", format!("Doubled: {doubled}")).id("doubled"))
                .child(
                    Node::new("div")
                        .class("controls")
                        .child(Node::with("button", "-").on_click(decrement.clone()))
                        .child(Node::with("button", "+").on_click(increment.clone()))
                        .child(Node::with("button", "Reset").on_click(reset.clone())),
                )
                .child(
                    Node::new("input")
                        .attr("type", "number")
                        .attr("value", step.to_string())
                        .on_change(set_step.clone()),
                )
                .child(Node::with("button", "Countdown").on_click(countdown.clone()))
                .child(Node::with("a", "Say hello").attr("href", "/greet/world")))
        })
        .page("/greet/{name}", |ctx: &PageContext| {
            let name = ctx.param("name").unwrap_or("stranger");
            Ok(Node::new("main")
                .child(Node::with("h1", format!("Hello, {name}!")))
                .child(Node::with("a", "Back").attr("href", "/")))
        })
        .build()
        .run()
        .await?;

    Ok(())
}
