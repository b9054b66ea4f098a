// Copyright 2023, Antoine Catton
//
// Permission to use, copy, modify, and/or distribute this software for any purpose with or without
// fee is hereby granted, provided that the above copyright notice and this permission notice
// appear in all copies.
//
// THE SOFTWARE IS PROVIDED “AS IS” AND THE AUTHOR DISCLAIMS ALL WARRANTIES WITH REGARD TO THIS
// SOFTWARE INCLUDING ALL IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS. IN NO EVENT SHALL THE
// AUTHOR BE LIABLE FOR ANY SPECIAL, DIRECT, INDIRECT, OR CONSEQUENTIAL DAMAGES OR ANY DAMAGES
// WHATSOEVER RESULTING FROM LOSS OF USE, DATA OR PROFITS, WHETHER IN AN ACTION OF CONTRACT,
// NEGLIGENCE OR OTHER TORTIOUS ACTION, ARISING OUT OF OR IN CONNECTION WITH THE USE OR PERFORMANCE
// OF THIS SOFTWARE.

//! Process bootstrap: construct the Store/Expiry/Executor, bind the
//! listener, start the active-expiry task, accept connections, and shut
//! down gracefully.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::clock::{Clock, SystemClock};
use crate::config::Args;
use crate::executor::Executor;
use crate::expiry::ExpiryEngine;
use crate::session;
use crate::store::Store;

/// Constructs every component and runs until a shutdown signal (Ctrl+C) is
/// received, then drains outstanding connections before returning.
pub async fn run(args: Args) -> Result<()> {
    let store = Arc::new(Store::new());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let expiry = Arc::new(ExpiryEngine::with_tuning(
        store.clone(),
        clock.clone(),
        args.active_expiry_sample_size,
        args.active_expiry_threshold_percent,
    ));
    let executor = Arc::new(Executor::new(store, expiry.clone(), clock));

    let listener = TcpListener::bind(args.address)
        .await
        .with_context(|| format!("could not bind to {}", args.address))?;
    log::info!("mini-redis listening on {}", args.address);

    expiry.start().context("could not start active expiry")?;

    let (shutdown_complete_tx, mut shutdown_complete_rx) = mpsc::channel::<()>(1);

    tokio::select! {
        res = accept_loop(listener, executor, shutdown_complete_tx) => {
            if let Err(err) = res {
                log::error!("accept loop failed: {err}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            log::info!("received shutdown signal");
        }
    }

    expiry.stop().await;

    // Dropping the sender above (by exiting the select branch) lets the
    // receiver observe closure once every in-flight session task's cloned
    // sender has also been dropped.
    let _ = shutdown_complete_rx.recv().await;
    log::info!("mini-redis stopped");

    Ok(())
}

async fn accept_loop(
    listener: TcpListener,
    executor: Arc<Executor>,
    shutdown_complete_tx: mpsc::Sender<()>,
) -> Result<()> {
    loop {
        let (stream, _peer) = listener.accept().await.context("accept failed")?;
        let executor = executor.clone();
        let shutdown_complete_tx = shutdown_complete_tx.clone();
        tokio::spawn(async move {
            session::run(executor, stream).await;
            drop(shutdown_complete_tx);
        });
    }
}
