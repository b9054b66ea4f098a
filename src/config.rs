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

use std::net::SocketAddr;

use clap::Parser;

use crate::expiry::{DEFAULT_SAMPLE_SIZE, DEFAULT_THRESHOLD_PERCENT};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable colors in logging.
    #[arg(long, default_value_t = false)]
    pub no_logging_colors: bool,

    /// Minimal logging level.
    #[arg(short, long, default_value_t = log::LevelFilter::Info)]
    pub log_level: log::LevelFilter,

    /// Maximum number of keys sampled per active-expiry cycle.
    #[arg(long, default_value_t = DEFAULT_SAMPLE_SIZE)]
    pub active_expiry_sample_size: usize,

    /// Deletion-rate threshold (percent) below which an active-expiry
    /// cycle stops instead of resampling immediately.
    #[arg(long, default_value_t = DEFAULT_THRESHOLD_PERCENT)]
    pub active_expiry_threshold_percent: f64,

    /// Address to bind on. Use 0.0.0.0 to listen on all addresses
    /// (e.g. "0.0.0.0:6379").
    #[arg(default_value = "127.0.0.1:6379")]
    pub address: SocketAddr,
}
