//! The render pipeline's final product, grounded on the predecessor's
//! `render()` returning a `(headers, formatted)` pair: encoded bytes plus
//! everything an external HTTP shim needs to build a response, without
//! this crate depending on any HTTP-framework type.

use std::collections::BTreeMap;

/// One pipeline stage's wall-clock duration, used to build the
/// `Server-Timing` header's `opN;desc="stage";dur=<ms>` entries.
#[derive(Debug, Clone)]
pub struct StageTiming {
    pub stage: &'static str,
    pub duration: std::time::Duration,
}

/// A fully rendered tile: encoded bytes, the format's content type, the
/// sources that contributed pixels, and per-stage timings — everything
/// `render`/`render_tile`/`render_skadi` hand back to the caller (§4.8
/// step 7).
#[derive(Debug, Clone)]
pub struct RenderedTile {
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
    pub sources_used: Vec<String>,
    pub timings: Vec<StageTiming>,
    pub headers: BTreeMap<String, String>,
}

impl RenderedTile {
    /// Renders the `Server-Timing` header value: one `opN` entry per
    /// pipeline stage, then one `srcN` entry per source used.
    pub fn server_timing(&self) -> String {
        let mut entries = Vec::with_capacity(self.timings.len() + self.sources_used.len());

        for (index, timing) in self.timings.iter().enumerate() {
            entries.push(format!(
                "op{};desc=\"{}\";dur={:.3}",
                index + 1,
                timing.stage,
                timing.duration.as_secs_f64() * 1000.0
            ));
        }
        for (index, name) in self.sources_used.iter().enumerate() {
            entries.push(format!("src{};desc=\"{name}\"", index + 1));
        }

        entries.join(", ")
    }
}
