//! Engine tuning, overridable via environment variables only — no config
//! file, no CLI, matching the façade's own "no CLI, no environment
//! variables beyond these" posture for the public surface.

use crate::env::env_get;

#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Kernel submission/completion queue depth.
    pub queue_depth: u32,
    /// Max completions the reaper drains per kernel wait before yielding
    /// back to wait again (bounds reaper-thread latency under load spikes).
    pub reaper_batch: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            queue_depth: env_get("NIO_QUEUE_DEPTH", 8192),
            reaper_batch: env_get("NIO_REAPER_BATCH", 256),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_design() {
        std::env::remove_var("NIO_QUEUE_DEPTH");
        std::env::remove_var("NIO_REAPER_BATCH");
        let cfg = EngineConfig::default();
        assert_eq!(cfg.queue_depth, 8192);
        assert_eq!(cfg.reaper_batch, 256);
    }
}
