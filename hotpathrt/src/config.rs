//! Runtime configuration, constructed once at startup and passed by
//! reference to whatever needs it.

use crate::{anchor::HotThreshold, log::Log};
use std::{error::Error, sync::Arc};

const DEFAULT_TRACING_THRESHOLD: HotThreshold = 50;
const DEFAULT_TRACE_FAILURE_THRESHOLD: usize = 5;

pub struct HotpathConfig {
    tracing_threshold: HotThreshold,
    trace_failure_threshold: usize,
    log: Arc<Log>,
}

impl HotpathConfig {
    /// Create a configuration with default thresholds, reading `HP_LOG` for
    /// the logging setup.
    pub fn new() -> Result<Self, Box<dyn Error>> {
        Ok(Self {
            tracing_threshold: DEFAULT_TRACING_THRESHOLD,
            trace_failure_threshold: DEFAULT_TRACE_FAILURE_THRESHOLD,
            log: Arc::new(Log::new()?),
        })
    }

    /// Change how many visits a loop header takes before a recording attempt
    /// starts.
    pub fn with_tracing_threshold(mut self, threshold: HotThreshold) -> Self {
        self.tracing_threshold = threshold;
        self
    }

    /// Change how many failed recordings an anchor tolerates before it stops
    /// trying.
    pub fn with_trace_failure_threshold(mut self, threshold: usize) -> Self {
        self.trace_failure_threshold = threshold;
        self
    }

    pub fn tracing_threshold(&self) -> HotThreshold {
        self.tracing_threshold
    }

    pub fn trace_failure_threshold(&self) -> usize {
        self.trace_failure_threshold
    }

    pub(crate) fn log(&self) -> &Arc<Log> {
        &self.log
    }
}
