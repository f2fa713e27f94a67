//! Simulated visual servoing service.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use scout_middleware::StatusService;
use scout_types::ScoutError;
use tracing::debug;

/// One scripted answer of [`SimServo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServoReply {
    Code(i32),
    Unavailable,
}

/// Replies are consumed in order; the last one repeats.
pub struct SimServo {
    script: Mutex<VecDeque<ServoReply>>,
    duration: Duration,
    calls: Mutex<u32>,
}

impl SimServo {
    pub const SERVICE: &'static str = "visual_servoing/do_visual_servoing";

    pub fn new(script: impl IntoIterator<Item = ServoReply>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            duration: Duration::from_millis(500),
            calls: Mutex::new(0),
        }
    }

    /// Always answer with status `code`.
    pub fn returning(code: i32) -> Self {
        Self::new([ServoReply::Code(code)])
    }

    /// How long a call takes.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn calls(&self) -> u32 {
        *self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn next_reply(&self) -> ServoReply {
        let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
        if script.len() > 1 {
            script.pop_front().unwrap_or(ServoReply::Unavailable)
        } else {
            script.front().copied().unwrap_or(ServoReply::Unavailable)
        }
    }
}

#[async_trait]
impl StatusService for SimServo {
    fn name(&self) -> &str {
        Self::SERVICE
    }

    async fn call(&self) -> Result<i32, ScoutError> {
        *self.calls.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        let reply = self.next_reply();
        debug!(?reply, "sim servo called");
        match reply {
            ServoReply::Code(code) => {
                tokio::time::sleep(self.duration).await;
                Ok(code)
            }
            ServoReply::Unavailable => Err(ScoutError::ServiceUnavailable {
                service: Self::SERVICE.to_string(),
                details: "service not advertised".to_string(),
            }),
        }
    }
}
