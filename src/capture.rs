use crate::decoder;
use crate::link::{Command, CommError, Edge, ResponseBatch, SerialLink, Transport};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Timer input clock of the analyzer MCU, in Hz.
pub const BASE_CLOCK_HZ: f64 = 72_000_000.0;

/// Token the firmware includes in a STATUS response once the buffer is full.
const READY_TOKEN: &str = "READY";

/// Sample rate selected by the timer divisors.
pub fn sample_rate_hz(psc: u16, arr: u16) -> f64 {
    BASE_CLOCK_HZ / f64::from(psc as u32 + 1) / f64::from(arr as u32 + 1)
}

/// Human-readable rate: kHz below 1 MHz, MHz at or above.
pub fn format_sample_rate(hz: f64) -> String {
    if hz >= 1_000_000.0 {
        format!("{:.2} MHz", hz / 1_000_000.0)
    } else {
        format!("{:.2} kHz", hz / 1_000.0)
    }
}

/// Trigger condition gating when capture begins on-device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trigger {
    pub pin: u8,
    pub edge: Edge,
}

/// Session-lifetime capture parameters, mutated only through the
/// controller's explicit set operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConfig {
    pub psc: u16,
    pub arr: u16,
    pub sample_count: u16,
    pub trigger: Option<Trigger>,
}

impl CaptureConfig {
    pub fn sample_rate_hz(&self) -> f64 {
        sample_rate_hz(self.psc, self.arr)
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        // Firmware power-on defaults: 100 kHz, 1024 samples, free-running.
        Self {
            psc: 71,
            arr: 9,
            sample_count: 1024,
            trigger: None,
        }
    }
}

/// Bounded-retry policy for the post-CAP readiness poll.
///
/// The settle delay gives the device time to arm before the first STATUS;
/// the attempt cap keeps worst-case latency bounded.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub settle: Duration,
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(500),
            max_attempts: 20,
            interval: Duration::from_millis(200),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("a capture is already in progress")]
    Busy,

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error(transparent)]
    Comm(#[from] CommError),
}

/// Capture sequence state. `Done` and `Failed` re-arm like `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Arming,
    Polling,
    Fetching,
    Done,
    Failed,
}

impl CaptureState {
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            CaptureState::Arming | CaptureState::Polling | CaptureState::Fetching
        )
    }
}

/// Orchestrates the arm / poll / fetch sequence on top of [`SerialLink`]
/// and owns the most recent sample buffer.
///
/// The buffer is published as an `Arc<[u8]>` replaced wholesale on each
/// successful fetch, so a renderer holding a snapshot never observes a
/// half-built capture.
pub struct CaptureController<T> {
    link: Option<SerialLink<T>>,
    config: CaptureConfig,
    poll: PollPolicy,
    state: CaptureState,
    samples: Arc<[u8]>,
}

impl<T: Transport> CaptureController<T> {
    pub fn new(link: SerialLink<T>) -> Self {
        Self::with_poll_policy(link, PollPolicy::default())
    }

    pub fn with_poll_policy(link: SerialLink<T>, poll: PollPolicy) -> Self {
        Self {
            link: Some(link),
            config: CaptureConfig::default(),
            poll,
            state: CaptureState::Idle,
            samples: Arc::from(Vec::<u8>::new()),
        }
    }

    /// A controller with no transport; every operation reports
    /// [`CommError::NotConnected`] until [`attach`](Self::attach) is called.
    pub fn disconnected() -> Self {
        Self {
            link: None,
            config: CaptureConfig::default(),
            poll: PollPolicy::default(),
            state: CaptureState::Idle,
            samples: Arc::from(Vec::<u8>::new()),
        }
    }

    pub fn attach(&mut self, link: SerialLink<T>) {
        self.link = Some(link);
    }

    pub fn detach(&mut self) -> Option<SerialLink<T>> {
        self.link.take()
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Snapshot of the last successful capture. Empty until one completes.
    pub fn samples(&self) -> Arc<[u8]> {
        Arc::clone(&self.samples)
    }

    fn link(&mut self) -> Result<&mut SerialLink<T>, CommError> {
        self.link.as_mut().ok_or(CommError::NotConnected)
    }

    fn exchange(&mut self, cmd: &Command) -> Result<ResponseBatch, CommError> {
        self.link()?.exchange(cmd)
    }

    /// Set the timer divisors and remember them for rate display.
    pub fn set_sample_rate(&mut self, psc: u16, arr: u16) -> Result<(), CommError> {
        self.exchange(&Command::Rate { psc, arr })?;
        self.config.psc = psc;
        self.config.arr = arr;
        Ok(())
    }

    pub fn set_sample_count(&mut self, count: u16) -> Result<(), CommError> {
        self.exchange(&Command::Count(count))?;
        self.config.sample_count = count;
        Ok(())
    }

    /// Arm the trigger on channel `pin` (0-7).
    pub fn set_trigger(&mut self, pin: u8, edge: Edge) -> Result<(), CaptureError> {
        if pin > 7 {
            return Err(CaptureError::MalformedResponse(format!(
                "trigger pin {} out of range 0-7",
                pin
            )));
        }
        self.exchange(&Command::Trig { pin, edge })?;
        self.config.trigger = Some(Trigger { pin, edge });
        Ok(())
    }

    pub fn disable_trigger(&mut self) -> Result<(), CommError> {
        self.exchange(&Command::NoTrig)?;
        self.config.trigger = None;
        Ok(())
    }

    /// Firmware usage text, passed through verbatim.
    pub fn help(&mut self) -> Result<ResponseBatch, CommError> {
        self.exchange(&Command::Help)
    }

    /// Issue CAP and enter the polling phase.
    ///
    /// Rejected with [`CaptureError::Busy`] while a capture is in flight;
    /// the sample buffer is left untouched in that case.
    pub fn begin_capture(&mut self) -> Result<(), CaptureError> {
        if self.state.is_busy() {
            return Err(CaptureError::Busy);
        }
        self.state = CaptureState::Arming;
        match self.exchange(&Command::Cap) {
            Ok(_) => {
                self.state = CaptureState::Polling;
                Ok(())
            }
            Err(e) => {
                self.state = CaptureState::Failed;
                Err(e.into())
            }
        }
    }

    /// Poll STATUS until the firmware reports READY or the attempt cap is
    /// exhausted. Returns whether READY was seen; exhaustion is not an
    /// error; a slow device still gets a best-effort fetch.
    pub fn await_ready(&mut self) -> Result<bool, CaptureError> {
        thread::sleep(self.poll.settle);

        for attempt in 0..self.poll.max_attempts {
            match self.exchange(&Command::Status) {
                Ok(batch) => {
                    if batch.contains_token(READY_TOKEN) {
                        return Ok(true);
                    }
                }
                Err(e) => {
                    self.state = CaptureState::Failed;
                    return Err(e.into());
                }
            }
            if attempt + 1 < self.poll.max_attempts {
                thread::sleep(self.poll.interval);
            }
        }

        log::warn!(
            "device not READY after {} STATUS attempts, fetching anyway",
            self.poll.max_attempts
        );
        Ok(false)
    }

    /// Issue SEND, decode the payload, and publish the new buffer.
    pub fn fetch(&mut self) -> Result<Arc<[u8]>, CaptureError> {
        self.state = CaptureState::Fetching;

        let batch = match self.exchange(&Command::Send) {
            Ok(batch) => batch,
            Err(e) => {
                self.state = CaptureState::Failed;
                return Err(e.into());
            }
        };

        // A live device always answers SEND with at least its sentinel;
        // total silence means the exchange failed, not that zero samples
        // were captured.
        if batch.is_empty() {
            self.state = CaptureState::Failed;
            return Err(CaptureError::MalformedResponse(
                "no response to SEND".to_string(),
            ));
        }

        let sentinel = self.link()?.options().sentinel.clone();
        let samples = decoder::decode(&batch, &sentinel);
        if samples.len() != usize::from(self.config.sample_count) {
            log::warn!(
                "received {} samples, requested {}",
                samples.len(),
                self.config.sample_count
            );
        }

        self.samples = Arc::from(samples);
        self.state = CaptureState::Done;
        Ok(Arc::clone(&self.samples))
    }

    /// Full capture sequence: arm, wait for readiness, fetch.
    pub fn run_capture(&mut self) -> Result<Arc<[u8]>, CaptureError> {
        self.begin_capture()?;
        self.await_ready()?;
        self.fetch()
    }
}
