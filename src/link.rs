use serialport::SerialPort;
use std::fmt;
use std::io::{self, Read, Write};
use std::time::Duration;

/// Default response terminator sent by the analyzer firmware.
pub const DEFAULT_SENTINEL: &str = "END";

/// Default per-read timeout. Matches the firmware's worst-case line gap
/// at 115200 baud with plenty of slack.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Trigger edge polarity, wire-encoded as `1` (rising) / `0` (falling).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Falling,
    Rising,
}

impl Edge {
    pub fn to_wire(self) -> u8 {
        match self {
            Edge::Falling => 0,
            Edge::Rising => 1,
        }
    }
}

/// One command of the analyzer's ASCII protocol.
///
/// `Display` produces the exact wire form without the trailing newline;
/// [`SerialLink::exchange`] appends the newline itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `RATE <psc> <arr>` - set the sample-interval divisors.
    Rate { psc: u16, arr: u16 },
    /// `COUNT <n>` - set the requested sample count.
    Count(u16),
    /// `TRIG <pin> <edge>` - arm the trigger on channel `pin`.
    Trig { pin: u8, edge: Edge },
    /// `NOTRIG` - disable the trigger.
    NoTrig,
    /// `CAP` - start a capture.
    Cap,
    /// `STATUS` - poll the capture state.
    Status,
    /// `SEND` - fetch the captured samples.
    Send,
    /// `HELP` - request the firmware's usage text.
    Help,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Rate { psc, arr } => write!(f, "RATE {} {}", psc, arr),
            Command::Count(n) => write!(f, "COUNT {}", n),
            Command::Trig { pin, edge } => write!(f, "TRIG {} {}", pin, edge.to_wire()),
            Command::NoTrig => write!(f, "NOTRIG"),
            Command::Cap => write!(f, "CAP"),
            Command::Status => write!(f, "STATUS"),
            Command::Send => write!(f, "SEND"),
            Command::Help => write!(f, "HELP"),
        }
    }
}

/// The lines collected for one command, sentinel included when it was seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseBatch {
    lines: Vec<String>,
}

impl ResponseBatch {
    pub fn new(lines: Vec<String>) -> Self {
        Self { lines }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// True if any line contains `token` as a substring.
    pub fn contains_token(&self, token: &str) -> bool {
        self.lines.iter().any(|l| l.contains(token))
    }
}

impl IntoIterator for ResponseBatch {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.into_iter()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CommError {
    #[error("no transport is open")]
    NotConnected,

    #[error("transport failure: {0}")]
    TransportFailure(String),
}

impl From<io::Error> for CommError {
    fn from(e: io::Error) -> Self {
        CommError::TransportFailure(e.to_string())
    }
}

/// Duplex byte stream with a bounded read timeout.
///
/// A read that times out must surface `io::ErrorKind::TimedOut` (or
/// `WouldBlock`); the link treats that as "no more data", not a failure.
pub trait Transport: Read + Write {
    /// Drop any bytes received but not yet read.
    fn discard_input(&mut self) -> io::Result<()>;
}

impl Transport for Box<dyn SerialPort> {
    fn discard_input(&mut self) -> io::Result<()> {
        self.clear(serialport::ClearBuffer::Input)
            .map_err(|e| io::Error::other(e.to_string()))
    }
}

/// Line-collection options. Both values are device-contract details, so
/// they are configuration rather than constants baked into the link.
#[derive(Debug, Clone)]
pub struct LinkOptions {
    pub read_timeout: Duration,
    pub sentinel: String,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
            sentinel: DEFAULT_SENTINEL.to_string(),
        }
    }
}

/// Request/response client over a line-oriented serial channel.
///
/// One exchange at a time; `&mut self` rules out pipelining.
#[derive(Debug)]
pub struct SerialLink<T> {
    transport: T,
    options: LinkOptions,
}

impl<T: Transport> SerialLink<T> {
    pub fn new(transport: T) -> Self {
        Self::with_options(transport, LinkOptions::default())
    }

    pub fn with_options(transport: T, options: LinkOptions) -> Self {
        Self { transport, options }
    }

    pub fn options(&self) -> &LinkOptions {
        &self.options
    }

    /// Give the transport back, e.g. to close or re-configure the port.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Write `cmd` and collect response lines until the sentinel, a blank
    /// line, or a read timeout.
    ///
    /// A sentinel-less or even empty batch is a valid (degenerate) result;
    /// only I/O failures are errors.
    pub fn exchange(&mut self, cmd: &Command) -> Result<ResponseBatch, CommError> {
        self.transport.discard_input()?;

        let framed = format!("{}\n", cmd);
        self.transport.write_all(framed.as_bytes())?;
        log::debug!("sent: {}", cmd);

        let mut lines = Vec::new();
        loop {
            match self.read_line()? {
                Some(line) => {
                    log::debug!("recv: {}", line);
                    if line.is_empty() {
                        break;
                    }
                    let is_sentinel = line == self.options.sentinel;
                    lines.push(line);
                    if is_sentinel {
                        break;
                    }
                }
                None => break,
            }
        }

        Ok(ResponseBatch::new(lines))
    }

    /// Read one newline-terminated line, stripping CR. `None` means the
    /// transport timed out with nothing pending.
    fn read_line(&mut self) -> Result<Option<String>, CommError> {
        let mut buf = Vec::new();
        loop {
            let mut byte = [0u8; 1];
            match self.transport.read(&mut byte) {
                Ok(0) => {
                    // End of stream behaves like a timeout with no data.
                    return Ok(finish_line(buf));
                }
                Ok(_) => {
                    match byte[0] {
                        b'\n' => return Ok(Some(decode_line(buf))),
                        b'\r' => {}
                        b => buf.push(b),
                    }
                }
                Err(e) if timed_out(&e) => {
                    return Ok(finish_line(buf));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn timed_out(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
}

fn finish_line(buf: Vec<u8>) -> Option<String> {
    if buf.is_empty() {
        None
    } else {
        // Partial line with no terminator; keep what arrived.
        Some(decode_line(buf))
    }
}

fn decode_line(buf: Vec<u8>) -> String {
    String::from_utf8_lossy(&buf).into_owned()
}


#[cfg(test)]
mod tests {
    use super::mock::MockTransport;
    use super::*;

    #[test]
    fn commands_have_exact_wire_form() {
        assert_eq!(Command::Rate { psc: 71, arr: 9 }.to_string(), "RATE 71 9");
        assert_eq!(Command::Count(1024).to_string(), "COUNT 1024");
        assert_eq!(
            Command::Trig { pin: 3, edge: Edge::Rising }.to_string(),
            "TRIG 3 1"
        );
        assert_eq!(
            Command::Trig { pin: 0, edge: Edge::Falling }.to_string(),
            "TRIG 0 0"
        );
        assert_eq!(Command::NoTrig.to_string(), "NOTRIG");
        assert_eq!(Command::Cap.to_string(), "CAP");
        assert_eq!(Command::Status.to_string(), "STATUS");
        assert_eq!(Command::Send.to_string(), "SEND");
        assert_eq!(Command::Help.to_string(), "HELP");
    }

    #[test]
    fn exchange_collects_until_sentinel() {
        let mut transport = MockTransport::new();
        transport.script_lines(&["OK: COUNT=1024", "END", "late noise"]);

        let mut link = SerialLink::new(transport);
        let batch = link.exchange(&Command::Count(1024)).unwrap();

        assert_eq!(batch.lines(), &["OK: COUNT=1024", "END"]);
    }

    #[test]
    fn exchange_frames_command_with_newline() {
        let mut transport = MockTransport::new();
        transport.script_lines(&["END"]);

        let mut link = SerialLink::new(transport);
        link.exchange(&Command::Status).unwrap();

        assert_eq!(link.transport.sent, vec!["STATUS".to_string()]);
    }

    #[test]
    fn blank_line_ends_batch_early() {
        let mut transport = MockTransport::new();
        transport.script_raw(b"first\r\n\r\nnever read\r\n");

        let mut link = SerialLink::new(transport);
        let batch = link.exchange(&Command::Help).unwrap();

        assert_eq!(batch.lines(), &["first"]);
    }

    #[test]
    fn timeout_with_no_lines_is_an_empty_batch() {
        let transport = MockTransport::new();

        let mut link = SerialLink::new(transport);
        let batch = link.exchange(&Command::Status).unwrap();

        assert!(batch.is_empty());
    }

    #[test]
    fn partial_unterminated_line_is_kept() {
        let mut transport = MockTransport::new();
        transport.script_raw(b"OK: CAPTURING...\r\nDATA:0F");

        let mut link = SerialLink::new(transport);
        let batch = link.exchange(&Command::Send).unwrap();

        assert_eq!(batch.lines(), &["OK: CAPTURING...", "DATA:0F"]);
    }

    #[test]
    fn write_failure_surfaces_as_transport_failure() {
        let mut transport = MockTransport::new();
        transport.fail_next_write = true;

        let mut link = SerialLink::new(transport);
        let err = link.exchange(&Command::Cap).unwrap_err();

        assert!(matches!(err, CommError::TransportFailure(_)));
    }

    #[test]
    fn custom_sentinel_is_honored() {
        let mut transport = MockTransport::new();
        transport.script_lines(&["value", "DONE", "unread"]);

        let options = LinkOptions {
            sentinel: "DONE".to_string(),
            ..LinkOptions::default()
        };
        let mut link = SerialLink::with_options(transport, options);
        let batch = link.exchange(&Command::Status).unwrap();

        assert_eq!(batch.lines(), &["value", "DONE"]);
    }

    #[test]
    fn contains_token_matches_substrings() {
        let batch = ResponseBatch::new(vec!["STATUS: READY".to_string(), "END".to_string()]);
        assert!(batch.contains_token("READY"));
        assert!(!batch.contains_token("CAPTURING"));
    }
}
