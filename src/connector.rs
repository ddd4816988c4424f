use crate::link::{LinkOptions, SerialLink};
use serialport::{SerialPort, SerialPortType};

/// Baud rate the analyzer firmware runs its UART at.
pub const DEFAULT_BAUD: u32 = 115_200;

#[derive(Debug, Clone)]
pub struct AnalyzerPort {
    pub port: String,
    pub description: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("no serial port found; connect the analyzer or specify the port")]
    NoDeviceFound,
}

pub struct AnalyzerConnector;

impl AnalyzerConnector {
    /// Open `port` (or the first USB serial port found) and wrap it in a
    /// ready-to-use [`SerialLink`].
    pub fn connect(
        port: Option<&str>,
        baud: Option<u32>,
    ) -> Result<SerialLink<Box<dyn SerialPort>>, ConnectorError> {
        Self::connect_with_options(port, baud, LinkOptions::default())
    }

    pub fn connect_with_options(
        port: Option<&str>,
        baud: Option<u32>,
        options: LinkOptions,
    ) -> Result<SerialLink<Box<dyn SerialPort>>, ConnectorError> {
        let port = match port {
            Some(p) => p.to_string(),
            None => Self::first_candidate()?.port,
        };
        let baud = baud.unwrap_or(DEFAULT_BAUD);

        log::debug!("opening {} @ {}bps", port, baud);
        let serial = serialport::new(&port, baud)
            .timeout(options.read_timeout)
            .open()?;

        Ok(SerialLink::with_options(serial, options))
    }

    /// Candidate ports, USB serial adapters first. The firmware has no
    /// identification handshake, so the final word is the user's.
    pub fn available_ports() -> Result<Vec<AnalyzerPort>, ConnectorError> {
        let mut usb = Vec::new();
        let mut other = Vec::new();

        for info in serialport::available_ports()? {
            match info.port_type {
                SerialPortType::UsbPort(usb_info) => usb.push(AnalyzerPort {
                    port: info.port_name,
                    description: usb_info
                        .product
                        .unwrap_or_else(|| "USB serial device".to_string()),
                }),
                _ => other.push(AnalyzerPort {
                    port: info.port_name,
                    description: "serial port".to_string(),
                }),
            }
        }

        usb.extend(other);
        Ok(usb)
    }

    fn first_candidate() -> Result<AnalyzerPort, ConnectorError> {
        Self::available_ports()?
            .into_iter()
            .next()
            .ok_or(ConnectorError::NoDeviceFound)
    }
}
