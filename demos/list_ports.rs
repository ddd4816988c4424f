// Port discovery example
//
// Lists the serial ports a logic analyzer could be attached to.

use octoprobe_rs::AnalyzerConnector;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let ports = AnalyzerConnector::available_ports()?;
    if ports.is_empty() {
        println!("No serial ports found. Connect the analyzer and try again.");
        return Ok(());
    }

    println!("Found {} port(s):", ports.len());
    for (i, port) in ports.iter().enumerate() {
        println!("  {}. {} ({})", i + 1, port.port, port.description);
    }

    Ok(())
}
