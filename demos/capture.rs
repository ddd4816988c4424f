// End-to-end capture example
//
// Configures the analyzer, runs a capture on a worker thread so the main
// thread stays free, and prints the waveforms as ASCII art.

use clap::Parser;
use octoprobe_rs::{
    format_sample_rate, sample_rate_hz, AnalyzerConnector, CaptureController, Edge, Level,
    WaveformViewport,
};
use std::thread;

#[derive(Parser)]
#[command(about = "Capture 8 channels from a serial logic analyzer")]
struct Args {
    /// Serial port, e.g. /dev/ttyUSB0 (first USB port if omitted)
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate
    #[arg(short, long)]
    baud: Option<u32>,

    /// Timer prescaler (PSC)
    #[arg(long, default_value_t = 71)]
    psc: u16,

    /// Timer reload value (ARR)
    #[arg(long, default_value_t = 9)]
    arr: u16,

    /// Number of samples to capture
    #[arg(short, long, default_value_t = 1024)]
    count: u16,

    /// Trigger channel (0-7); capture is free-running if omitted
    #[arg(short, long)]
    trigger: Option<u8>,

    /// Trigger on the falling edge instead of the rising edge
    #[arg(long)]
    falling: bool,

    /// Width of the ASCII waveform display, in columns
    #[arg(short, long, default_value_t = 72)]
    width: usize,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let link = AnalyzerConnector::connect(args.port.as_deref(), args.baud)?;
    let mut analyzer = CaptureController::new(link);

    analyzer.set_sample_rate(args.psc, args.arr)?;
    analyzer.set_sample_count(args.count)?;
    match args.trigger {
        Some(pin) => {
            let edge = if args.falling { Edge::Falling } else { Edge::Rising };
            analyzer.set_trigger(pin, edge)?;
        }
        None => analyzer.disable_trigger()?,
    }

    println!(
        "Capturing {} samples at {}...",
        args.count,
        format_sample_rate(sample_rate_hz(args.psc, args.arr))
    );

    // The capture blocks on serial reads and the readiness poll, so it runs
    // on its own thread. A UI would keep handling input here.
    let worker = thread::spawn(move || {
        let result = analyzer.run_capture();
        (analyzer, result)
    });
    let (_analyzer, result) = worker.join().unwrap_or_else(|_| std::process::exit(1));
    let samples = result?;

    println!("Captured {} samples.\n", samples.len());

    let viewport = WaveformViewport::new();
    for trace in viewport.render(&samples, args.width as f64) {
        let mut row = vec![' '; args.width];
        for pair in trace.points.windows(2) {
            fill(&mut row, pair[0].x, pair[1].x, pair[0].level);
        }
        if let Some(last) = trace.points.last() {
            fill(&mut row, last.x, args.width as f64, last.level);
        }
        println!("CH{} |{}|", trace.channel, row.iter().collect::<String>());
    }

    Ok(())
}

fn fill(row: &mut [char], from: f64, to: f64, level: Level) {
    let glyph = match level {
        Level::High => '▔',
        Level::Low => '▁',
    };
    let from = from.floor() as usize;
    let to = (to.ceil() as usize).min(row.len());
    for cell in row.iter_mut().take(to).skip(from) {
        *cell = glyph;
    }
}
