/// Number of logical channels; one per bit of a sample.
pub const CHANNEL_COUNT: usize = 8;

pub const MIN_ZOOM: f64 = 0.1;
pub const MAX_ZOOM: f64 = 100.0;

/// Logic level of one channel at one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl Level {
    fn from_bit(sample: u8, channel: usize) -> Self {
        if (sample >> channel) & 1 == 1 {
            Level::High
        } else {
            Level::Low
        }
    }
}

/// A level change (or the window start): the trace holds `level` from `x`
/// until the next point's `x`, with a vertical edge at each transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TracePoint {
    pub x: f64,
    pub level: Level,
}

/// The transition points of one channel across the visible window.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelTrace {
    pub channel: u8,
    pub points: Vec<TracePoint>,
}

/// Zoom/offset state mapping a sample window onto a drawing width.
///
/// Zoom and offset are clamped on every mutation, so the viewport can
/// never be driven into an invalid window. Nothing is cached: the x
/// mapping is recomputed per [`render`](Self::render) call, which keeps
/// resizes trivially correct.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformViewport {
    zoom: f64,
    offset: f64,
}

impl Default for WaveformViewport {
    fn default() -> Self {
        Self::new()
    }
}

impl WaveformViewport {
    pub fn new() -> Self {
        Self {
            zoom: 1.0,
            offset: 0.0,
        }
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
    }

    /// Multiply the zoom factor, e.g. 1.5 to zoom in, 0.67 to zoom out.
    pub fn zoom_by(&mut self, factor: f64) {
        self.set_zoom(self.zoom * factor);
    }

    /// Back to 1:1 magnification. Offset is deliberately left alone so the
    /// user keeps their place in the capture.
    pub fn reset_zoom(&mut self) {
        self.zoom = 1.0;
    }

    pub fn set_offset(&mut self, offset: f64) {
        self.offset = offset.clamp(0.0, 1.0);
    }

    /// Pan by a fraction of the scroll range.
    pub fn scroll_by(&mut self, delta: f64) {
        self.set_offset(self.offset + delta);
    }

    /// The visible `[start, end)` sample index window for a buffer of
    /// `len` samples. At zoom 1 the whole buffer is visible regardless of
    /// offset; `start == end` only for an empty or degenerate window.
    pub fn visible_range(&self, len: usize) -> (usize, usize) {
        let visible = (len as f64 / self.zoom).floor() as usize;
        if visible >= len {
            return (0, len);
        }
        let start = (self.offset * (len - visible) as f64).floor() as usize;
        let end = usize::min(start + visible, len);
        (start, end)
    }

    /// Map the visible window onto `width` drawing units, one trace per
    /// channel. Consecutive equal levels collapse into the preceding
    /// point; a transition emits a new point at its x-coordinate.
    pub fn render(&self, samples: &[u8], width: f64) -> Vec<ChannelTrace> {
        let (start, end) = self.visible_range(samples.len());
        if end <= start {
            return Vec::new();
        }

        let x_scale = width / (end - start) as f64;

        (0..CHANNEL_COUNT)
            .map(|ch| {
                let mut points = Vec::new();
                let mut prev = None;
                for i in start..end {
                    let level = Level::from_bit(samples[i], ch);
                    if prev != Some(level) {
                        points.push(TracePoint {
                            x: (i - start) as f64 * x_scale,
                            level,
                        });
                        prev = Some(level);
                    }
                }
                ChannelTrace {
                    channel: ch as u8,
                    points,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoom_one_shows_everything_regardless_of_offset() {
        let mut vp = WaveformViewport::new();
        for offset in [0.0, 0.3, 1.0] {
            vp.set_offset(offset);
            assert_eq!(vp.visible_range(1000), (0, 1000));
        }
    }

    #[test]
    fn zoom_two_centered_shows_middle_half() {
        let mut vp = WaveformViewport::new();
        vp.set_zoom(2.0);
        vp.set_offset(0.5);
        assert_eq!(vp.visible_range(1000), (250, 750));
    }

    #[test]
    fn empty_buffer_has_empty_window_and_no_traces() {
        let vp = WaveformViewport::new();
        assert_eq!(vp.visible_range(0), (0, 0));
        assert!(vp.render(&[], 800.0).is_empty());
    }

    #[test]
    fn window_bounds_stay_inside_buffer_at_extremes() {
        let mut vp = WaveformViewport::new();
        vp.set_zoom(3.0);
        vp.set_offset(1.0);
        let (start, end) = vp.visible_range(1000);
        assert!(start <= end);
        assert_eq!(end, 1000);
        assert_eq!(end - start, 333);
    }

    #[test]
    fn zoom_and_offset_are_clamped() {
        let mut vp = WaveformViewport::new();
        vp.set_zoom(1e6);
        assert_eq!(vp.zoom(), MAX_ZOOM);
        vp.set_zoom(0.0);
        assert_eq!(vp.zoom(), MIN_ZOOM);
        vp.set_offset(-2.0);
        assert_eq!(vp.offset(), 0.0);
        vp.scroll_by(5.0);
        assert_eq!(vp.offset(), 1.0);
    }

    #[test]
    fn reset_zoom_leaves_offset_untouched() {
        let mut vp = WaveformViewport::new();
        vp.set_zoom(4.0);
        vp.set_offset(0.75);
        vp.reset_zoom();
        assert_eq!(vp.zoom(), 1.0);
        assert_eq!(vp.offset(), 0.75);
    }

    #[test]
    fn single_high_sample_renders_channel_0_high() {
        let vp = WaveformViewport::new();
        let traces = vp.render(&[0x0F], 800.0);
        assert_eq!(traces.len(), CHANNEL_COUNT);
        assert_eq!(
            traces[0].points,
            vec![TracePoint { x: 0.0, level: Level::High }]
        );
        // Bit 7 of 0x0F is clear.
        assert_eq!(
            traces[7].points,
            vec![TracePoint { x: 0.0, level: Level::Low }]
        );
    }

    #[test]
    fn equal_levels_collapse_and_transitions_emit_points() {
        // Channel 0: low low high high low.
        let samples = [0x00, 0x00, 0x01, 0x01, 0x00];
        let vp = WaveformViewport::new();
        let traces = vp.render(&samples, 100.0);

        assert_eq!(
            traces[0].points,
            vec![
                TracePoint { x: 0.0, level: Level::Low },
                TracePoint { x: 40.0, level: Level::High },
                TracePoint { x: 80.0, level: Level::Low },
            ]
        );
        // Channel 1 never changes: a single point.
        assert_eq!(
            traces[1].points,
            vec![TracePoint { x: 0.0, level: Level::Low }]
        );
    }

    #[test]
    fn render_spans_the_drawing_width_exactly() {
        let samples: Vec<u8> = (0..10).map(|i| (i % 2) as u8).collect();
        let vp = WaveformViewport::new();
        let traces = vp.render(&samples, 500.0);

        // Alternating channel-0 bit: a transition at every sample.
        let xs: Vec<f64> = traces[0].points.iter().map(|p| p.x).collect();
        assert_eq!(xs.len(), 10);
        assert_eq!(xs[0], 0.0);
        assert_eq!(xs[9], 450.0);
        assert_eq!(xs[1] - xs[0], 50.0);
    }

    #[test]
    fn render_respects_the_visible_window() {
        // 8 samples, channel 0 high only in the second half.
        let samples = [0, 0, 0, 0, 1, 1, 1, 1];
        let mut vp = WaveformViewport::new();
        vp.set_zoom(2.0);
        vp.set_offset(1.0);

        assert_eq!(vp.visible_range(samples.len()), (4, 8));
        let traces = vp.render(&samples, 400.0);
        assert_eq!(
            traces[0].points,
            vec![TracePoint { x: 0.0, level: Level::High }]
        );
    }
}
