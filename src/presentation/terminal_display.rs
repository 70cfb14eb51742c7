// Terminal display - Live metrics block and speed plot
use crate::application::snapshot_consumer::SnapshotConsumer;
use crate::domain::metrics::MetricsSnapshot;
use async_trait::async_trait;
use std::fmt::Write as _;
use std::io::Write as _;

const BRIGHT_RED: &str = "\x1b[91m";
const GREY: &str = "\x1b[90m";
const RESET: &str = "\x1b[0m";
const CLEAR_SCREEN: &str = "\x1b[H\x1b[J";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlotLayout {
    pub width: usize,
    /// km/h at the top of the plot
    pub max_speed: u32,
    /// km/h per row
    pub speed_interval: u32,
}

impl PlotLayout {
    pub fn height(&self) -> usize {
        (self.max_speed / self.speed_interval.max(1)) as usize
    }

    /// Row index for a speed, 0 being the top row
    fn row_for(&self, speed_kmh: f64) -> usize {
        let height = self.height();
        let band = (speed_kmh.max(0.0) / f64::from(self.speed_interval.max(1))).floor() as usize;
        height - 1 - band.min(height - 1)
    }
}

/// HH:MM:SS
pub fn format_time(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

pub fn render_metrics(snapshot: &MetricsSnapshot) -> String {
    let rows = [
        ("Active Time:          ", format_time(snapshot.active_time_s)),
        ("Cadence:       ", format!("{:6.1} RPM", snapshot.live_rpm)),
        ("Speed:         ", format!("{:6.1} km/h", snapshot.live_speed_kmh)),
        ("30s Avg Speed: ", format!("{:6.1} km/h", snapshot.interval_speed_kmh)),
        ("Total Avg Speed:", format!("{:6.1} km/h", snapshot.average_speed_kmh)),
        ("Distance:      ", format!("{:7.2} km", snapshot.total_distance_km)),
    ];

    let mut out = String::new();
    for (label, value) in rows {
        let _ = writeln!(out, "{}{}{}{}", label, BRIGHT_RED, value, RESET);
    }
    out.push('\n');
    out
}

/// Live speeds as red stars, interval averages as grey bars drawn over them
pub fn render_plot(snapshot: &MetricsSnapshot, layout: PlotLayout) -> String {
    let width = layout.width;
    let height = layout.height();
    let mut out = String::new();
    if height == 0 || width == 0 {
        return out;
    }

    let mut grid = vec![vec![" "; width]; height];
    let recent = |len: usize| len.saturating_sub(width);

    let live = &snapshot.live_speed_history;
    for (x, speed) in live[recent(live.len())..].iter().enumerate() {
        grid[layout.row_for(*speed)][x] = "\x1b[91m*\x1b[0m";
    }

    let intervals = &snapshot.interval_history;
    for (x, record) in intervals[recent(intervals.len())..].iter().enumerate() {
        for row in grid.iter_mut().skip(layout.row_for(record.avg_speed_kmh)) {
            row[x] = "\x1b[90m█\x1b[0m";
        }
    }

    let _ = writeln!(out, "Speed (km/h)");
    for (row, cells) in grid.iter().enumerate() {
        let label = u64::from(layout.speed_interval) * (height - 1 - row) as u64;
        let _ = writeln!(out, "{:>4} |{}", label, cells.concat());
    }
    let _ = writeln!(out, "     +{}", "-".repeat(width.saturating_sub(5)));
    let title = format!(
        "Time ({}red: 1s{}, {}grey: 30s{})",
        BRIGHT_RED, RESET, GREY, RESET
    );
    let _ = writeln!(out, "{:^width$}", title, width = width);
    out
}

pub struct TerminalDisplay {
    layout: PlotLayout,
}

impl TerminalDisplay {
    pub fn new(layout: PlotLayout) -> Self {
        Self { layout }
    }

    pub fn render(&self, snapshot: &MetricsSnapshot) -> String {
        let mut frame = String::from(CLEAR_SCREEN);
        frame.push_str(&render_metrics(snapshot));
        frame.push_str(&render_plot(snapshot, self.layout));
        frame
    }
}

#[async_trait]
impl SnapshotConsumer for TerminalDisplay {
    fn name(&self) -> &'static str {
        "terminal-display"
    }

    async fn consume(&mut self, snapshot: &MetricsSnapshot) -> anyhow::Result<()> {
        let frame = self.render(snapshot);
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(frame.as_bytes())?;
        stdout.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metrics::IntervalRecord;

    fn layout() -> PlotLayout {
        PlotLayout {
            width: 10,
            max_speed: 30,
            speed_interval: 10,
        }
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "00:00:00");
        assert_eq!(format_time(3725.9), "01:02:05");
    }

    #[test]
    fn test_render_metrics_block() {
        let snapshot = MetricsSnapshot {
            live_rpm: 85.0,
            live_speed_kmh: 31.25,
            total_distance_km: 12.345,
            active_time_s: 61.0,
            ..Default::default()
        };
        let text = render_metrics(&snapshot);

        assert!(text.contains("00:01:01"));
        assert!(text.contains("  85.0 RPM"));
        assert!(text.contains("  31.2 km/h") || text.contains("  31.3 km/h"));
        assert!(text.contains("  12.35 km") || text.contains("  12.34 km"));
    }

    #[test]
    fn test_render_plot_rows() {
        let snapshot = MetricsSnapshot {
            live_speed_history: vec![5.0, 25.0, 99.0],
            interval_history: vec![IntervalRecord {
                avg_speed_kmh: 15.0,
                distance_km: 0.1,
            }],
            ..Default::default()
        };
        let plot = render_plot(&snapshot, layout());
        let lines: Vec<&str> = plot.lines().collect();

        assert_eq!(lines[0], "Speed (km/h)");
        assert!(lines[1].starts_with("  20 |"));
        assert!(lines[3].starts_with("   0 |"));
        assert_eq!(lines[4], "     +-----");
        // stars at x=1 and x=2 share the top row; the bar owns x=0 from the middle row down
        assert_eq!(lines[1].matches('*').count(), 2);
        assert_eq!(lines[1].matches('█').count(), 0);
        assert_eq!(lines[2].matches('█').count(), 1);
        assert_eq!(lines[3].matches('█').count(), 1);
        assert_eq!(lines[3].matches('*').count(), 0);
    }

    #[test]
    fn test_plot_keeps_most_recent_columns() {
        let snapshot = MetricsSnapshot {
            live_speed_history: (0..25).map(|i| if i < 15 { 0.0 } else { 25.0 }).collect(),
            ..Default::default()
        };
        let plot = render_plot(&snapshot, layout());
        let top = plot.lines().nth(1).unwrap();
        assert_eq!(top.matches('*').count(), 10);
    }
}
