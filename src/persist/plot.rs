use std::error::Error;
use std::path::Path;

use image::RgbImage;
use log::{debug, warn};
use plotters::prelude::*;

use crate::error::{Result, SegError};
use crate::train::history::{History, Metric};

/// Renders the training history, optionally writing it to disk.
pub trait PlotSink {
    fn plot(&mut self, history: &History, save_name: Option<&Path>) -> Result<()>;
}

/// Two side-by-side line charts titled "Loss" and "miou", each with a
/// legend. Train series are red, validation series blue.
#[derive(Debug, Clone)]
pub struct PngPlotter {
    pub width: u32,
    pub height: u32,
}

impl Default for PngPlotter {
    fn default() -> Self {
        PngPlotter::new(1600, 800)
    }
}

impl PngPlotter {
    pub fn new(width: u32, height: u32) -> Self {
        PngPlotter { width, height }
    }

    /// Draws the chart into an RGB image. When no font can be loaded the
    /// curves are drawn without captions, tick labels or legend.
    pub fn render(&self, history: &History) -> Result<RgbImage> {
        let mut buf = vec![0u8; self.width as usize * self.height as usize * 3];
        if let Err(e) = self.draw(&mut buf, history, true) {
            warn!("history plot drawn without text: {e}");
            self.draw(&mut buf, history, false)
                .map_err(|e| SegError::Plot(e.to_string()))?;
        }
        RgbImage::from_raw(self.width, self.height, buf)
            .ok_or_else(|| SegError::Plot("pixel buffer does not match the image size".into()))
    }

    fn draw(
        &self,
        buf: &mut [u8],
        history: &History,
        labelled: bool,
    ) -> std::result::Result<(), Box<dyn Error>> {
        let root = BitMapBackend::with_buffer(buf, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE)?;

        let panels = [
            ("Loss", [Metric::TrainLoss, Metric::ValidLoss]),
            ("miou", [Metric::TrainMiou, Metric::ValidMiou]),
        ];
        let x_max = history.epochs().saturating_sub(1).max(1) as f64;

        for (area, (title, [train, valid])) in root.split_evenly((1, 2)).iter().zip(panels) {
            let (lo, hi) = value_range(&[history.series(train), history.series(valid)]);

            let mut builder = ChartBuilder::on(area);
            builder.margin(20);
            if labelled {
                builder.caption(title, ("sans-serif", 24)).x_label_area_size(35).y_label_area_size(55);
            }
            let mut chart = builder.build_cartesian_2d(0f64..x_max, lo..hi)?;
            if labelled {
                chart.configure_mesh().x_desc("epoch").draw()?;
            }

            for (metric, color) in [(train, RED), (valid, BLUE)] {
                let points: Vec<(f64, f64)> = history
                    .series(metric)
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| v.is_finite())
                    .map(|(i, &v)| (i as f64, v))
                    .collect();
                let anno = chart.draw_series(LineSeries::new(points, color.stroke_width(2)).point_size(2))?;
                if labelled {
                    anno.label(metric.name().replace('_', " "))
                        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
                }
            }

            if labelled {
                chart
                    .configure_series_labels()
                    .background_style(&WHITE.mix(0.8))
                    .border_style(&BLACK)
                    .draw()?;
            }
        }

        root.present()?;
        Ok(())
    }
}

impl PlotSink for PngPlotter {
    fn plot(&mut self, history: &History, save_name: Option<&Path>) -> Result<()> {
        let img = self.render(history)?;
        if let Some(path) = save_name {
            img.save(path)?;
            debug!("history plot written to {}", path.display());
        }
        Ok(())
    }
}

/// Min/max over every finite value, padded by 5%.
fn value_range(series: &[&[f64]]) -> (f64, f64) {
    let (lo, hi) = series
        .iter()
        .flat_map(|s| s.iter().copied())
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if lo > hi {
        return (0.0, 1.0);
    }
    let pad = ((hi - lo) * 0.05).max(1e-9);
    (lo - pad, hi + pad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::train::epoch_stats::PhaseResult;

    fn history(epochs: usize) -> History {
        let mut h = History::new();
        for e in 0..epochs {
            let v = 1.0 / (e + 1) as f64;
            let p = PhaseResult { loss: v, miou: 1.0 - v, class_iou: [0.0, 0.0], batches: 1, elapsed_ms: 0 };
            h.record(&p, &p);
        }
        h
    }

    fn reddish(img: &RgbImage) -> usize {
        img.pixels().filter(|p| p[0] > 200 && p[1] < 80 && p[2] < 80).count()
    }

    fn bluish(img: &RgbImage) -> usize {
        img.pixels().filter(|p| p[2] > 200 && p[0] < 80 && p[1] < 80).count()
    }

    #[test]
    fn curves_are_drawn_in_both_colors() {
        let plotter = PngPlotter::new(400, 200);
        let mut h = history(5);
        h.valid_loss = vec![0.9, 0.8, 0.7, 0.6, 0.5];
        h.valid_miou = vec![0.1, 0.2, 0.3, 0.4, 0.5];
        let img = plotter.render(&h).unwrap();
        assert_eq!(img.dimensions(), (400, 200));
        assert!(reddish(&img) > 0);
        assert!(bluish(&img) > 0);
    }

    #[test]
    fn single_epoch_still_marks_its_point() {
        let img = PngPlotter::new(300, 150).render(&history(1)).unwrap();
        assert!(reddish(&img) > 0);
    }

    #[test]
    fn empty_history_renders_without_curves() {
        let img = PngPlotter::new(200, 100).render(&History::new()).unwrap();
        assert_eq!(img.dimensions(), (200, 100));
        assert!(img.pixels().any(|p| p[0] == 255 && p[1] == 255 && p[2] == 255));
    }

    #[test]
    fn value_range_pads_and_handles_empty() {
        assert_eq!(value_range(&[&[], &[f64::NAN]]), (0.0, 1.0));
        let (lo, hi) = value_range(&[&[1.0, 3.0], &[2.0]]);
        assert!(lo < 1.0 && hi > 3.0);
    }

    #[test]
    fn saves_png_when_named() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log_epoch_0.png");
        let mut plotter = PngPlotter::new(200, 100);
        plotter.plot(&history(1), Some(&path)).unwrap();
        assert!(path.exists());
        plotter.plot(&history(1), None).unwrap();
    }
}
