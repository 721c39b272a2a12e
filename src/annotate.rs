use crate::detection::Detection;
use opencv::{
    core::{self, Mat, Point, Rect, Scalar, Vector},
    imgproc,
    prelude::*,
};

/// How each detection is marked on the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum AnnotationStyle {
    /// Filled triangle pointing at the top center of the box.
    #[default]
    Triangle,
    /// Outline of the bounding box.
    Box,
}

// BGR, one entry per class id (wrapping).
const PALETTE: [(f64, f64, f64); 6] = [
    (251.0, 81.0, 163.0),
    (75.0, 25.0, 230.0),
    (48.0, 130.0, 245.0),
    (75.0, 180.0, 60.0),
    (200.0, 130.0, 0.0),
    (180.0, 30.0, 145.0),
];

const TRIANGLE_BASE: i32 = 10;
const TRIANGLE_HEIGHT: i32 = 10;
const BOX_THICKNESS: i32 = 2;
const FONT: i32 = imgproc::FONT_HERSHEY_SIMPLEX;
const FONT_SCALE: f64 = 0.5;
const TEXT_THICKNESS: i32 = 1;
const TEXT_PADDING: i32 = 4;

fn class_color(class_id: usize) -> Scalar {
    let (b, g, r) = PALETTE[class_id % PALETTE.len()];
    Scalar::new(b, g, r, 0.0)
}

/// Draws markers and labels onto frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct Annotator {
    style: AnnotationStyle,
}

impl Annotator {
    pub fn new(style: AnnotationStyle) -> Self {
        Self { style }
    }

    /// Returns a copy of `scene` with one marker per detection, labelled with
    /// the label at the same index.
    pub fn annotate(
        &self,
        scene: &Mat,
        detections: &[Detection],
        labels: &[String],
    ) -> opencv::Result<Mat> {
        let mut canvas = scene.try_clone()?;
        for (index, det) in detections.iter().enumerate() {
            let color = class_color(det.class_id);
            let label_anchor = match self.style {
                AnnotationStyle::Triangle => draw_triangle(&mut canvas, det, color)?,
                AnnotationStyle::Box => draw_box(&mut canvas, det, color)?,
            };
            if let Some(label) = labels.get(index) {
                draw_label(&mut canvas, label, label_anchor, color)?;
            }
        }
        Ok(canvas)
    }
}

/// Fills a downward triangle whose tip touches the top center of the box.
/// Returns the point the label sits on.
fn draw_triangle(canvas: &mut Mat, det: &Detection, color: Scalar) -> opencv::Result<Point> {
    let tip_x = ((det.bbox[0] + det.bbox[2]) / 2.0).round() as i32;
    let tip_y = det.bbox[1].round() as i32;
    let top = tip_y - TRIANGLE_HEIGHT;
    let points = Vector::<Point>::from_iter([
        Point::new(tip_x - TRIANGLE_BASE / 2, top),
        Point::new(tip_x + TRIANGLE_BASE / 2, top),
        Point::new(tip_x, tip_y),
    ]);
    let polygons = Vector::<Vector<Point>>::from_iter([points]);
    imgproc::fill_poly(
        canvas,
        &polygons,
        color,
        imgproc::LINE_AA,
        0,
        Point::default(),
    )?;
    Ok(Point::new(tip_x - TRIANGLE_BASE / 2, top))
}

fn draw_box(canvas: &mut Mat, det: &Detection, color: Scalar) -> opencv::Result<Point> {
    let x = det.bbox[0].round() as i32;
    let y = det.bbox[1].round() as i32;
    let rect = Rect::new(
        x,
        y,
        ((det.bbox[2] - det.bbox[0]).round() as i32).max(1),
        ((det.bbox[3] - det.bbox[1]).round() as i32).max(1),
    );
    imgproc::rectangle(canvas, rect, color, BOX_THICKNESS, imgproc::LINE_8, 0)?;
    Ok(Point::new(x, y))
}

/// Draws `text` on a filled background whose bottom-left corner is `anchor`,
/// pushed down into the frame when it would start above the top edge.
fn draw_label(canvas: &mut Mat, text: &str, anchor: Point, color: Scalar) -> opencv::Result<()> {
    let mut baseline = 0;
    let size = imgproc::get_text_size(text, FONT, FONT_SCALE, TEXT_THICKNESS, &mut baseline)?;
    let width = size.width + 2 * TEXT_PADDING;
    let height = size.height + baseline + 2 * TEXT_PADDING;
    let left = anchor.x.max(0);
    let top = (anchor.y - height).max(0);

    imgproc::rectangle(
        canvas,
        Rect::new(left, top, width, height),
        color,
        imgproc::FILLED,
        imgproc::LINE_8,
        0,
    )?;
    imgproc::put_text(
        canvas,
        text,
        Point::new(left + TEXT_PADDING, top + TEXT_PADDING + size.height),
        FONT,
        FONT_SCALE,
        Scalar::all(255.0),
        TEXT_THICKNESS,
        imgproc::LINE_AA,
        false,
    )
}

/// Converts a BGR frame to a packed RGB bitmap for display.
pub fn to_rgb_bitmap(frame: &Mat) -> opencv::Result<image::RgbImage> {
    let mut rgb = Mat::default();
    imgproc::cvt_color(
        frame,
        &mut rgb,
        imgproc::COLOR_BGR2RGB,
        0,
        core::AlgorithmHint::ALGO_HINT_DEFAULT,
    )?;
    let width = rgb.cols() as u32;
    let height = rgb.rows() as u32;
    let data = rgb.data_bytes()?.to_vec();
    image::RgbImage::from_raw(width, height, data).ok_or_else(|| {
        opencv::Error::new(
            core::StsBadSize,
            format!("RGB buffer does not match {width}x{height}"),
        )
    })
}
