// Label placement and collision avoidance on an occupancy bitmap.
// Each label tries its candidate anchors in order and claims the first box
// that lies inside the canvas and does not touch anything drawn so far.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::bitmap::{OccupancyBitmap, Region};
use super::error::{Error, Result};
use super::text::{text_height, text_width};

const DIAGONAL_FACTOR: f64 = std::f64::consts::FRAC_1_SQRT_2;
/// Rows freed below each candidate box when labels are removed.
const REMOVE_TAIL_ROWS: i32 = 3;

/// Candidate position of a label relative to the bounds it annotates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Anchor {
    TopLeft,
    Top,
    TopRight,
    Left,
    Middle,
    Right,
    BottomLeft,
    Bottom,
    BottomRight,
}

impl Anchor {
    pub const ALL: [Anchor; 9] = [
        Anchor::TopLeft,
        Anchor::Top,
        Anchor::TopRight,
        Anchor::Left,
        Anchor::Middle,
        Anchor::Right,
        Anchor::BottomLeft,
        Anchor::Bottom,
        Anchor::BottomRight,
    ];

    /// Horizontal and vertical direction, each in `-1..=1`.
    fn direction(self) -> (i32, i32) {
        match self {
            Anchor::TopLeft => (-1, -1),
            Anchor::Top => (0, -1),
            Anchor::TopRight => (1, -1),
            Anchor::Left => (-1, 0),
            Anchor::Middle => (0, 0),
            Anchor::Right => (1, 0),
            Anchor::BottomLeft => (-1, 1),
            Anchor::Bottom => (0, 1),
            Anchor::BottomRight => (1, 1),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Anchor::TopLeft => "top-left",
            Anchor::Top => "top",
            Anchor::TopRight => "top-right",
            Anchor::Left => "left",
            Anchor::Middle => "middle",
            Anchor::Right => "right",
            Anchor::BottomLeft => "bottom-left",
            Anchor::Bottom => "bottom",
            Anchor::BottomRight => "bottom-right",
        }
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Anchor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Anchor::ALL
            .into_iter()
            .find(|anchor| anchor.as_str() == s)
            .ok_or_else(|| Error::UnknownPosition(s.to_string()))
    }
}

/// SVG `text-anchor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAnchor {
    #[default]
    Start,
    Middle,
    End,
}

impl TextAnchor {
    /// Distance from the left edge of the text box to the anchor point.
    pub fn offset(self, width: f64) -> f64 {
        match self {
            TextAnchor::Start => 0.0,
            TextAnchor::Middle => width / 2.0,
            TextAnchor::End => width,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TextAnchor::Start => "start",
            TextAnchor::Middle => "middle",
            TextAnchor::End => "end",
        }
    }
}

/// Which edge of the text box a label's `y` refers to. `Bottom` is the
/// ordinary text baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Baseline {
    Top,
    Middle,
    #[default]
    Bottom,
}

impl Baseline {
    /// Offset to add to `y` when the text is drawn on its alphabetic baseline.
    pub fn shift(self, text_height: f64) -> f64 {
        match self {
            Baseline::Top => text_height,
            Baseline::Middle => text_height / 3.0,
            Baseline::Bottom => 0.0,
        }
    }
}

/// Six-point bounds: left/centre/right and top/middle/bottom.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkBounds {
    pub x: [f64; 3],
    pub y: [f64; 3],
}

impl MarkBounds {
    pub fn from_rect(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x: [x, x + width / 2.0, x + width],
            y: [y, y + height / 2.0, y + height],
        }
    }
}

/// Selects which part of a label's own text box candidates are measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundsScope {
    #[default]
    Default,
    Centroid,
    Top,
    Middle,
    Bottom,
    Center,
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MarkShape {
    Rect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    Circle {
        cx: f64,
        cy: f64,
        r: f64,
    },
    Line {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
    },
    /// Text box whose `y` is its top edge.
    Text {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        #[serde(default)]
        anchor: TextAnchor,
    },
}

/// Geometry labels must stay clear of. A keyed mark also supplies the
/// bounds for the label sharing its key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvoidMark {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub filled: bool,
    pub shape: MarkShape,
}

impl AvoidMark {
    pub fn new(shape: MarkShape) -> Self {
        Self {
            key: None,
            filled: false,
            shape,
        }
    }

    pub fn rect(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(MarkShape::Rect {
            x,
            y,
            width,
            height,
        })
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn filled(mut self) -> Self {
        self.filled = true;
        self
    }

    pub fn bounds(&self) -> MarkBounds {
        match self.shape {
            MarkShape::Rect {
                x,
                y,
                width,
                height,
            } => MarkBounds::from_rect(x, y, width, height),
            MarkShape::Circle { cx, cy, r } => MarkBounds {
                x: [cx - r, cx, cx + r],
                y: [cy - r, cy, cy + r],
            },
            MarkShape::Line { x1, y1, x2, y2 } => MarkBounds::from_rect(
                x1.min(x2),
                y1.min(y2),
                (x2 - x1).abs(),
                (y2 - y1).abs(),
            ),
            MarkShape::Text {
                x,
                y,
                width,
                height,
                anchor,
            } => MarkBounds::from_rect(x - anchor.offset(width), y, width, height),
        }
    }

    fn rasterize(&self, bitmap: &mut OccupancyBitmap) {
        match self.shape {
            MarkShape::Rect {
                x,
                y,
                width,
                height,
            } => rasterize_box(bitmap, x, y, x + width, y + height, self.filled),
            MarkShape::Text {
                x,
                y,
                width,
                height,
                anchor,
            } => {
                let left = x - anchor.offset(width);
                rasterize_box(bitmap, left, y, left + width, y + height, self.filled);
            }
            MarkShape::Circle { cx, cy, r } => rasterize_circle(bitmap, cx, cy, r, self.filled),
            MarkShape::Line { x1, y1, x2, y2 } => rasterize_line(bitmap, x1, y1, x2, y2),
        }
    }
}

fn pixel(value: f64) -> i64 {
    value.floor() as i64
}

fn rasterize_box(bitmap: &mut OccupancyBitmap, x1: f64, y1: f64, x2: f64, y2: f64, filled: bool) {
    if ![x1, y1, x2, y2].iter().all(|v| v.is_finite()) {
        return;
    }
    let (left, right) = (pixel(x1.min(x2)), pixel(x1.max(x2)));
    let (top, bottom) = (pixel(y1.min(y2)), pixel(y1.max(y2)));
    if filled {
        bitmap.fill_pixels(left, top, right, bottom);
        return;
    }
    bitmap.fill_pixels(left, top, right, top);
    bitmap.fill_pixels(left, bottom, right, bottom);
    bitmap.fill_pixels(left, top, left, bottom);
    bitmap.fill_pixels(right, top, right, bottom);
}

fn rasterize_circle(bitmap: &mut OccupancyBitmap, cx: f64, cy: f64, r: f64, filled: bool) {
    if ![cx, cy, r].iter().all(|v| v.is_finite()) {
        return;
    }
    let r = r.abs();
    if filled {
        for row in pixel(cy - r)..=pixel(cy + r) {
            let dy = (row as f64 + 0.5 - cy).clamp(-r, r);
            let half = (r * r - dy * dy).max(0.0).sqrt();
            bitmap.fill_pixels(pixel(cx - half), row, pixel(cx + half), row);
        }
        return;
    }
    let steps = ((std::f64::consts::TAU * r).ceil() as usize * 2).max(8);
    for step in 0..steps {
        let t = std::f64::consts::TAU * step as f64 / steps as f64;
        let (px, py) = (pixel(cx + r * t.cos()), pixel(cy + r * t.sin()));
        bitmap.fill_pixels(px, py, px, py);
    }
}

fn rasterize_line(bitmap: &mut OccupancyBitmap, x1: f64, y1: f64, x2: f64, y2: f64) {
    if ![x1, y1, x2, y2].iter().all(|v| v.is_finite()) {
        return;
    }
    let (dx, dy) = (x2 - x1, y2 - y1);
    let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as usize;
    for step in 0..=steps {
        let t = step as f64 / steps as f64;
        let (px, py) = (pixel(x1 + dx * t), pixel(y1 + dy * t));
        bitmap.fill_pixels(px, py, px, py);
    }
}

/// A label to place. `x`/`y` is the label's anchor point with `y` on the
/// text baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelItem {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub text: String,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub dx: f64,
    #[serde(default)]
    pub dy: f64,
    pub font_size: f64,
    /// Measured text width; measured from `text` when absent.
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub text_anchor: TextAnchor,
    #[serde(default)]
    pub bounds_scope: BoundsScope,
    /// Where a previous pass actually drew the label.
    #[serde(default)]
    pub rendered: Option<[f64; 2]>,
    /// Hidden or fully transparent; left untouched.
    #[serde(default)]
    pub hidden: bool,
    /// Hidden by an earlier collision pass.
    #[serde(default)]
    pub collision_hidden: bool,
}

impl LabelItem {
    pub fn new(text: impl Into<String>, x: f64, y: f64, font_size: f64) -> Self {
        Self {
            key: None,
            text: text.into(),
            x,
            y,
            dx: 0.0,
            dy: 0.0,
            font_size,
            width: None,
            height: None,
            text_anchor: TextAnchor::default(),
            bounds_scope: BoundsScope::default(),
            rendered: None,
            hidden: false,
            collision_hidden: false,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_width(mut self, width: f64) -> Self {
        self.width = Some(width);
        self
    }

    fn text_bounds(&self, (x, y): (f64, f64), width: f64, height: f64) -> MarkBounds {
        let x = x + self.dx;
        let y = y + self.dy;
        let left = x - self.text_anchor.offset(width);
        let xs = [left, left + width / 2.0, left + width];
        let ys = [y, y + height / 2.0, y + height];
        match self.bounds_scope {
            BoundsScope::Default => MarkBounds {
                x: xs,
                y: [y - height, y - height / 2.0, y],
            },
            BoundsScope::Centroid => MarkBounds {
                x: [xs[1]; 3],
                y: [ys[1]; 3],
            },
            BoundsScope::Top => MarkBounds { x: xs, y: [ys[0]; 3] },
            BoundsScope::Middle => MarkBounds { x: xs, y: [ys[1]; 3] },
            BoundsScope::Bottom => MarkBounds { x: xs, y: [ys[2]; 3] },
            BoundsScope::Center => MarkBounds { x: [xs[1]; 3], y: ys },
            BoundsScope::Left => MarkBounds { x: [xs[0]; 3], y: ys },
            BoundsScope::Right => MarkBounds { x: [xs[2]; 3], y: ys },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LabelCollisionOptions {
    pub positions: Vec<Anchor>,
    /// Pixel offsets parallel to `positions`; negative values place the
    /// label inside the bounds.
    pub offsets: Vec<f64>,
    /// Canvas width and height, rounded to whole pixels.
    pub size: [f64; 2],
    pub padding: f64,
    pub hide_only: bool,
    pub remove_only: bool,
    pub suppress_mark_draw: bool,
    pub font_family: String,
    pub fast_text_metrics: bool,
}

impl Default for LabelCollisionOptions {
    fn default() -> Self {
        Self {
            positions: vec![Anchor::Middle],
            offsets: vec![1.0],
            size: [0.0, 0.0],
            padding: 1.0,
            hide_only: false,
            remove_only: false,
            suppress_mark_draw: false,
            font_family: "sans-serif".to_string(),
            fast_text_metrics: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlacementStatus {
    Placed,
    /// Every candidate collided; shown anyway at the last one tried.
    Overlapping,
    Hidden,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelPlacement {
    pub index: usize,
    pub key: Option<String>,
    pub x: f64,
    pub y: f64,
    pub visible: bool,
    pub status: PlacementStatus,
    pub anchor: Option<Anchor>,
    pub text_anchor: TextAnchor,
    pub baseline: Baseline,
    pub text_width: f64,
    pub text_height: f64,
}

impl LabelPlacement {
    /// `y` for an SVG `<text>` drawn on its alphabetic baseline.
    pub fn text_y(&self) -> f64 {
        self.y + self.baseline.shift(self.text_height)
    }

    /// Box the label covers at its final position.
    pub fn region(&self) -> Region {
        let x1 = self.x - self.text_anchor.offset(self.text_width);
        let y1 = match self.baseline {
            Baseline::Top => self.y,
            Baseline::Middle => self.y - self.text_height / 2.0,
            Baseline::Bottom => self.y - self.text_height,
        };
        Region::new(x1, y1, x1 + self.text_width, y1 + self.text_height)
    }
}

#[derive(Debug, Clone)]
pub struct LabelCollisionOutcome {
    pub bitmap: OccupancyBitmap,
    pub placements: Vec<LabelPlacement>,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    anchor: Anchor,
    x: f64,
    y: f64,
    text_anchor: TextAnchor,
    baseline: Baseline,
    region: Region,
}

fn candidate_box(
    bounds: &MarkBounds,
    anchor: Anchor,
    offset: f64,
    width: f64,
    height: f64,
) -> Candidate {
    let (dx, dy) = anchor.direction();
    let size_factor = if dx != 0 && dy != 0 { DIAGONAL_FACTOR } else { 1.0 };
    let inside = if offset < 0.0 { -1 } else { 1 };
    let (fdx, fdy, finside) = (dx as f64, dy as f64, inside as f64);

    let yc =
        bounds.y[(dy + 1) as usize] + finside * height * fdy / 2.0 + offset * fdy * size_factor;
    let x = bounds.x[(dx + 1) as usize] + offset * fdx * size_factor;
    let (y1, y2) = (yc - height / 2.0, yc + height / 2.0);
    let xc = x + finside * width * fdx / 2.0;
    let (x1, x2) = (xc - width / 2.0, xc + width / 2.0);

    let label_x = match dx * inside {
        0 => xc,
        h if h < 0 => x2,
        _ => x1,
    };
    let label_y = match dy * inside {
        0 => yc,
        v if v < 0 => y2,
        _ => y1,
    };
    let text_anchor = match dx * inside {
        -1 => TextAnchor::End,
        0 => TextAnchor::Middle,
        _ => TextAnchor::Start,
    };
    let baseline = match dy * inside {
        -1 => Baseline::Bottom,
        0 => Baseline::Middle,
        _ => Baseline::Top,
    };
    Candidate {
        anchor,
        x: label_x,
        y: label_y,
        text_anchor,
        baseline,
        region: Region::new(x1, y1, x2, y2),
    }
}

enum Attempt {
    Placed(Candidate),
    Blocked(Option<Candidate>),
    OffCanvas,
}

struct LabelPlacer<'a> {
    bitmap: &'a mut OccupancyBitmap,
    width: f64,
    height: f64,
    candidates: Vec<(Anchor, f64)>,
}

impl LabelPlacer<'_> {
    fn place(&mut self, bounds: &MarkBounds, width: f64, height: f64) -> Attempt {
        if bounds.x[2] < 0.0
            || bounds.y[2] < 0.0
            || bounds.x[0] > self.width
            || bounds.y[0] > self.height
        {
            return Attempt::OffCanvas;
        }
        let mut last = None;
        for &(anchor, offset) in &self.candidates {
            let candidate = candidate_box(bounds, anchor, offset, width, height);
            let cells = self.bitmap.scale_region(&candidate.region);
            if !self.bitmap.is_out_of_bounds(&cells) && !self.bitmap.query_scaled(&cells) {
                self.bitmap.reserve_scaled(&cells);
                return Attempt::Placed(candidate);
            }
            last = Some(candidate);
        }
        Attempt::Blocked(last)
    }

    fn unplace(&mut self, bounds: &MarkBounds, width: f64, height: f64) {
        for &(anchor, offset) in &self.candidates {
            let candidate = candidate_box(bounds, anchor, offset, width, height);
            let mut cells = self.bitmap.scale_region(&candidate.region);
            cells.y2 += REMOVE_TAIL_ROWS;
            self.bitmap.free_scaled(&cells);
        }
    }
}

/// Places `labels` in order, threading one occupancy bitmap through.
///
/// Pass the bitmap returned by a previous call to keep earlier labels and
/// marks reserved. Labels that cannot be placed are never an error.
pub fn resolve_label_collision(
    labels: &[LabelItem],
    avoid_marks: &[Vec<AvoidMark>],
    bitmap: Option<OccupancyBitmap>,
    options: &LabelCollisionOptions,
) -> Result<LabelCollisionOutcome> {
    if options.positions.len() != options.offsets.len() {
        return Err(Error::MismatchedOffsets {
            positions: options.positions.len(),
            offsets: options.offsets.len(),
        });
    }
    let [width, height] = options.size;
    if !width.is_finite() || !height.is_finite() || width < 0.0 || height < 0.0 {
        return Err(Error::InvalidSize { width, height });
    }
    let (width, height) = (width.round(), height.round());

    let mark_bounds: HashMap<&str, MarkBounds> = avoid_marks
        .iter()
        .flatten()
        .filter_map(|mark| Some((mark.key.as_deref()?, mark.bounds())))
        .collect();

    let mut bitmap =
        bitmap.unwrap_or_else(|| OccupancyBitmap::new(width, height, options.padding));
    if !options.remove_only && !options.suppress_mark_draw {
        for mark in avoid_marks.iter().flatten() {
            mark.rasterize(&mut bitmap);
        }
    }

    let mut placer = LabelPlacer {
        bitmap: &mut bitmap,
        width,
        height,
        candidates: options
            .positions
            .iter()
            .copied()
            .zip(options.offsets.iter().copied())
            .collect(),
    };
    let placements: Vec<LabelPlacement> = labels
        .iter()
        .enumerate()
        .map(|(index, label)| resolve_one(&mut placer, index, label, &mark_bounds, options))
        .collect();

    let count = |status: PlacementStatus| placements.iter().filter(|p| p.status == status).count();
    tracing::debug!(
        labels = labels.len(),
        placed = count(PlacementStatus::Placed),
        overlapping = count(PlacementStatus::Overlapping),
        hidden = count(PlacementStatus::Hidden),
        "resolved label collisions"
    );
    Ok(LabelCollisionOutcome { bitmap, placements })
}

fn resolve_one(
    placer: &mut LabelPlacer<'_>,
    index: usize,
    label: &LabelItem,
    mark_bounds: &HashMap<&str, MarkBounds>,
    options: &LabelCollisionOptions,
) -> LabelPlacement {
    let width = label.width.unwrap_or_else(|| {
        text_width(
            &label.text,
            label.font_size,
            &options.font_family,
            options.fast_text_metrics,
        )
    });
    let height = label.height.unwrap_or_else(|| text_height(label.font_size));
    let origin = match label.rendered {
        Some([x, y]) if options.remove_only => (x, y),
        _ => (label.x, label.y),
    };
    let at = |x: f64, y: f64, visible: bool, status: PlacementStatus| LabelPlacement {
        index,
        key: label.key.clone(),
        x,
        y,
        visible,
        status,
        anchor: None,
        text_anchor: label.text_anchor,
        baseline: Baseline::Bottom,
        text_width: width,
        text_height: height,
    };

    if label.hidden {
        return at(origin.0, origin.1, false, PlacementStatus::Unchanged);
    }
    let bounds = label
        .key
        .as_deref()
        .filter(|_| !options.hide_only)
        .and_then(|key| mark_bounds.get(key).copied())
        .unwrap_or_else(|| label.text_bounds(origin, width, height));

    if options.remove_only {
        if !label.collision_hidden {
            placer.unplace(&bounds, width, height);
        }
        return at(
            origin.0,
            origin.1,
            !label.collision_hidden,
            PlacementStatus::Unchanged,
        );
    }

    match placer.place(&bounds, width, height) {
        Attempt::Placed(candidate) if options.hide_only => LabelPlacement {
            anchor: Some(candidate.anchor),
            ..at(label.x, label.y, true, PlacementStatus::Placed)
        },
        Attempt::Placed(candidate) => placed_at(at, candidate, true, PlacementStatus::Placed),
        Attempt::Blocked(Some(candidate)) if !options.hide_only => {
            placed_at(at, candidate, true, PlacementStatus::Overlapping)
        }
        Attempt::Blocked(None) if !options.hide_only => {
            at(label.x, label.y, true, PlacementStatus::Overlapping)
        }
        Attempt::Blocked(_) | Attempt::OffCanvas => {
            at(label.x, label.y, false, PlacementStatus::Hidden)
        }
    }
}

fn placed_at(
    at: impl Fn(f64, f64, bool, PlacementStatus) -> LabelPlacement,
    candidate: Candidate,
    visible: bool,
    status: PlacementStatus,
) -> LabelPlacement {
    LabelPlacement {
        anchor: Some(candidate.anchor),
        text_anchor: candidate.text_anchor,
        baseline: candidate.baseline,
        ..at(candidate.x, candidate.y, visible, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(positions: &[Anchor], offsets: &[f64], size: [f64; 2]) -> LabelCollisionOptions {
        LabelCollisionOptions {
            positions: positions.to_vec(),
            offsets: offsets.to_vec(),
            size,
            fast_text_metrics: true,
            ..LabelCollisionOptions::default()
        }
    }

    fn label(x: f64, y: f64) -> LabelItem {
        LabelItem::new("Label", x, y, 12.0).with_width(40.0)
    }

    #[test]
    fn anchors_parse_from_kebab_case() {
        assert_eq!("bottom-right".parse::<Anchor>().unwrap(), Anchor::BottomRight);
        assert_eq!(Anchor::TopLeft.to_string(), "top-left");
        assert!(matches!(
            "upper".parse::<Anchor>(),
            Err(Error::UnknownPosition(_))
        ));
    }

    #[test]
    fn top_candidate_geometry() {
        let bounds = MarkBounds::from_rect(100.0, 39.0, 40.0, 11.0);
        let candidate = candidate_box(&bounds, Anchor::Top, 2.0, 40.0, 11.0);
        assert_eq!((candidate.x, candidate.y), (120.0, 37.0));
        assert_eq!(candidate.region, Region::new(100.0, 26.0, 140.0, 37.0));
        assert_eq!(candidate.text_anchor, TextAnchor::Middle);
        assert_eq!(candidate.baseline, Baseline::Bottom);
    }

    #[test]
    fn negative_offsets_flip_alignment_inside() {
        let bounds = MarkBounds::from_rect(0.0, 0.0, 100.0, 100.0);
        let candidate = candidate_box(&bounds, Anchor::BottomRight, -4.0, 20.0, 10.0);
        assert_eq!(candidate.text_anchor, TextAnchor::End);
        assert_eq!(candidate.baseline, Baseline::Bottom);
        assert!(candidate.region.x2 <= 100.0 && candidate.region.y2 <= 100.0);
    }

    #[test]
    fn second_identical_label_is_hidden_in_hide_only_mode() {
        let labels = vec![label(100.0, 50.0), label(100.0, 50.0)];
        let mut opts = options(&[Anchor::Top], &[2.0], [200.0, 100.0]);
        opts.hide_only = true;
        let outcome = resolve_label_collision(&labels, &[], None, &opts).unwrap();
        let [first, second] = &outcome.placements[..] else {
            panic!("expected two placements");
        };
        assert_eq!(first.status, PlacementStatus::Placed);
        assert!(first.visible);
        assert_eq!((first.x, first.y), (100.0, 50.0), "hide-only never moves labels");
        assert_eq!(second.status, PlacementStatus::Hidden);
        assert!(!second.visible);
    }

    #[test]
    fn second_identical_label_overlaps_at_last_candidate() {
        let labels = vec![label(100.0, 50.0), label(100.0, 50.0)];
        let opts = options(&[Anchor::Top], &[2.0], [200.0, 100.0]);
        let outcome = resolve_label_collision(&labels, &[], None, &opts).unwrap();
        let (first, second) = (&outcome.placements[0], &outcome.placements[1]);
        assert_eq!(first.status, PlacementStatus::Placed);
        assert_eq!((first.x, first.y), (120.0, 37.0));
        assert_eq!(second.status, PlacementStatus::Overlapping);
        assert!(second.visible);
        assert_eq!((second.x, second.y), (first.x, first.y));
        // only the first label holds cells
        assert_eq!(outcome.bitmap.occupied_cells(), 41 * 12);
    }

    #[test]
    fn keyed_label_moves_around_blocking_mark() {
        let marks = vec![vec![
            AvoidMark::rect(50.0, 40.0, 10.0, 20.0).with_key("n1").filled(),
            AvoidMark::rect(64.0, 30.0, 36.0, 40.0).filled(),
        ]];
        let labels = vec![label(0.0, 0.0).with_key("n1").with_width(20.0)];
        let opts = options(&[Anchor::Right, Anchor::Left], &[4.0, 4.0], [200.0, 100.0]);
        let outcome = resolve_label_collision(&labels, &marks, None, &opts).unwrap();
        let placement = &outcome.placements[0];
        assert_eq!(placement.status, PlacementStatus::Placed);
        assert_eq!(placement.anchor, Some(Anchor::Left));
        assert_eq!((placement.x, placement.y), (46.0, 50.0));
        assert_eq!(placement.text_anchor, TextAnchor::End);
        assert_eq!(placement.baseline, Baseline::Middle);
    }

    #[test]
    fn canvas_edge_counts_as_collision() {
        let marks = vec![vec![AvoidMark::rect(170.0, 40.0, 20.0, 20.0).with_key("edge")]];
        let labels = vec![label(0.0, 0.0).with_key("edge")];
        let opts = options(&[Anchor::Right, Anchor::Left], &[4.0, 4.0], [200.0, 100.0]);
        let outcome = resolve_label_collision(&labels, &marks, None, &opts).unwrap();
        assert_eq!(outcome.placements[0].anchor, Some(Anchor::Left));
        assert_eq!(outcome.placements[0].x, 166.0);
    }

    #[test]
    fn marks_outside_canvas_hide_their_labels() {
        let marks = vec![vec![AvoidMark::rect(300.0, 10.0, 5.0, 5.0).with_key("far")]];
        let labels = vec![label(0.0, 0.0).with_key("far")];
        let opts = options(&[Anchor::Left], &[2.0], [200.0, 100.0]);
        let outcome = resolve_label_collision(&labels, &marks, None, &opts).unwrap();
        assert_eq!(outcome.placements[0].status, PlacementStatus::Hidden);
    }

    #[test]
    fn hidden_labels_are_left_alone() {
        let mut hidden = label(100.0, 50.0);
        hidden.hidden = true;
        let opts = options(&[Anchor::Top], &[2.0], [200.0, 100.0]);
        let outcome = resolve_label_collision(&[hidden], &[], None, &opts).unwrap();
        assert_eq!(outcome.placements[0].status, PlacementStatus::Unchanged);
        assert!(!outcome.placements[0].visible);
        assert_eq!(outcome.bitmap.occupied_cells(), 0);
    }

    #[test]
    fn threaded_bitmap_keeps_earlier_labels_and_skips_redraw() {
        let marks = vec![vec![AvoidMark::rect(10.0, 10.0, 20.0, 20.0).filled()]];
        let opts = options(&[Anchor::Top], &[2.0], [200.0, 100.0]);
        let first =
            resolve_label_collision(&[label(100.0, 50.0)], &marks, None, &opts).unwrap();
        let reserved = first.bitmap.occupied_cells();

        let mut follow_up = opts.clone();
        follow_up.suppress_mark_draw = true;
        follow_up.hide_only = true;
        let second =
            resolve_label_collision(&[label(100.0, 50.0)], &marks, Some(first.bitmap), &follow_up)
                .unwrap();
        assert_eq!(second.placements[0].status, PlacementStatus::Hidden);
        assert_eq!(second.bitmap.occupied_cells(), reserved, "marks are not drawn twice");
    }

    #[test]
    fn remove_only_frees_label_cells() {
        let marks = vec![vec![AvoidMark::rect(50.0, 40.0, 10.0, 20.0).with_key("a").filled()]];
        let opts = options(&[Anchor::Right], &[4.0], [200.0, 100.0]);
        let marks_only = resolve_label_collision(&[], &marks, None, &opts)
            .unwrap()
            .bitmap
            .occupied_cells();
        let labelled = label(0.0, 0.0).with_key("a");
        let placed = resolve_label_collision(&[labelled.clone()], &marks, None, &opts).unwrap();
        assert!(placed.bitmap.occupied_cells() > marks_only);

        let mut rendered = labelled;
        rendered.rendered = Some([placed.placements[0].x, placed.placements[0].y]);
        let mut removal = opts.clone();
        removal.remove_only = true;
        let removed =
            resolve_label_collision(&[rendered], &marks, Some(placed.bitmap), &removal).unwrap();
        assert_eq!(removed.placements[0].status, PlacementStatus::Unchanged);
        assert_eq!(removed.bitmap.occupied_cells(), marks_only);
    }

    #[test]
    fn invalid_options_are_rejected() {
        let mismatched = options(&[Anchor::Top, Anchor::Bottom], &[1.0], [10.0, 10.0]);
        assert_eq!(
            resolve_label_collision(&[], &[], None, &mismatched).unwrap_err(),
            Error::MismatchedOffsets {
                positions: 2,
                offsets: 1
            }
        );
        let bad_size = options(&[Anchor::Top], &[1.0], [f64::NAN, 10.0]);
        assert!(matches!(
            resolve_label_collision(&[], &[], None, &bad_size),
            Err(Error::InvalidSize { .. })
        ));
    }

    #[test]
    fn outline_marks_reserve_fewer_cells_than_filled() {
        let opts = options(&[Anchor::Top], &[1.0], [100.0, 100.0]);
        let occupied = |mark: AvoidMark| {
            resolve_label_collision(&[], &[vec![mark]], None, &opts)
                .unwrap()
                .bitmap
                .occupied_cells()
        };
        let circle = MarkShape::Circle {
            cx: 50.0,
            cy: 50.0,
            r: 10.0,
        };
        let outline = occupied(AvoidMark::new(circle.clone()));
        let filled = occupied(AvoidMark::new(circle).filled());
        assert!(outline > 0 && filled > outline);
        let line = occupied(AvoidMark::new(MarkShape::Line {
            x1: 0.0,
            y1: 0.0,
            x2: 20.0,
            y2: 0.0,
        }));
        assert_eq!(line, 21);
    }

    #[test]
    fn bounds_scopes_pick_box_edges() {
        let mut item = label(10.0, 20.0).with_width(40.0);
        item.text_anchor = TextAnchor::Middle;
        let default = item.text_bounds((10.0, 20.0), 40.0, 10.0);
        assert_eq!(default.x, [-10.0, 10.0, 30.0]);
        assert_eq!(default.y, [10.0, 15.0, 20.0]);
        item.bounds_scope = BoundsScope::Right;
        let right = item.text_bounds((10.0, 20.0), 40.0, 10.0);
        assert_eq!(right.x, [30.0; 3]);
        assert_eq!(right.y, [20.0, 25.0, 30.0]);
    }

    #[test]
    fn baseline_shift_matches_svg_text() {
        let placement = LabelPlacement {
            index: 0,
            key: None,
            x: 0.0,
            y: 10.0,
            visible: true,
            status: PlacementStatus::Placed,
            anchor: Some(Anchor::Bottom),
            text_anchor: TextAnchor::Middle,
            baseline: Baseline::Top,
            text_width: 30.0,
            text_height: 12.0,
        };
        assert_eq!(placement.text_y(), 22.0);
        assert_eq!(placement.region(), Region::new(-15.0, 10.0, 15.0, 22.0));
        assert_eq!(Baseline::Middle.shift(12.0), 4.0);
    }
}
