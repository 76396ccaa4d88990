// Packed occupancy grid for label collisions. Canvases past one megapixel
// map onto a coarser grid.

const WORD_BITS: usize = 32;
const MEGAPIXEL: f64 = 1_000_000.0;

/// Axis-aligned box in real pixel coordinates, corners inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl Region {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

/// Box in grid cells, corners inclusive. May reach outside the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OccupancyBitmap {
    width: usize,
    height: usize,
    canvas_width: f64,
    canvas_height: f64,
    padding: f64,
    pixel_ratio: f64,
    words: Vec<u32>,
}

impl OccupancyBitmap {
    pub fn new(width: f64, height: f64, padding: f64) -> Self {
        let pixel_ratio = (width * height / MEGAPIXEL).sqrt().max(1.0);
        let cols = ((width + 2.0 * padding + pixel_ratio) / pixel_ratio) as usize;
        let rows = ((height + 2.0 * padding + pixel_ratio) / pixel_ratio) as usize;
        Self {
            width: cols,
            height: rows,
            canvas_width: width,
            canvas_height: height,
            padding,
            pixel_ratio,
            words: vec![0; (cols * rows + WORD_BITS) / WORD_BITS],
        }
    }

    /// Grid columns.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Grid rows.
    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    pub fn scale_pixel(&self, value: f64) -> i32 {
        ((value + self.padding) / self.pixel_ratio) as i32
    }

    pub fn scale_region(&self, region: &Region) -> CellRange {
        CellRange {
            x1: self.scale_pixel(region.x1),
            y1: self.scale_pixel(region.y1),
            x2: self.scale_pixel(region.x2),
            y2: self.scale_pixel(region.y2),
        }
    }

    pub fn is_out_of_bounds(&self, cells: &CellRange) -> bool {
        cells.x1 < 0
            || cells.y1 < 0
            || cells.x2 as i64 >= self.width as i64
            || cells.y2 as i64 >= self.height as i64
    }

    pub fn mark(&mut self, x: f64, y: f64) {
        let (x, y) = (self.scale_pixel(x), self.scale_pixel(y));
        self.mark_scaled(x, y);
    }

    pub fn get(&self, x: f64, y: f64) -> bool {
        self.get_scaled(self.scale_pixel(x), self.scale_pixel(y))
    }

    pub fn mark_scaled(&mut self, x: i32, y: i32) {
        if let Some(bit) = self.bit_index(x, y) {
            self.words[bit / WORD_BITS] |= 1 << (bit % WORD_BITS);
        }
    }

    pub fn unmark_scaled(&mut self, x: i32, y: i32) {
        if let Some(bit) = self.bit_index(x, y) {
            self.words[bit / WORD_BITS] &= !(1 << (bit % WORD_BITS));
        }
    }

    pub fn get_scaled(&self, x: i32, y: i32) -> bool {
        self.bit_index(x, y)
            .is_some_and(|bit| self.words[bit / WORD_BITS] & (1 << (bit % WORD_BITS)) != 0)
    }

    pub fn reserve(&mut self, region: &Region) {
        let cells = self.scale_region(region);
        self.reserve_scaled(&cells);
    }

    pub fn free(&mut self, region: &Region) {
        let cells = self.scale_region(region);
        self.free_scaled(&cells);
    }

    pub fn query(&self, region: &Region) -> bool {
        self.query_scaled(&self.scale_region(region))
    }

    pub fn reserve_scaled(&mut self, cells: &CellRange) {
        let Some(span) = self.clip(cells) else {
            return;
        };
        let words = &mut self.words;
        visit_spans(self.width, span, |word, mask| {
            words[word] |= mask;
            false
        });
    }

    pub fn free_scaled(&mut self, cells: &CellRange) {
        let Some(span) = self.clip(cells) else {
            return;
        };
        let words = &mut self.words;
        visit_spans(self.width, span, |word, mask| {
            words[word] &= !mask;
            false
        });
    }

    /// Whether any cell in the range is occupied. Cells off the grid count as free.
    pub fn query_scaled(&self, cells: &CellRange) -> bool {
        let Some(span) = self.clip(cells) else {
            return false;
        };
        visit_spans(self.width, span, |word, mask| self.words[word] & mask != 0)
    }

    /// Marks every real pixel in the inclusive pixel box, clipped to the canvas.
    pub fn fill_pixels(&mut self, x1: i64, y1: i64, x2: i64, y2: i64) {
        let max_x = self.canvas_width.floor() as i64 - 1;
        let max_y = self.canvas_height.floor() as i64 - 1;
        let (x1, x2) = (x1.max(0), x2.min(max_x));
        let (y1, y2) = (y1.max(0), y2.min(max_y));
        if x1 > x2 || y1 > y2 {
            return;
        }
        let cells = CellRange {
            x1: self.scale_pixel(x1 as f64),
            y1: self.scale_pixel(y1 as f64),
            x2: self.scale_pixel(x2 as f64),
            y2: self.scale_pixel(y2 as f64),
        };
        self.reserve_scaled(&cells);
    }

    pub fn occupied_cells(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    fn bit_index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return None;
        }
        Some(y as usize * self.width + x as usize)
    }

    fn clip(&self, cells: &CellRange) -> Option<(usize, usize, usize, usize)> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        let x1 = cells.x1.max(0) as i64;
        let y1 = cells.y1.max(0) as i64;
        let x2 = (cells.x2 as i64).min(self.width as i64 - 1);
        let y2 = (cells.y2 as i64).min(self.height as i64 - 1);
        if x1 > x2 || y1 > y2 {
            return None;
        }
        Some((x1 as usize, y1 as usize, x2 as usize, y2 as usize))
    }
}

/// Walks the words covering each row of the span; stops once `visit` returns true.
fn visit_spans(
    width: usize,
    (x1, y1, x2, y2): (usize, usize, usize, usize),
    mut visit: impl FnMut(usize, u32) -> bool,
) -> bool {
    for y in y1..=y2 {
        let start = y * width + x1;
        let end = y * width + x2;
        let mut bit = start;
        while bit <= end {
            let word = bit / WORD_BITS;
            let lo = bit % WORD_BITS;
            let hi = (end - word * WORD_BITS).min(WORD_BITS - 1);
            if visit(word, span_mask(lo, hi)) {
                return true;
            }
            bit = (word + 1) * WORD_BITS;
        }
    }
    false
}

fn span_mask(lo: usize, hi: usize) -> u32 {
    let upper = if hi == WORD_BITS - 1 {
        u32::MAX
    } else {
        (1u32 << (hi + 1)) - 1
    };
    upper & !((1u32 << lo) - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_canvas_keeps_unit_ratio() {
        let bitmap = OccupancyBitmap::new(200.0, 100.0, 1.0);
        assert_eq!(bitmap.pixel_ratio(), 1.0);
        assert_eq!(bitmap.width(), 203);
        assert_eq!(bitmap.height(), 103);
        assert_eq!(bitmap.scale_pixel(10.7), 11);
    }

    #[test]
    fn large_canvas_coarsens_grid() {
        let bitmap = OccupancyBitmap::new(4000.0, 1000.0, 0.0);
        assert_eq!(bitmap.pixel_ratio(), 2.0);
        assert_eq!(bitmap.width(), 2001);
        assert_eq!(bitmap.scale_pixel(9.0), 4);
    }

    #[test]
    fn reserve_query_free_cycle() {
        let mut bitmap = OccupancyBitmap::new(100.0, 100.0, 0.0);
        let region = Region::new(10.0, 10.0, 45.0, 12.0);
        assert!(!bitmap.query(&region));
        bitmap.reserve(&region);
        assert!(bitmap.query(&region));
        assert!(bitmap.query(&Region::new(45.0, 12.0, 60.0, 20.0)), "corner touches");
        assert!(!bitmap.query(&Region::new(46.0, 10.0, 60.0, 12.0)));
        assert_eq!(bitmap.occupied_cells(), 36 * 3);
        bitmap.free(&region);
        assert_eq!(bitmap.occupied_cells(), 0);
    }

    #[test]
    fn spans_crossing_word_boundaries() {
        let mut bitmap = OccupancyBitmap::new(100.0, 4.0, 0.0);
        let cells = CellRange {
            x1: 30,
            y1: 1,
            x2: 70,
            y2: 1,
        };
        bitmap.reserve_scaled(&cells);
        assert_eq!(bitmap.occupied_cells(), 41);
        for x in 30..=70 {
            assert!(bitmap.get_scaled(x, 1), "cell {x} should be set");
        }
        assert!(!bitmap.get_scaled(29, 1));
        assert!(!bitmap.get_scaled(71, 1));
        assert!(!bitmap.get_scaled(50, 0));
    }

    #[test]
    fn single_cells_and_out_of_grid_access() {
        let mut bitmap = OccupancyBitmap::new(10.0, 10.0, 0.0);
        bitmap.mark(3.2, 4.9);
        assert!(bitmap.get(3.0, 4.0));
        bitmap.mark_scaled(-1, 2);
        bitmap.mark_scaled(500, 2);
        assert_eq!(bitmap.occupied_cells(), 1);
        bitmap.unmark_scaled(3, 4);
        assert!(!bitmap.get_scaled(3, 4));
        assert!(!bitmap.get_scaled(-5, -5));
    }

    #[test]
    fn out_of_bounds_detection() {
        let bitmap = OccupancyBitmap::new(50.0, 50.0, 0.0);
        let inside = CellRange {
            x1: 0,
            y1: 0,
            x2: 50,
            y2: 50,
        };
        assert!(!bitmap.is_out_of_bounds(&inside));
        assert!(bitmap.is_out_of_bounds(&CellRange { x2: 51, ..inside }));
        assert!(bitmap.is_out_of_bounds(&CellRange { y1: -1, ..inside }));
    }

    #[test]
    fn fill_pixels_clips_to_canvas() {
        let mut bitmap = OccupancyBitmap::new(20.0, 20.0, 2.0);
        bitmap.fill_pixels(-10, -10, 1, 1);
        assert_eq!(bitmap.occupied_cells(), 4);
        assert!(bitmap.get(0.0, 0.0));
        assert!(!bitmap.get(-1.0, 0.0), "padding cells stay free");
        bitmap.fill_pixels(30, 30, 40, 40);
        assert_eq!(bitmap.occupied_cells(), 4);
    }
}
