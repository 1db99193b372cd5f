//! Ruling-line table detection on page geometry.
//!
//! Works purely on [`Edge`]s and [`Glyph`]s in top-down page coordinates
//! (origin at the top-left corner, `y` growing downwards), so it can be
//! exercised without a PDF engine. [`crate::pipeline::extract`] feeds it
//! what pdfium reports for each page.
//!
//! ## Algorithm
//!
//! ```text
//! edges ──▶ snap ──▶ join ──▶ filter ──▶ intersections ──▶ cells ──▶ tables
//! ```
//!
//! 1. Parallel edges within `snap_tolerance` move to their mean position.
//! 2. Collinear edges with gaps up to `join_tolerance` are merged.
//! 3. Edges shorter than `edge_min_length` are dropped.
//! 4. Every vertical/horizontal pair crossing within
//!    `intersection_tolerance` yields an intersection point.
//! 5. Each intersection opens the smallest rectangle whose four corners are
//!    intersections joined by shared edges: one cell.
//! 6. Cells sharing a corner belong to the same table. A lone cell is a box,
//!    not a table.

use crate::config::TableSettings;
use crate::table::RawRow;
use std::collections::HashMap;

/// Direction of a ruling line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// An axis-aligned rectangle in top-down page coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub x0: f32,
    pub top: f32,
    pub x1: f32,
    pub bottom: f32,
}

impl BBox {
    pub fn new(x0: f32, top: f32, x1: f32, bottom: f32) -> Self {
        Self {
            x0: x0.min(x1),
            top: top.min(bottom),
            x1: x0.max(x1),
            bottom: top.max(bottom),
        }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.x0 + self.x1) / 2.0, (self.top + self.bottom) / 2.0)
    }

    /// Half-open containment: points on the right or bottom border belong to
    /// the neighbouring cell.
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.top && y < self.bottom
    }

    fn corners(&self) -> [(f32, f32); 4] {
        [
            (self.x0, self.top),
            (self.x1, self.top),
            (self.x0, self.bottom),
            (self.x1, self.bottom),
        ]
    }
}

/// A ruling line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub orientation: Orientation,
    /// `y` of a horizontal edge, `x` of a vertical one.
    pub position: f32,
    /// Where the edge starts along its own axis.
    pub start: f32,
    /// Where the edge ends along its own axis; always `>= start`.
    pub end: f32,
}

impl Edge {
    pub fn horizontal(y: f32, x0: f32, x1: f32) -> Self {
        Self {
            orientation: Orientation::Horizontal,
            position: y,
            start: x0.min(x1),
            end: x0.max(x1),
        }
    }

    pub fn vertical(x: f32, top: f32, bottom: f32) -> Self {
        Self {
            orientation: Orientation::Vertical,
            position: x,
            start: top.min(bottom),
            end: top.max(bottom),
        }
    }

    /// The four sides of a rectangle.
    pub fn rect_sides(b: &BBox) -> [Edge; 4] {
        [
            Edge::horizontal(b.top, b.x0, b.x1),
            Edge::horizontal(b.bottom, b.x0, b.x1),
            Edge::vertical(b.x0, b.top, b.bottom),
            Edge::vertical(b.x1, b.top, b.bottom),
        ]
    }

    /// A straight segment, if it is axis-aligned within `tolerance`.
    pub fn from_segment(p0: (f32, f32), p1: (f32, f32), tolerance: f32) -> Option<Edge> {
        let (x0, y0) = p0;
        let (x1, y1) = p1;
        if (y0 - y1).abs() <= tolerance && (x0 - x1).abs() > tolerance {
            Some(Edge::horizontal((y0 + y1) / 2.0, x0, x1))
        } else if (x0 - x1).abs() <= tolerance && (y0 - y1).abs() > tolerance {
            Some(Edge::vertical((x0 + x1) / 2.0, y0, y1))
        } else {
            None
        }
    }

    pub fn length(&self) -> f32 {
        self.end - self.start
    }
}

/// One character with its bounding box.
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub ch: char,
    pub bbox: BBox,
}

/// A table found on a page: its cells, in no particular order.
#[derive(Debug, Clone, PartialEq)]
pub struct FoundTable {
    pub bbox: BBox,
    pub cells: Vec<BBox>,
}

impl FoundTable {
    fn from_cells(cells: Vec<BBox>) -> Self {
        let bbox = cells.iter().skip(1).fold(cells[0], |acc, c| BBox {
            x0: acc.x0.min(c.x0),
            top: acc.top.min(c.top),
            x1: acc.x1.max(c.x1),
            bottom: acc.bottom.max(c.bottom),
        });
        Self { bbox, cells }
    }

    /// Read the table as rows of cell text.
    ///
    /// Rows are the distinct cell tops, columns the distinct cell lefts.
    /// A grid slot covered by a spanning neighbour has no cell of its own and
    /// yields `None`; a cell without text yields `Some("")`.
    pub fn extract(&self, glyphs: &[Glyph], settings: &TableSettings) -> Vec<RawRow> {
        let lefts = distinct_sorted(self.cells.iter().map(|c| c.x0));
        let tops = distinct_sorted(self.cells.iter().map(|c| c.top));

        tops.iter()
            .map(|&top| {
                lefts
                    .iter()
                    .map(|&x0| {
                        self.cells
                            .iter()
                            .find(|c| c.top == top && c.x0 == x0)
                            .map(|cell| cell_text(cell, glyphs, settings))
                    })
                    .collect()
            })
            .collect()
    }
}

/// Find every ruled table formed by `edges`, ordered top-to-bottom then
/// left-to-right.
pub fn find_tables(edges: &[Edge], settings: &TableSettings) -> Vec<FoundTable> {
    let horizontal = merge_axis(
        edges
            .iter()
            .filter(|e| e.orientation == Orientation::Horizontal)
            .copied()
            .collect(),
        settings,
    );
    let vertical = merge_axis(
        edges
            .iter()
            .filter(|e| e.orientation == Orientation::Vertical)
            .copied()
            .collect(),
        settings,
    );
    if horizontal.len() < 2 || vertical.len() < 2 {
        return Vec::new();
    }

    let points = find_intersections(&horizontal, &vertical, settings.intersection_tolerance);
    let cells = find_cells(&points);
    group_cells(cells)
}

/// Find and read every table on a page, in document order.
pub fn extract_page_tables(
    edges: &[Edge],
    glyphs: &[Glyph],
    settings: &TableSettings,
) -> Vec<Vec<RawRow>> {
    find_tables(edges, settings)
        .iter()
        .map(|t| t.extract(glyphs, settings))
        .collect()
}

// ── Edge merging ─────────────────────────────────────────────────────────

/// Snap, join and length-filter edges of one orientation.
fn merge_axis(mut edges: Vec<Edge>, settings: &TableSettings) -> Vec<Edge> {
    edges.sort_by(|a, b| a.position.total_cmp(&b.position));

    let mut clusters: Vec<Vec<Edge>> = Vec::new();
    for edge in edges {
        match clusters.last_mut() {
            Some(cluster)
                if cluster
                    .last()
                    .is_some_and(|last| edge.position - last.position <= settings.snap_tolerance) =>
            {
                cluster.push(edge)
            }
            _ => clusters.push(vec![edge]),
        }
    }

    let mut merged = Vec::new();
    for mut cluster in clusters {
        let mean = cluster.iter().map(|e| e.position).sum::<f32>() / cluster.len() as f32;
        cluster.sort_by(|a, b| a.start.total_cmp(&b.start));

        let mut current: Option<Edge> = None;
        for edge in cluster {
            let edge = Edge {
                position: mean,
                ..edge
            };
            current = match current {
                Some(mut cur) if edge.start <= cur.end + settings.join_tolerance => {
                    cur.end = cur.end.max(edge.end);
                    Some(cur)
                }
                Some(cur) => {
                    merged.push(cur);
                    Some(edge)
                }
                None => Some(edge),
            };
        }
        merged.extend(current);
    }

    merged.retain(|e| e.length() >= settings.edge_min_length);
    merged
}

// ── Intersections and cells ──────────────────────────────────────────────

#[derive(Debug)]
struct Intersection {
    x: f32,
    y: f32,
    horizontal: Vec<usize>,
    vertical: Vec<usize>,
}

fn point_key(x: f32, y: f32) -> (u32, u32) {
    (x.to_bits(), y.to_bits())
}

/// Intersection points sorted by `x`, then `y`.
fn find_intersections(horizontal: &[Edge], vertical: &[Edge], tolerance: f32) -> Vec<Intersection> {
    let mut points = Vec::new();
    for (vi, v) in vertical.iter().enumerate() {
        for (hi, h) in horizontal.iter().enumerate() {
            if v.start <= h.position + tolerance
                && v.end >= h.position - tolerance
                && v.position >= h.start - tolerance
                && v.position <= h.end + tolerance
            {
                points.push(Intersection {
                    x: v.position,
                    y: h.position,
                    horizontal: vec![hi],
                    vertical: vec![vi],
                });
            }
        }
    }

    points.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));

    let mut merged: Vec<Intersection> = Vec::with_capacity(points.len());
    for p in points {
        match merged.last_mut() {
            Some(last) if last.x == p.x && last.y == p.y => {
                last.horizontal.extend(p.horizontal);
                last.vertical.extend(p.vertical);
            }
            _ => merged.push(p),
        }
    }
    merged
}

fn shares_edge(a: &[usize], b: &[usize]) -> bool {
    a.iter().any(|e| b.contains(e))
}

/// For every intersection, the smallest cell it is the top-left corner of.
fn find_cells(points: &[Intersection]) -> Vec<BBox> {
    let index: HashMap<(u32, u32), usize> = points
        .iter()
        .enumerate()
        .map(|(i, p)| (point_key(p.x, p.y), i))
        .collect();

    let mut cells = Vec::new();
    for (i, pt) in points.iter().enumerate() {
        let rest = &points[i + 1..];
        // `points` is sorted by (x, y): same-x points after `pt` lie below it,
        // same-y points after it lie to its right.
        let right: Vec<&Intersection> = rest.iter().filter(|p| p.y == pt.y).collect();

        'below: for below in rest.iter().filter(|p| p.x == pt.x) {
            if !shares_edge(&pt.vertical, &below.vertical) {
                continue;
            }
            for r in &right {
                if !shares_edge(&pt.horizontal, &r.horizontal) {
                    continue;
                }
                let Some(&corner_idx) = index.get(&point_key(r.x, below.y)) else {
                    continue;
                };
                let corner = &points[corner_idx];
                if shares_edge(&corner.vertical, &r.vertical)
                    && shares_edge(&corner.horizontal, &below.horizontal)
                {
                    cells.push(BBox::new(pt.x, pt.y, r.x, below.y));
                    break 'below;
                }
            }
        }
    }
    cells
}

/// Group cells that share a corner; drop lone cells; order by position.
fn group_cells(cells: Vec<BBox>) -> Vec<FoundTable> {
    let mut parent: Vec<usize> = (0..cells.len()).collect();

    fn root(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    let mut owner: HashMap<(u32, u32), usize> = HashMap::new();
    for (i, cell) in cells.iter().enumerate() {
        for (x, y) in cell.corners() {
            match owner.get(&point_key(x, y)) {
                Some(&j) => {
                    let (a, b) = (root(&mut parent, i), root(&mut parent, j));
                    if a != b {
                        parent[a] = b;
                    }
                }
                None => {
                    owner.insert(point_key(x, y), i);
                }
            }
        }
    }

    let mut groups: Vec<(usize, Vec<BBox>)> = Vec::new();
    for (i, cell) in cells.into_iter().enumerate() {
        let r = root(&mut parent, i);
        match groups.iter_mut().find(|(g, _)| *g == r) {
            Some((_, members)) => members.push(cell),
            None => groups.push((r, vec![cell])),
        }
    }

    let mut tables: Vec<FoundTable> = groups
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .map(|(_, members)| FoundTable::from_cells(members))
        .collect();
    tables.sort_by(|a, b| {
        a.bbox
            .top
            .total_cmp(&b.bbox.top)
            .then(a.bbox.x0.total_cmp(&b.bbox.x0))
    });
    tables
}

// ── Cell text ────────────────────────────────────────────────────────────

fn distinct_sorted(values: impl Iterator<Item = f32>) -> Vec<f32> {
    let mut v: Vec<f32> = values.collect();
    v.sort_by(|a, b| a.total_cmp(b));
    v.dedup();
    v
}

fn cell_text(cell: &BBox, glyphs: &[Glyph], settings: &TableSettings) -> String {
    let inside: Vec<&Glyph> = glyphs
        .iter()
        .filter(|g| {
            let (cx, cy) = g.bbox.center();
            cell.contains(cx, cy)
        })
        .collect();
    text_from_glyphs(inside, settings)
}

/// Lay glyphs out as text: lines top to bottom, words left to right.
///
/// Whitespace glyphs and horizontal gaps wider than `x_tolerance` separate
/// words; words are joined by one space and lines by `\n`.
pub(crate) fn text_from_glyphs(mut glyphs: Vec<&Glyph>, settings: &TableSettings) -> String {
    glyphs.sort_by(|a, b| a.bbox.top.total_cmp(&b.bbox.top));

    let mut lines: Vec<Vec<&Glyph>> = Vec::new();
    let mut last_top: Option<f32> = None;
    for g in glyphs {
        match (lines.last_mut(), last_top) {
            (Some(line), Some(top)) if g.bbox.top - top <= settings.y_tolerance => line.push(g),
            _ => lines.push(vec![g]),
        }
        last_top = Some(g.bbox.top);
    }

    lines
        .into_iter()
        .map(|mut line| {
            line.sort_by(|a, b| a.bbox.x0.total_cmp(&b.bbox.x0));
            let mut words: Vec<String> = Vec::new();
            let mut word = String::new();
            let mut prev_x1: Option<f32> = None;
            for g in line {
                let gap = prev_x1.is_some_and(|x1| g.bbox.x0 > x1 + settings.x_tolerance);
                if g.ch.is_whitespace() || gap {
                    if !word.is_empty() {
                        words.push(std::mem::take(&mut word));
                    }
                }
                if g.ch.is_whitespace() {
                    prev_x1 = None;
                    continue;
                }
                word.push(g.ch);
                prev_x1 = Some(g.bbox.x1);
            }
            if !word.is_empty() {
                words.push(word);
            }
            words.join(" ")
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAR_W: f32 = 5.0;
    const CHAR_H: f32 = 8.0;

    fn settings() -> TableSettings {
        TableSettings::default()
    }

    /// Glyphs for `text` starting at (x0, top), one fixed-width box per char.
    fn word(text: &str, x0: f32, top: f32) -> Vec<Glyph> {
        text.chars()
            .enumerate()
            .map(|(i, ch)| {
                let x = x0 + i as f32 * CHAR_W;
                Glyph {
                    ch,
                    bbox: BBox::new(x, top, x + CHAR_W, top + CHAR_H),
                }
            })
            .collect()
    }

    /// A full grid: horizontal lines at `ys`, vertical lines at `xs`.
    fn grid(xs: &[f32], ys: &[f32]) -> Vec<Edge> {
        let (left, right) = (xs[0], xs[xs.len() - 1]);
        let (top, bottom) = (ys[0], ys[ys.len() - 1]);
        let mut edges: Vec<Edge> = ys.iter().map(|&y| Edge::horizontal(y, left, right)).collect();
        edges.extend(xs.iter().map(|&x| Edge::vertical(x, top, bottom)));
        edges
    }

    fn text_rows(rows: &[RawRow]) -> Vec<Vec<Option<&str>>> {
        rows.iter()
            .map(|r| r.iter().map(|c| c.as_deref()).collect())
            .collect()
    }

    #[test]
    fn simple_two_by_two_grid() {
        let edges = grid(&[50.0, 150.0, 250.0], &[100.0, 120.0, 140.0]);
        let mut glyphs = word("Name", 55.0, 105.0);
        glyphs.extend(word("Qty", 155.0, 105.0));
        glyphs.extend(word("Semen", 55.0, 125.0));
        glyphs.extend(word("1,200", 155.0, 125.0));

        let tables = extract_page_tables(&edges, &glyphs, &settings());
        assert_eq!(tables.len(), 1);
        assert_eq!(
            text_rows(&tables[0]),
            vec![
                vec![Some("Name"), Some("Qty")],
                vec![Some("Semen"), Some("1,200")],
            ]
        );
    }

    #[test]
    fn empty_cell_is_empty_string() {
        let edges = grid(&[0.0, 40.0, 80.0], &[0.0, 20.0, 40.0]);
        let glyphs = word("x", 5.0, 5.0);
        let tables = extract_page_tables(&edges, &glyphs, &settings());
        assert_eq!(
            text_rows(&tables[0]),
            vec![vec![Some("x"), Some("")], vec![Some(""), Some("")]]
        );
    }

    #[test]
    fn spanning_cell_leaves_missing_slot() {
        // Top row is one cell spanning both columns.
        let mut edges = vec![
            Edge::horizontal(100.0, 50.0, 250.0),
            Edge::horizontal(120.0, 50.0, 250.0),
            Edge::horizontal(140.0, 50.0, 250.0),
            Edge::vertical(50.0, 100.0, 140.0),
            Edge::vertical(250.0, 100.0, 140.0),
        ];
        edges.push(Edge::vertical(150.0, 120.0, 140.0));
        let mut glyphs = word("Title", 60.0, 105.0);
        glyphs.extend(word("a", 55.0, 125.0));
        glyphs.extend(word("b", 155.0, 125.0));

        let tables = extract_page_tables(&edges, &glyphs, &settings());
        assert_eq!(tables.len(), 1);
        assert_eq!(
            text_rows(&tables[0]),
            vec![vec![Some("Title"), None], vec![Some("a"), Some("b")]]
        );
    }

    #[test]
    fn tables_are_ordered_top_to_bottom() {
        let mut edges = grid(&[300.0, 350.0, 400.0], &[300.0, 320.0, 340.0]);
        edges.extend(grid(&[50.0, 100.0, 150.0], &[100.0, 120.0, 140.0]));
        let mut glyphs = word("low", 305.0, 305.0);
        glyphs.extend(word("high", 55.0, 105.0));

        let tables = extract_page_tables(&edges, &glyphs, &settings());
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0][0][0].as_deref(), Some("high"));
        assert_eq!(tables[1][0][0].as_deref(), Some("low"));
    }

    #[test]
    fn lone_rectangle_is_not_a_table() {
        let edges = Edge::rect_sides(&BBox::new(10.0, 10.0, 200.0, 50.0));
        assert!(find_tables(&edges, &settings()).is_empty());
    }

    #[test]
    fn no_edges_no_tables() {
        let glyphs = word("just text", 10.0, 10.0);
        assert!(extract_page_tables(&[], &glyphs, &settings()).is_empty());
    }

    #[test]
    fn nearly_aligned_lines_snap_together() {
        // Second horizontal rule is 1.5pt off; it must still close the grid.
        let edges = vec![
            Edge::horizontal(100.0, 0.0, 100.0),
            Edge::horizontal(121.5, 0.0, 50.0),
            Edge::horizontal(120.0, 50.0, 100.0),
            Edge::vertical(0.0, 100.0, 121.0),
            Edge::vertical(50.0, 100.0, 121.0),
            Edge::vertical(100.0, 100.0, 121.0),
        ];
        let tables = find_tables(&edges, &settings());
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].cells.len(), 2);
    }

    #[test]
    fn merge_axis_joins_small_gaps_only() {
        let s = settings();
        let joined = merge_axis(
            vec![
                Edge::horizontal(10.0, 0.0, 50.0),
                Edge::horizontal(10.0, 52.0, 100.0),
            ],
            &s,
        );
        assert_eq!(joined, vec![Edge::horizontal(10.0, 0.0, 100.0)]);

        let apart = merge_axis(
            vec![
                Edge::horizontal(10.0, 0.0, 50.0),
                Edge::horizontal(10.0, 60.0, 100.0),
            ],
            &s,
        );
        assert_eq!(apart.len(), 2);
    }

    #[test]
    fn merge_axis_drops_short_edges() {
        let merged = merge_axis(vec![Edge::vertical(5.0, 0.0, 2.0)], &settings());
        assert!(merged.is_empty());
    }

    #[test]
    fn segment_classification() {
        let h = Edge::from_segment((0.0, 10.0), (40.0, 10.5), 1.0).unwrap();
        assert_eq!(h.orientation, Orientation::Horizontal);
        assert_eq!(h.start, 0.0);
        assert_eq!(h.end, 40.0);

        let v = Edge::from_segment((7.0, 30.0), (7.0, 5.0), 1.0).unwrap();
        assert_eq!(v.orientation, Orientation::Vertical);
        assert_eq!((v.start, v.end), (5.0, 30.0));

        assert!(Edge::from_segment((0.0, 0.0), (10.0, 10.0), 1.0).is_none());
    }

    #[test]
    fn text_layout_words_and_lines() {
        let mut glyphs = word("Kab.", 0.0, 0.0);
        glyphs.extend(word("Bogor", 30.0, 0.5));
        glyphs.extend(word("Barat", 0.0, 12.0));
        let refs: Vec<&Glyph> = glyphs.iter().collect();
        assert_eq!(text_from_glyphs(refs, &settings()), "Kab. Bogor\nBarat");
    }

    #[test]
    fn text_layout_whitespace_glyph_splits_words() {
        let glyphs = word("a b", 0.0, 0.0);
        let refs: Vec<&Glyph> = glyphs.iter().collect();
        assert_eq!(text_from_glyphs(refs, &settings()), "a b");
    }
}
