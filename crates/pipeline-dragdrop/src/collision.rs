//! Collision Resolution
//!
//! Pure geometry for deciding what a dragged card is over. Three strategies
//! run in priority order and their hits are concatenated:
//!
//! 1. pointer containment
//! 2. rectangle intersection (dragged card vs droppable)
//! 3. nearest corners
//!
//! Columns win over cards whenever any strategy hit a column, so a drop near
//! a column edge lands in the column instead of the nearest nested card.

/// Point in viewport coordinates
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.left && p.x <= self.right() && p.y >= self.top && p.y <= self.bottom()
    }

    pub fn translated(&self, dx: f64, dy: f64) -> Rect {
        Rect::new(self.left + dx, self.top + dy, self.width, self.height)
    }

    fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.left, self.top),
            Point::new(self.right(), self.top),
            Point::new(self.left, self.bottom()),
            Point::new(self.right(), self.bottom()),
        ]
    }

    fn intersection_area(&self, other: &Rect) -> f64 {
        let w = self.right().min(other.right()) - self.left.max(other.left);
        let h = self.bottom().min(other.bottom()) - self.top.max(other.top);
        if w > 0.0 && h > 0.0 {
            w * h
        } else {
            0.0
        }
    }
}

/// A measured drop target: a column or a card
#[derive(Clone, Debug, PartialEq)]
pub struct Droppable {
    pub id: String,
    pub rect: Rect,
}

impl Droppable {
    pub fn new(id: impl Into<String>, rect: Rect) -> Self {
        Self { id: id.into(), rect }
    }
}

/// Everything a strategy may look at
#[derive(Clone, Debug)]
pub struct CollisionInput<'a> {
    pub pointer: Option<Point>,
    /// Current rectangle of the dragged card
    pub active: Rect,
    pub droppables: &'a [Droppable],
}

fn mean_corner_distance(a: &Rect, b: &Rect) -> f64 {
    a.corners()
        .iter()
        .zip(b.corners().iter())
        .map(|(p, q)| p.distance(q))
        .sum::<f64>()
        / 4.0
}

fn sorted_ids(mut scored: Vec<(f64, &Droppable)>, descending: bool) -> Vec<String> {
    scored.sort_by(|a, b| {
        let ord = a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal);
        if descending {
            ord.reverse()
        } else {
            ord
        }
    });
    scored.into_iter().map(|(_, d)| d.id.clone()).collect()
}

/// Droppables containing the pointer, nearest corners first
pub fn pointer_within(input: &CollisionInput) -> Vec<String> {
    let Some(pointer) = input.pointer else {
        return Vec::new();
    };
    let scored = input
        .droppables
        .iter()
        .filter(|d| d.rect.contains(pointer))
        .map(|d| {
            let dist = d.rect.corners().iter().map(|c| c.distance(&pointer)).sum::<f64>() / 4.0;
            (dist, d)
        })
        .collect();
    sorted_ids(scored, false)
}

/// Droppables overlapping the dragged card, largest overlap ratio first
pub fn rect_intersection(input: &CollisionInput) -> Vec<String> {
    let scored = input
        .droppables
        .iter()
        .filter_map(|d| {
            let overlap = input.active.intersection_area(&d.rect);
            if overlap <= 0.0 {
                return None;
            }
            let ratio = overlap / (input.active.area() + d.rect.area() - overlap);
            Some((ratio, d))
        })
        .collect();
    sorted_ids(scored, true)
}

/// Every droppable, ordered by mean distance between matching corners
pub fn closest_corners(input: &CollisionInput) -> Vec<String> {
    let scored = input
        .droppables
        .iter()
        .map(|d| (mean_corner_distance(&input.active, &d.rect), d))
        .collect();
    sorted_ids(scored, false)
}

/// All strategy hits in priority order
pub fn detect(input: &CollisionInput) -> Vec<String> {
    let mut hits = pointer_within(input);
    hits.extend(rect_intersection(input));
    hits.extend(closest_corners(input));
    hits
}

/// Pick one drop target.
///
/// The first column hit wins; without any column hit the first raw hit is
/// returned (a card id, which the board maps to its parent column).
pub fn resolve_collision<S: AsRef<str>>(input: &CollisionInput, column_ids: &[S]) -> Option<String> {
    let hits = detect(input);
    let is_column = |id: &str| column_ids.iter().any(|c| c.as_ref() == id);

    hits.iter()
        .find(|id| is_column(id))
        .or_else(|| hits.first())
        .cloned()
}
