//! Polyline storage: points in frame coordinates, gap markers, and the
//! fixed-capacity ring that holds them.

use serde::Serialize;

/// Maximum number of samples kept per polyline.
pub(crate) const POLYLINE_CAPACITY: usize = 512;

/// Position in frame pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(into = "[i32; 2]")]
pub(crate) struct Point {
    pub(crate) x: i32,
    pub(crate) y: i32,
}

impl Point {
    pub(crate) const ORIGIN: Point = Point { x: 0, y: 0 };

    pub(crate) const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<Point> for [i32; 2] {
    fn from(point: Point) -> Self {
        [point.x, point.y]
    }
}

/// One time step of a polyline. `Gap` records a cycle with no detection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum Sample {
    #[default]
    Gap,
    At(Point),
}

impl From<Option<Point>> for Sample {
    fn from(detection: Option<Point>) -> Self {
        detection.map_or(Sample::Gap, Sample::At)
    }
}

impl Sample {
    pub(crate) fn point(self) -> Option<Point> {
        match self {
            Sample::At(point) => Some(point),
            Sample::Gap => None,
        }
    }
}

/// Fixed-capacity ring of samples. Pushing into a full ring overwrites the
/// oldest sample.
#[derive(Clone, Debug)]
pub(crate) struct PointSequence {
    slots: Box<[Sample]>,
    /// Index of the oldest sample.
    head: usize,
    len: usize,
}

impl Default for PointSequence {
    fn default() -> Self {
        Self::with_capacity(POLYLINE_CAPACITY)
    }
}

impl PointSequence {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![Sample::Gap; capacity.max(1)].into_boxed_slice(),
            head: 0,
            len: 0,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn push(&mut self, sample: Sample) {
        let capacity = self.capacity();
        if self.len < capacity {
            self.slots[(self.head + self.len) % capacity] = sample;
            self.len += 1;
        } else {
            self.slots[self.head] = sample;
            self.head = (self.head + 1) % capacity;
        }
    }

    /// Samples in chronological order, oldest first.
    pub(crate) fn iter(&self) -> impl Iterator<Item = Sample> + '_ {
        let capacity = self.capacity();
        (0..self.len).map(move |offset| self.slots[(self.head + offset) % capacity])
    }

    /// Line strokes between chronologically adjacent samples. Pairs touching a
    /// gap produce nothing.
    pub(crate) fn strokes(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        self.iter()
            .zip(self.iter().skip(1))
            .filter_map(|(from, to)| Some((from.point()?, to.point()?)))
    }
}
