//! # Position Mapping
//!
//! Every edit produces a [`StepMap`] describing the replaced range. A
//! [`Mapping`] chains step maps so that positions recorded before a batch of
//! edits can be translated into the document produced by the batch.

/// Which side of an insertion a position sticks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Assoc {
    Left,
    #[default]
    Right,
}

/// `deleted` positions starting at `pos` were replaced by `inserted` positions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepMap {
    pub pos: usize,
    pub deleted: usize,
    pub inserted: usize,
}

impl StepMap {
    pub fn new(pos: usize, deleted: usize, inserted: usize) -> Self {
        Self {
            pos,
            deleted,
            inserted,
        }
    }

    /// A step that did not move any position (attribute updates)
    pub fn identity() -> Self {
        Self::new(0, 0, 0)
    }

    pub fn is_identity(&self) -> bool {
        self.deleted == 0 && self.inserted == 0
    }

    pub fn map(&self, pos: usize, assoc: Assoc) -> usize {
        if self.is_identity() {
            return pos;
        }

        let start = self.pos;
        let end = self.pos + self.deleted;

        if pos < start {
            return pos;
        }
        if pos > end {
            return pos - self.deleted + self.inserted;
        }

        let side = if self.deleted == 0 {
            assoc
        } else if pos == start {
            Assoc::Left
        } else if pos == end {
            Assoc::Right
        } else {
            assoc
        };

        match side {
            Assoc::Left => start,
            Assoc::Right => start + self.inserted,
        }
    }

    /// Whether the position sat strictly inside a deleted range
    pub fn deletes(&self, pos: usize) -> bool {
        self.deleted > 0 && pos > self.pos && pos < self.pos + self.deleted
    }
}

/// An ordered chain of step maps
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mapping {
    maps: Vec<StepMap>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, map: StepMap) {
        if !map.is_identity() {
            self.maps.push(map);
        }
    }

    pub fn maps(&self) -> &[StepMap] {
        &self.maps
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    /// Map a position through every step, sticking to the right of insertions
    pub fn map(&self, pos: usize) -> usize {
        self.map_with(pos, Assoc::Right)
    }

    pub fn map_with(&self, pos: usize, assoc: Assoc) -> usize {
        self.maps.iter().fold(pos, |pos, map| map.map(pos, assoc))
    }

    /// Map a position, reporting whether some step deleted the content around it
    pub fn map_result(&self, pos: usize) -> (usize, bool) {
        let mut deleted = false;
        let mapped = self.maps.iter().fold(pos, |pos, map| {
            deleted |= map.deletes(pos);
            map.map(pos, Assoc::Right)
        });
        (mapped, deleted)
    }
}
