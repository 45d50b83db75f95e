//! Cell corridor kept between path computations
//!
//! The corridor is the chain of cells the last search produced. Keeping it
//! lets the next computation reuse the part the agent is still on instead of
//! searching from scratch.

use movemap::CellHandle;

/// Bounded chain of connected cells from a start cell to an end cell
#[derive(Debug, Clone, PartialEq)]
pub struct Corridor {
    cells: Vec<CellHandle>,
    capacity: usize,
}

impl Corridor {
    /// Creates an empty corridor
    pub fn new(capacity: usize) -> Self {
        Self {
            cells: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn cells(&self) -> &[CellHandle] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn first(&self) -> Option<CellHandle> {
        self.cells.first().copied()
    }

    pub fn last(&self) -> Option<CellHandle> {
        self.cells.last().copied()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Replaces the corridor with a single cell
    pub fn set_single(&mut self, cell: CellHandle) {
        self.cells.clear();
        self.cells.push(cell);
    }

    /// Replaces the corridor with a search result, truncated to capacity
    pub fn replace(&mut self, mut cells: Vec<CellHandle>) {
        debug_assert!(cells.iter().all(|c| c.is_valid()), "corridor holds an invalid cell");
        cells.truncate(self.capacity);
        self.cells = cells;
    }

    /// Index of the first occurrence of `cell`
    pub fn find_forward(&self, cell: CellHandle) -> Option<usize> {
        debug_assert!(self.cells.iter().all(|c| c.is_valid()), "corridor holds an invalid cell");
        self.cells.iter().position(|c| *c == cell)
    }

    /// Index of the last occurrence of `cell` strictly after `after`
    pub fn find_backward(&self, cell: CellHandle, after: usize) -> Option<usize> {
        (after + 1..self.cells.len())
            .rev()
            .find(|&i| self.cells[i] == cell)
    }

    /// Keeps the inclusive range `start..=end`
    pub fn keep_range(&mut self, start: usize, end: usize) {
        debug_assert!(start <= end && end < self.cells.len());
        self.cells.truncate(end + 1);
        self.cells.drain(..start);
    }

    /// Keeps `len` cells beginning at `start`
    pub fn keep_prefix(&mut self, start: usize, len: usize) {
        self.cells.drain(..start.min(self.cells.len()));
        self.cells.truncate(len);
    }

    /// Shortens the corridor to `len` cells
    pub fn truncate(&mut self, len: usize) {
        self.cells.truncate(len);
    }

    /// Appends a search result that starts at the current last cell
    ///
    /// The shared seam cell is kept once. Returns the new length.
    pub fn stitch(&mut self, suffix: &[CellHandle]) -> usize {
        debug_assert!(suffix.first().copied() == self.last(), "suffix does not start at the seam");
        let room = self.capacity.saturating_sub(self.cells.len());
        self.cells.extend(suffix.iter().skip(1).take(room));
        self.cells.len()
    }
}

/// Number of cells kept when only the start of the corridor is reused
pub fn prefix_length(remaining: usize, retention: f32) -> usize {
    (remaining as f32 * retention + 0.5).floor() as usize
}

/// Merges the cells visited by a surface move into the front of a corridor
///
/// Finds the furthest corridor cell that was also visited, drops the corridor
/// up to it and puts the visited cells from there on in front, so the
/// corridor starts at the cell the move ended in. Returns the new length.
pub fn merge_corridor_start_moved(
    path: &mut Vec<CellHandle>,
    max_path: usize,
    visited: &[CellHandle],
) -> usize {
    let mut furthest = None;

    // Find furthest common cell
    for (i, cell) in path.iter().enumerate().rev() {
        if let Some(j) = visited.iter().position(|v| v == cell) {
            furthest = Some((i, j));
            break;
        }
    }

    let Some((furthest_path, furthest_visited)) = furthest else {
        return path.len();
    };

    // Visited cells from the match onwards, in reverse order, replace the
    // corridor up to and including the match.
    let req = visited.len() - furthest_visited;
    let orig = (furthest_path + 1).min(path.len());
    let mut size = path.len().saturating_sub(orig);
    if req + size > max_path {
        size = max_path.saturating_sub(req);
    }

    let mut merged: Vec<CellHandle> = visited[furthest_visited..]
        .iter()
        .rev()
        .take(max_path)
        .copied()
        .collect();
    merged.extend_from_slice(&path[orig..orig + size]);
    *path = merged;
    path.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handles(ids: &[u64]) -> Vec<CellHandle> {
        ids.iter().map(|&i| CellHandle::new(i)).collect()
    }

    #[test]
    fn test_find_and_keep_range() {
        let mut corridor = Corridor::new(74);
        corridor.replace(handles(&[1, 2, 3, 4, 5, 6]));

        let start = corridor.find_forward(CellHandle::new(2)).unwrap();
        let end = corridor.find_backward(CellHandle::new(5), start).unwrap();
        corridor.keep_range(start, end);
        assert_eq!(corridor.cells(), handles(&[2, 3, 4, 5]).as_slice());
    }

    #[test]
    fn test_find_backward_skips_start_and_before() {
        let mut corridor = Corridor::new(74);
        corridor.replace(handles(&[7, 8, 9]));
        assert_eq!(corridor.find_backward(CellHandle::new(8), 1), None);
        assert_eq!(corridor.find_backward(CellHandle::new(7), 0), None);
        assert_eq!(corridor.find_backward(CellHandle::new(9), 1), Some(2));
    }

    #[test]
    fn test_prefix_and_stitch() {
        let mut corridor = Corridor::new(6);
        corridor.replace(handles(&[1, 2, 3, 4, 5, 6]));

        let keep = prefix_length(corridor.len() - 1, 0.8);
        assert_eq!(keep, 4);
        corridor.keep_prefix(1, keep);
        assert_eq!(corridor.cells(), handles(&[2, 3, 4, 5]).as_slice());

        let len = corridor.stitch(&handles(&[5, 10, 11, 12]));
        assert_eq!(len, 6);
        assert_eq!(corridor.cells(), handles(&[2, 3, 4, 5, 10, 11]).as_slice());
    }

    #[test]
    fn test_prefix_length_rounds() {
        assert_eq!(prefix_length(1, 0.8), 1);
        assert_eq!(prefix_length(2, 0.8), 2);
        assert_eq!(prefix_length(3, 0.8), 2);
        assert_eq!(prefix_length(10, 0.8), 8);
    }

    #[test]
    fn test_merge_start_moved() {
        let mut path = handles(&[1, 2, 3, 4]);
        let visited = handles(&[1, 2, 3]);
        let n = merge_corridor_start_moved(&mut path, 74, &visited);
        assert_eq!(n, 2);
        assert_eq!(path, handles(&[3, 4]));
    }

    #[test]
    fn test_merge_keeps_sidestep_cells() {
        // The move left the corridor through cell 9 and came back in cell 2.
        let mut path = handles(&[1, 2, 3]);
        let visited = handles(&[1, 9, 2]);
        merge_corridor_start_moved(&mut path, 74, &visited);
        assert_eq!(path, handles(&[2, 3]));

        let mut path = handles(&[1, 2, 3]);
        let visited = handles(&[1, 9]);
        merge_corridor_start_moved(&mut path, 74, &visited);
        assert_eq!(path, handles(&[9, 1, 2, 3]));
    }

    #[test]
    fn test_merge_without_overlap_keeps_path() {
        let mut path = handles(&[1, 2, 3]);
        let n = merge_corridor_start_moved(&mut path, 74, &handles(&[7, 8]));
        assert_eq!(n, 3);
        assert_eq!(path, handles(&[1, 2, 3]));
    }
}
