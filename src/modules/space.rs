use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::modules::error::{SimError, SimResult};
use crate::modules::time::AgentId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub const fn origin() -> Self {
        Self { x: 0, y: 0 }
    }

    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Chebyshev distance check, ignoring wraparound.
    pub fn within_range(self, other: Position, range: i32) -> bool {
        let dx = (self.x - other.x).abs();
        let dy = (self.y - other.y).abs();
        dx <= range && dy <= range
    }
}

impl From<(i32, i32)> for Position {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

/// Which adjacent cells count as neighbors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Neighborhood {
    /// The 8 surrounding cells (Chebyshev radius).
    #[default]
    Moore,
    /// The 4 orthogonal cells (Manhattan radius).
    VonNeumann,
}

/// Lazy walk over every coordinate of a grid, `x` outer and `y` inner:
/// `(0,0), (0,1), .., (0,h-1), (1,0), ..`.
#[derive(Clone, Debug)]
pub struct CoordIter {
    width: usize,
    height: usize,
    next: usize,
}

impl Iterator for CoordIter {
    type Item = Position;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.width * self.height {
            return None;
        }
        let x = self.next / self.height;
        let y = self.next % self.height;
        self.next += 1;
        Some(Position::new(x as i32, y as i32))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.width * self.height).saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for CoordIter {}

/// Rectangular grid where each cell holds any number of agents.
///
/// Occupants of a cell are kept in placement order, which is also the order
/// rendering draws them in. Every agent on the grid lives in exactly one cell:
/// placing an agent that is already on the grid fails with `DuplicateAgent`.
#[derive(Debug, Clone)]
pub struct MultiGrid {
    width: usize,
    height: usize,
    torus: bool,
    // Indexed by `x * height + y`; keys are placement sequence numbers.
    cells: Vec<BTreeMap<u64, AgentId>>,
    locations: HashMap<AgentId, (Position, u64)>,
    next_seq: u64,
}

impl MultiGrid {
    pub fn new(width: usize, height: usize, torus: bool) -> SimResult<Self> {
        if width == 0 || height == 0 {
            return Err(SimError::range(format!(
                "grid dimensions must be positive, got {}x{}",
                width, height
            )));
        }
        if width > i32::MAX as usize || height > i32::MAX as usize {
            return Err(SimError::range(format!(
                "grid dimensions {}x{} exceed coordinate range",
                width, height
            )));
        }

        Ok(Self {
            width,
            height,
            torus,
            cells: vec![BTreeMap::new(); width * height],
            locations: HashMap::new(),
            next_seq: 0,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_torus(&self) -> bool {
        self.torus
    }

    pub fn out_of_bounds(&self, pos: Position) -> bool {
        pos.x < 0 || pos.y < 0 || pos.x as usize >= self.width || pos.y as usize >= self.height
    }

    /// Wrap a position onto the torus regardless of the grid's topology flag.
    pub fn torus_adj(&self, pos: Position) -> Position {
        Position {
            x: pos.x.rem_euclid(self.width as i32),
            y: pos.y.rem_euclid(self.height as i32),
        }
    }

    /// Map a position onto a valid cell: wrapped on a torus, rejected when
    /// outside a bounded grid.
    pub fn normalize(&self, pos: Position) -> SimResult<Position> {
        if self.torus {
            return Ok(self.torus_adj(pos));
        }
        if self.out_of_bounds(pos) {
            return Err(SimError::OutOfBounds {
                position: pos,
                width: self.width,
                height: self.height,
            });
        }
        Ok(pos)
    }

    fn cell_index(&self, pos: Position) -> usize {
        pos.x as usize * self.height + pos.y as usize
    }

    pub fn coord_iter(&self) -> CoordIter {
        CoordIter {
            width: self.width,
            height: self.height,
            next: 0,
        }
    }

    /// Place an agent, returning the normalized cell it landed in. An agent
    /// already on the grid has to be moved instead.
    pub fn place_agent(&mut self, agent_id: AgentId, pos: Position) -> SimResult<Position> {
        let pos = self.normalize(pos)?;
        if self.locations.contains_key(&agent_id) {
            return Err(SimError::DuplicateAgent(agent_id));
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        let idx = self.cell_index(pos);
        self.cells[idx].insert(seq, agent_id);
        self.locations.insert(agent_id, (pos, seq));
        Ok(pos)
    }

    /// Take an agent off the grid, returning the cell it was in.
    pub fn remove_agent(&mut self, agent_id: AgentId) -> SimResult<Position> {
        let (pos, seq) = self
            .locations
            .remove(&agent_id)
            .ok_or(SimError::NotFound(agent_id))?;
        let idx = self.cell_index(pos);
        self.cells[idx].remove(&seq);
        Ok(pos)
    }

    /// Move an agent to another cell; it becomes the last occupant there.
    /// Nothing changes if the target is invalid.
    pub fn move_agent(&mut self, agent_id: AgentId, pos: Position) -> SimResult<Position> {
        let target = self.normalize(pos)?;
        self.remove_agent(agent_id)?;
        self.place_agent(agent_id, target)
    }

    pub fn location_of(&self, agent_id: AgentId) -> Option<Position> {
        self.locations.get(&agent_id).map(|(pos, _)| *pos)
    }

    pub fn contains(&self, agent_id: AgentId) -> bool {
        self.locations.contains_key(&agent_id)
    }

    pub fn agent_count(&self) -> usize {
        self.locations.len()
    }

    /// Occupants of one cell in placement order.
    pub fn iter_cell_contents(&self, pos: Position) -> SimResult<impl Iterator<Item = AgentId>> {
        let pos = self.normalize(pos)?;
        Ok(self.cells[self.cell_index(pos)].values().copied())
    }

    pub fn cell_contents(&self, pos: Position) -> SimResult<Vec<AgentId>> {
        Ok(self.iter_cell_contents(pos)?.collect())
    }

    pub fn is_cell_empty(&self, pos: Position) -> SimResult<bool> {
        let pos = self.normalize(pos)?;
        Ok(self.cells[self.cell_index(pos)].is_empty())
    }

    /// Empty cells in coordinate order.
    pub fn empties(&self) -> Vec<Position> {
        self.coord_iter()
            .filter(|pos| self.cells[self.cell_index(*pos)].is_empty())
            .collect()
    }

    /// Cells around `pos` within `radius`, wrapped on a torus and clipped on a
    /// bounded grid. Each cell appears once. The center is only returned when
    /// `include_center` is set, even if wraparound maps an offset back onto it.
    pub fn neighborhood(
        &self,
        pos: Position,
        kind: Neighborhood,
        include_center: bool,
        radius: u32,
    ) -> SimResult<Vec<Position>> {
        let center = self.normalize(pos)?;
        // no cell lies further than width + height steps away
        let span = i32::try_from(self.width + self.height).unwrap_or(i32::MAX);
        let r = i32::try_from(radius).unwrap_or(i32::MAX).min(span);
        let mut seen = HashSet::new();
        let mut cells = Vec::new();

        if include_center {
            seen.insert(center);
            cells.push(center);
        }

        for dx in -r..=r {
            for dy in -r..=r {
                if dx == 0 && dy == 0 {
                    continue;
                }
                if kind == Neighborhood::VonNeumann && dx.abs() + dy.abs() > r {
                    continue;
                }
                let candidate = center.offset(dx, dy);
                let cell = if self.torus {
                    self.torus_adj(candidate)
                } else if self.out_of_bounds(candidate) {
                    continue;
                } else {
                    candidate
                };
                if cell == center && !include_center {
                    continue;
                }
                if seen.insert(cell) {
                    cells.push(cell);
                }
            }
        }

        Ok(cells)
    }

    /// Agents in the neighborhood of `pos`, cell by cell in neighborhood order.
    pub fn neighbors(
        &self,
        pos: Position,
        kind: Neighborhood,
        include_center: bool,
        radius: u32,
    ) -> SimResult<Vec<AgentId>> {
        let cells = self.neighborhood(pos, kind, include_center, radius)?;
        Ok(cells
            .into_iter()
            .flat_map(|cell| self.cells[self.cell_index(cell)].values().copied())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coord_iter_is_x_major_and_restartable() {
        let grid = MultiGrid::new(2, 3, false).unwrap();
        let coords: Vec<_> = grid.coord_iter().map(|p| (p.x, p.y)).collect();
        assert_eq!(coords, vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]);

        let iter = grid.coord_iter();
        assert_eq!(iter.len(), 6);
        assert_eq!(iter.clone().count(), iter.count());
    }

    #[test]
    fn zero_sized_grid_is_rejected() {
        assert!(matches!(MultiGrid::new(0, 4, true), Err(SimError::Range(_))));
    }

    #[test]
    fn bounded_grid_rejects_outside_positions() {
        let mut grid = MultiGrid::new(3, 3, false).unwrap();
        let err = grid.place_agent(1, Position::new(3, 0)).unwrap_err();
        assert!(matches!(err, SimError::OutOfBounds { width: 3, height: 3, .. }));
        assert!(grid.place_agent(1, Position::new(-1, 2)).is_err());
        assert_eq!(grid.agent_count(), 0);
    }

    #[test]
    fn torus_wraps_positions() {
        let mut grid = MultiGrid::new(4, 5, true).unwrap();
        let placed = grid.place_agent(7, Position::new(-1, 12)).unwrap();
        assert_eq!(placed, Position::new(3, 2));
        assert_eq!(grid.location_of(7), Some(Position::new(3, 2)));
    }

    #[test]
    fn cell_keeps_placement_order() {
        let mut grid = MultiGrid::new(2, 2, true).unwrap();
        grid.place_agent(5, Position::origin()).unwrap();
        grid.place_agent(2, Position::origin()).unwrap();
        grid.place_agent(9, Position::origin()).unwrap();
        assert_eq!(grid.cell_contents(Position::origin()).unwrap(), vec![5, 2, 9]);

        grid.remove_agent(2).unwrap();
        assert_eq!(grid.cell_contents(Position::origin()).unwrap(), vec![5, 9]);
    }

    #[test]
    fn placing_twice_is_rejected() {
        let mut grid = MultiGrid::new(2, 2, true).unwrap();
        grid.place_agent(4, Position::origin()).unwrap();
        assert_eq!(
            grid.place_agent(4, Position::new(1, 1)),
            Err(SimError::DuplicateAgent(4))
        );
        assert_eq!(grid.location_of(4), Some(Position::origin()));
        assert!(grid.is_cell_empty(Position::new(1, 1)).unwrap());
    }

    #[test]
    fn removing_missing_agent_fails() {
        let mut grid = MultiGrid::new(2, 2, true).unwrap();
        assert_eq!(grid.remove_agent(11), Err(SimError::NotFound(11)));
    }

    #[test]
    fn move_to_invalid_cell_leaves_agent_in_place() {
        let mut grid = MultiGrid::new(3, 3, false).unwrap();
        grid.place_agent(1, Position::new(1, 1)).unwrap();
        assert!(grid.move_agent(1, Position::new(5, 5)).is_err());
        assert_eq!(grid.location_of(1), Some(Position::new(1, 1)));

        grid.move_agent(1, Position::new(2, 0)).unwrap();
        assert!(grid.is_cell_empty(Position::new(1, 1)).unwrap());
        assert_eq!(grid.cell_contents(Position::new(2, 0)).unwrap(), vec![1]);
    }

    #[test]
    fn empties_tracks_occupancy() {
        let mut grid = MultiGrid::new(2, 2, false).unwrap();
        grid.place_agent(1, Position::new(0, 1)).unwrap();
        grid.place_agent(2, Position::new(1, 0)).unwrap();
        assert_eq!(
            grid.empties(),
            vec![Position::new(0, 0), Position::new(1, 1)]
        );
    }

    #[test]
    fn neighborhood_sizes() {
        let grid = MultiGrid::new(5, 5, false).unwrap();
        let center = Position::new(2, 2);
        assert_eq!(grid.neighborhood(center, Neighborhood::Moore, false, 1).unwrap().len(), 8);
        assert_eq!(grid.neighborhood(center, Neighborhood::Moore, true, 1).unwrap().len(), 9);
        assert_eq!(
            grid.neighborhood(center, Neighborhood::VonNeumann, false, 1).unwrap().len(),
            4
        );
        assert_eq!(
            grid.neighborhood(center, Neighborhood::VonNeumann, false, 2).unwrap().len(),
            12
        );

        let corner = Position::origin();
        assert_eq!(grid.neighborhood(corner, Neighborhood::Moore, false, 1).unwrap().len(), 3);
    }

    #[test]
    fn huge_radius_covers_the_whole_grid() {
        let bounded = MultiGrid::new(5, 4, false).unwrap();
        for kind in [Neighborhood::Moore, Neighborhood::VonNeumann] {
            let cells = bounded
                .neighborhood(Position::origin(), kind, true, u32::MAX)
                .unwrap();
            assert_eq!(cells.len(), 20);
        }

        let torus = MultiGrid::new(3, 3, true).unwrap();
        let cells = torus
            .neighborhood(Position::new(1, 1), Neighborhood::Moore, false, i32::MAX as u32)
            .unwrap();
        assert_eq!(cells.len(), 8);
    }

    #[test]
    fn torus_neighborhood_wraps_and_dedupes() {
        let grid = MultiGrid::new(5, 5, true).unwrap();
        let cells = grid
            .neighborhood(Position::origin(), Neighborhood::Moore, false, 1)
            .unwrap();
        assert_eq!(cells.len(), 8);
        assert!(cells.contains(&Position::new(4, 4)));

        let tiny = MultiGrid::new(2, 2, true).unwrap();
        let cells = tiny
            .neighborhood(Position::origin(), Neighborhood::Moore, false, 1)
            .unwrap();
        assert_eq!(cells.len(), 3);
        assert!(!cells.contains(&Position::origin()));
    }

    #[test]
    fn neighbors_lists_occupants() {
        let mut grid = MultiGrid::new(3, 3, true).unwrap();
        grid.place_agent(1, Position::new(1, 1)).unwrap();
        grid.place_agent(2, Position::new(0, 1)).unwrap();
        grid.place_agent(3, Position::new(2, 2)).unwrap();

        let around = grid
            .neighbors(Position::new(1, 1), Neighborhood::VonNeumann, false, 1)
            .unwrap();
        assert_eq!(around, vec![2]);

        let mut all = grid
            .neighbors(Position::new(1, 1), Neighborhood::Moore, true, 1)
            .unwrap();
        all.sort();
        assert_eq!(all, vec![1, 2, 3]);
    }
}
