use std::{collections::HashMap, sync::Arc};

use rayon::prelude::*;

use crate::{
    network::{Lane, LaneLookup},
    shared::geo::{Coordinate, Distance, GRID_CELL_SIZE},
};

type IdToIndex = HashMap<Arc<str>, usize>;
type CellToIndexes = HashMap<(i32, i32), Box<[usize]>>;

/// In-memory spatial index over the network's lanes.
///
/// Lanes are hashed into fixed-size grid cells by their representative
/// position, so a radius query only touches the cells the radius can reach
/// instead of scanning every lane.
#[derive(Debug, Clone, Default)]
pub struct LaneGrid {
    pub lanes: Box<[Lane]>,
    lane_lookup: Arc<IdToIndex>,
    cells: Arc<CellToIndexes>,
}

impl LaneGrid {
    pub fn new(lanes: Vec<Lane>) -> Self {
        let mut lanes = lanes;
        let mut lane_lookup: IdToIndex = HashMap::new();
        let mut cells: HashMap<(i32, i32), Vec<usize>> = HashMap::new();
        lanes.iter_mut().enumerate().for_each(|(i, lane)| {
            lane.index = i as u32;
            lane_lookup.insert(lane.id.clone(), i);
            cells.entry(lane.position().to_grid()).or_default().push(i);
        });
        let cells: CellToIndexes = cells
            .into_iter()
            .map(|(cell, indexes)| (cell, indexes.into()))
            .collect();
        Self {
            lanes: lanes.into(),
            lane_lookup: lane_lookup.into(),
            cells: cells.into(),
        }
    }
}

impl LaneLookup for LaneGrid {
    fn lane_by_id(&self, id: &str) -> Option<&Lane> {
        let index = self.lane_lookup.get(id)?;
        Some(&self.lanes[*index])
    }

    fn lanes_within(&self, coordinate: &Coordinate, radius: Distance) -> Vec<&Lane> {
        let reach = (radius / GRID_CELL_SIZE).as_meters().ceil().abs() as i32;
        let (origin_x, origin_y) = coordinate.to_grid();
        (-reach..=reach)
            .into_par_iter()
            .flat_map(|x| {
                (-reach..=reach)
                    .flat_map(move |y| {
                        let cell = (origin_x + x, origin_y + y);
                        if let Some(lane_idxs) = self.cells.get(&cell) {
                            lane_idxs
                                .iter()
                                .map(|i| &self.lanes[*i])
                                .filter(|lane| {
                                    lane.position().euclidean_distance(coordinate) <= radius
                                })
                                .collect::<Vec<_>>()
                        } else {
                            Vec::new()
                        }
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}
