use hashbrown::{HashMap, HashSet};
use serde::Deserialize;
use typed_builder::TypedBuilder;

use dualink_core::agent::AgentId;
use dualink_core::model::{Model, ModelSettings};

use crate::mobility::Point2D;

#[derive(Deserialize, Debug, Clone)]
pub struct ClusterSettings {
    pub max_range_m: f64,
    pub reliable_range_m: f64,
    pub reliability_decay_m: f64,
    pub min_reliability: f64,
    pub grid_cell_m: f64,
}

impl ModelSettings for ClusterSettings {}

/// Link reliability as a function of distance: full reliability inside the
/// reliable range, exponential decay beyond it.
pub fn reliability_at(settings: &ClusterSettings, distance_m: f64) -> f64 {
    if distance_m <= settings.reliable_range_m {
        1.0
    } else {
        (-(distance_m - settings.reliable_range_m) / settings.reliability_decay_m.max(1e-6)).exp()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct GridCell(i32, i32);

/// Uniform-grid spatial index over agent positions. Neighbor lookups only
/// inspect the grid cells overlapping the query radius.
#[derive(Clone, Debug, Default, TypedBuilder)]
pub struct Space {
    cell_size_m: f64,
    #[builder(default)]
    cell_to_agents: HashMap<GridCell, HashSet<AgentId>>,
    #[builder(default)]
    agent_to_cell: HashMap<AgentId, GridCell>,
    #[builder(default)]
    positions: HashMap<AgentId, Point2D>,
}

impl Space {
    pub fn new(cell_size_m: f64) -> Self {
        Self {
            cell_size_m: cell_size_m.max(1.0),
            cell_to_agents: HashMap::default(),
            agent_to_cell: HashMap::default(),
            positions: HashMap::default(),
        }
    }

    pub fn update_agent(&mut self, agent_id: AgentId, position: Point2D) {
        let grid_cell = self.grid_cell_of(&position);
        if let Some(old_cell) = self.agent_to_cell.get(&agent_id) {
            if *old_cell != grid_cell {
                if let Some(agents) = self.cell_to_agents.get_mut(old_cell) {
                    agents.remove(&agent_id);
                }
            }
        }
        self.cell_to_agents
            .entry(grid_cell)
            .or_default()
            .insert(agent_id);
        self.agent_to_cell.insert(agent_id, grid_cell);
        self.positions.insert(agent_id, position);
    }

    pub fn position_of(&self, agent_id: &AgentId) -> Option<&Point2D> {
        self.positions.get(agent_id)
    }

    /// All other agents within the given planar range, with their distances.
    pub fn neighbors_within(&self, agent_id: AgentId, range_m: f64) -> Vec<(AgentId, f64)> {
        let position = match self.positions.get(&agent_id) {
            Some(position) => *position,
            None => return Vec::new(),
        };
        let reach = (range_m / self.cell_size_m).ceil() as i32;
        let center = self.grid_cell_of(&position);
        let mut neighbors = Vec::new();
        for dx in -reach..=reach {
            for dy in -reach..=reach {
                let probe = GridCell(center.0 + dx, center.1 + dy);
                if let Some(agents) = self.cell_to_agents.get(&probe) {
                    for other in agents {
                        if *other == agent_id {
                            continue;
                        }
                        if let Some(other_position) = self.positions.get(other) {
                            let distance = position.distance_to(other_position);
                            if distance <= range_m {
                                neighbors.push((*other, distance));
                            }
                        }
                    }
                }
            }
        }
        neighbors.sort_by(|a, b| a.0.cmp(&b.0));
        neighbors
    }

    fn grid_cell_of(&self, position: &Point2D) -> GridCell {
        GridCell(
            (position.x / self.cell_size_m).floor() as i32,
            (position.y / self.cell_size_m).floor() as i32,
        )
    }
}

/// One PC5 neighbor of a vehicle within its cluster.
#[derive(Clone, Copy, Debug)]
pub struct Neighbor {
    pub id: AgentId,
    pub distance_m: f64,
    pub reliability: f64,
}

/// A vehicle's PC5 cluster for one time step. Derived state, rebuilt every
/// step from the positions and never persisted.
#[derive(Clone, Debug, Default)]
pub struct Cluster {
    pub neighbors: Vec<Neighbor>,
}

impl Cluster {
    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    pub fn contains(&self, agent_id: AgentId) -> bool {
        self.neighbors.iter().any(|neighbor| neighbor.id == agent_id)
    }
}

/// Rebuilds all clusters from the spatial index.
#[derive(Clone, Debug)]
pub struct ClusterModel {
    settings: ClusterSettings,
}

impl Model for ClusterModel {
    type Settings = ClusterSettings;

    fn with_settings(settings: &ClusterSettings) -> Self {
        if settings.max_range_m <= 0.0 || !(0.0..=1.0).contains(&settings.min_reliability) {
            log::error!("Invalid cluster settings.");
            panic!("Cluster range must be positive and min reliability in [0, 1].");
        }
        Self {
            settings: settings.clone(),
        }
    }
}

impl ClusterModel {
    pub fn settings(&self) -> &ClusterSettings {
        &self.settings
    }

    pub fn cluster_for(&self, space: &Space, agent_id: AgentId) -> Cluster {
        let neighbors = space
            .neighbors_within(agent_id, self.settings.max_range_m)
            .into_iter()
            .filter_map(|(id, distance_m)| {
                let reliability = reliability_at(&self.settings, distance_m);
                if reliability >= self.settings.min_reliability {
                    Some(Neighbor {
                        id,
                        distance_m,
                        reliability,
                    })
                } else {
                    None
                }
            })
            .collect();
        Cluster { neighbors }
    }

    pub fn build_all(&self, space: &Space, agents: &[AgentId]) -> HashMap<AgentId, Cluster> {
        agents
            .iter()
            .map(|agent_id| (*agent_id, self.cluster_for(space, *agent_id)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_settings() -> ClusterSettings {
        ClusterSettings {
            max_range_m: 300.0,
            reliable_range_m: 100.0,
            reliability_decay_m: 80.0,
            min_reliability: 0.5,
            grid_cell_m: 150.0,
        }
    }

    fn space_with(positions: &[(u64, f64, f64)]) -> Space {
        let mut space = Space::new(150.0);
        for (id, x, y) in positions {
            space.update_agent(AgentId::from(*id), Point2D { x: *x, y: *y });
        }
        space
    }

    #[test]
    fn reliability_is_one_inside_reliable_range() {
        let settings = test_settings();
        assert_eq!(reliability_at(&settings, 50.0), 1.0);
        assert_eq!(reliability_at(&settings, 100.0), 1.0);
        let far = reliability_at(&settings, 200.0);
        assert!(far < 1.0 && far > 0.0);
    }

    #[test]
    fn reliability_is_bounded() {
        let settings = test_settings();
        for distance in [0.0, 10.0, 100.0, 500.0, 5000.0] {
            let value = reliability_at(&settings, distance);
            assert!((0.0..=1.0).contains(&value));
        }
    }

    #[test]
    fn cluster_excludes_far_vehicles() {
        let model = ClusterModel::with_settings(&test_settings());
        let space = space_with(&[(1, 0.0, 0.0), (2, 80.0, 0.0), (3, 2000.0, 0.0)]);
        let cluster = model.cluster_for(&space, AgentId::from(1));
        assert!(cluster.contains(AgentId::from(2)));
        assert!(!cluster.contains(AgentId::from(3)));
    }

    #[test]
    fn cluster_membership_is_symmetric() {
        let model = ClusterModel::with_settings(&test_settings());
        let space = space_with(&[
            (1, 0.0, 0.0),
            (2, 90.0, 30.0),
            (3, 160.0, 10.0),
            (4, 900.0, 900.0),
        ]);
        let agents: Vec<AgentId> = (1..=4).map(AgentId::from).collect();
        let clusters = model.build_all(&space, &agents);
        for a in &agents {
            for b in &agents {
                if a == b {
                    continue;
                }
                let forward = clusters[a].contains(*b);
                let backward = clusters[b].contains(*a);
                assert_eq!(forward, backward, "asymmetric pair {} {}", a, b);
            }
        }
    }

    #[test]
    fn neighbor_query_crosses_grid_cells() {
        let space = space_with(&[(1, 149.0, 0.0), (2, 151.0, 0.0)]);
        let neighbors = space.neighbors_within(AgentId::from(1), 10.0);
        assert_eq!(neighbors.len(), 1);
        assert_eq!(neighbors[0].0, AgentId::from(2));
    }
}
