//! Traversal filters derived from agent capabilities

use movemap::{CellFlags, QueryFilter};

use crate::collaborators::{PathAgent, TerrainService};
use crate::types::{AgentKind, Capabilities};

/// Builds the base filter of an agent
///
/// Creatures walk on ground when they can walk and cross every liquid when
/// they can swim. Players are limited to ground and water.
pub fn agent_filter(kind: AgentKind, capabilities: Capabilities) -> QueryFilter {
    let include = match kind {
        AgentKind::Creature => {
            let mut flags = CellFlags::empty();
            if capabilities.can_walk {
                flags |= CellFlags::GROUND;
            }
            if capabilities.can_swim {
                flags |= CellFlags::WATER | CellFlags::MAGMA | CellFlags::SLIME;
            }
            flags
        }
        AgentKind::Player => CellFlags::GROUND | CellFlags::WATER,
    };

    let mut filter = QueryFilter::new(include);
    filter.set_exclude_flags(CellFlags::empty());
    filter
}

/// Widens the filter to the medium the agent currently stands in
///
/// An agent pushed into liquid it cannot normally cross must still be able to
/// path out of it.
pub fn refresh_filter(filter: &mut QueryFilter, agent: &dyn PathAgent, terrain: &dyn TerrainService) {
    if agent.is_in_water() || agent.is_under_water() {
        let medium = terrain.terrain_medium_at(agent.position());
        filter.set_include_flags(filter.include_flags() | medium.cell_flags());
    }
}
