//! Fixed-point resolution of simultaneous moves.
//!
//! All proposals are applied at once, then every pass evaluates the agents
//! that are still displaced against one snapshot of the roster, and reverts
//! every illegal mover together. Reverted agents stand on the cell they came
//! from and are never evaluated again, so each reverting pass shrinks the set
//! of movers and the loop ends after at most one pass per active agent plus a
//! final clean pass.
//!
//! Two agents trading cells head-on count as a collision for both of them,
//! even though they end up on distinct cells once the moves are applied.

use tracing::{debug, trace};

use crate::infra::{GridWorldError, Position, Result};
use crate::sim::reward::{Evaluation, RewardTable, evaluate};
use crate::state::{AgentState, Grid};

/// Outcome of resolving one step's moves
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Final evaluation per agent; `None` for agents that were already done
    pub evaluations: Vec<Option<Evaluation>>,
    /// Agents whose move was reverted
    pub reverted: Vec<bool>,
    /// Evaluation passes it took to reach a consistent state
    pub passes: usize,
}

/// Apply `proposals` to the active agents and revert illegal moves until
/// the roster is consistent.
///
/// `proposals[i]` is ignored for agents that are done.
#[tracing::instrument(level = "trace", skip_all, fields(agents = agents.len()))]
pub fn resolve(
    grid: &Grid,
    agents: &mut [AgentState],
    proposals: &[Position],
    rewards: &RewardTable,
) -> Result<Resolution> {
    assert_eq!(proposals.len(), agents.len(), "one proposal per agent");

    let old: Vec<Position> = agents.iter().map(|a| a.pos()).collect();
    for (agent, proposal) in agents.iter_mut().zip(proposals) {
        if agent.is_active() {
            agent.position = Some(*proposal);
        }
    }

    let active = agents.iter().filter(|a| a.is_active()).count();
    let max_passes = active + 1;

    let mut evaluations: Vec<Option<Evaluation>> = vec![None; agents.len()];
    let mut reverted = vec![false; agents.len()];
    let mut pending: Vec<usize> = (0..agents.len()).filter(|&i| agents[i].is_active()).collect();
    let mut passes = 0;

    loop {
        passes += 1;
        if passes > max_passes {
            return Err(GridWorldError::ConflictUnresolved { passes: passes - 1 });
        }

        // Evaluate against a single snapshot, then commit
        let snapshot: &[AgentState] = &*agents;
        let fresh: Vec<(usize, Evaluation)> = pending
            .iter()
            .map(|&i| {
                let evaluation = evaluate(&snapshot[i], grid, snapshot, rewards);
                if !evaluation.illegal && swaps_with_other(i, snapshot, &old) {
                    (i, Evaluation::collision(rewards))
                } else {
                    (i, evaluation)
                }
            })
            .collect();

        let mut illegal = Vec::new();
        for (i, evaluation) in fresh {
            if evaluation.illegal {
                illegal.push(i);
            }
            evaluations[i] = Some(evaluation);
        }

        trace!("Pass {}: {} evaluated, {} illegal", passes, pending.len(), illegal.len());

        if illegal.is_empty() {
            break;
        }

        for &i in &illegal {
            debug!(
                "Reverting agent {} from {} to {}",
                agents[i].id,
                agents[i].pos(),
                old[i]
            );
            agents[i].position = Some(old[i]);
            reverted[i] = true;
        }

        pending = (0..agents.len())
            .filter(|&i| agents[i].is_active() && agents[i].pos() != old[i])
            .collect();
    }

    Ok(Resolution {
        evaluations,
        reverted,
        passes,
    })
}

/// Agent `i` moved onto another agent's previous cell while that agent
/// moved onto `i`'s previous cell.
fn swaps_with_other(i: usize, agents: &[AgentState], old: &[Position]) -> bool {
    let pos = agents[i].pos();
    if pos == old[i] {
        return false;
    }
    agents.iter().enumerate().any(|(j, other)| {
        j != i && other.is_active() && old[j] == pos && other.pos() == old[i]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::reward::Outcome;

    fn roster(cells: &[((i32, i32), (i32, i32))]) -> Vec<AgentState> {
        cells
            .iter()
            .enumerate()
            .map(|(id, (pos, goal))| {
                let mut a = AgentState::new(id);
                a.position = Some((*pos).into());
                a.goal = Some((*goal).into());
                a
            })
            .collect()
    }

    fn positions(agents: &[AgentState]) -> Vec<Position> {
        agents.iter().map(|a| a.pos()).collect()
    }

    #[test]
    fn test_no_conflict_single_pass() {
        let grid = Grid::new(5, 5);
        let mut agents = roster(&[((0, 0), (4, 4)), ((2, 2), (4, 4))]);
        let proposals = vec![Position::new(0, 1), Position::new(2, 3)];

        let res = resolve(&grid, &mut agents, &proposals, &RewardTable::default()).unwrap();
        assert_eq!(res.passes, 1);
        assert_eq!(positions(&agents), proposals);
        assert_eq!(res.reverted, vec![false, false]);
    }

    #[test]
    fn test_same_target_both_reverted() {
        let grid = Grid::new(5, 5);
        let mut agents = roster(&[((0, 0), (4, 4)), ((0, 2), (4, 4))]);
        let proposals = vec![Position::new(0, 1), Position::new(0, 1)];

        let res = resolve(&grid, &mut agents, &proposals, &RewardTable::default()).unwrap();
        assert_eq!(positions(&agents), vec![Position::new(0, 0), Position::new(0, 2)]);
        assert_eq!(res.reverted, vec![true, true]);
        for e in res.evaluations.iter().flatten() {
            assert_eq!(e.outcome, Outcome::Obstacle);
        }
    }

    #[test]
    fn test_head_on_swap_reverts_both_in_one_pass() {
        let grid = Grid::new(1, 2);
        let mut agents = roster(&[((0, 0), (0, 1)), ((0, 1), (0, 0))]);
        let proposals = vec![Position::new(0, 1), Position::new(0, 0)];

        let res = resolve(&grid, &mut agents, &proposals, &RewardTable::default()).unwrap();
        assert_eq!(res.passes, 2);
        assert_eq!(positions(&agents), vec![Position::new(0, 0), Position::new(0, 1)]);
        assert_eq!(res.reverted, vec![true, true]);
        for e in res.evaluations.iter().flatten() {
            assert_eq!(e.outcome, Outcome::Obstacle);
            assert!(!e.done);
        }
    }

    #[test]
    fn test_following_into_vacated_cell_is_legal() {
        let grid = Grid::new(1, 3);
        let mut agents = roster(&[((0, 0), (0, 2)), ((0, 1), (0, 2))]);
        let proposals = vec![Position::new(0, 1), Position::new(0, 2)];

        let res = resolve(&grid, &mut agents, &proposals, &RewardTable::default()).unwrap();
        assert_eq!(res.passes, 1);
        assert_eq!(positions(&agents), proposals);
        assert_eq!(res.evaluations[1].map(|e| e.outcome), Some(Outcome::Goal));
    }

    #[test]
    fn test_revert_cascades_to_follower() {
        // Agent 0 hits a wall and goes back to (0,1); agent 1 followed into
        // (0,1) and must be reverted in the next pass.
        let grid = Grid::from_rows(&["...#"]).unwrap();
        let mut agents = roster(&[((0, 2), (0, 0)), ((0, 1), (0, 0))]);
        let proposals = vec![Position::new(0, 3), Position::new(0, 2)];

        let res = resolve(&grid, &mut agents, &proposals, &RewardTable::default()).unwrap();
        assert_eq!(res.passes, 3);
        assert_eq!(positions(&agents), vec![Position::new(0, 2), Position::new(0, 1)]);
        assert_eq!(res.reverted, vec![true, true]);
    }

    #[test]
    fn test_done_agents_are_untouched() {
        let grid = Grid::new(3, 3);
        let mut agents = roster(&[((1, 1), (1, 1)), ((0, 1), (2, 2))]);
        agents[0].done = true;
        let proposals = vec![Position::new(0, 0), Position::new(1, 1)];

        let res = resolve(&grid, &mut agents, &proposals, &RewardTable::default()).unwrap();
        assert_eq!(agents[0].pos(), Position::new(1, 1));
        assert_eq!(agents[1].pos(), Position::new(1, 1));
        assert!(res.evaluations[0].is_none());
        assert_eq!(res.evaluations[1].map(|e| e.outcome), Some(Outcome::Free));
    }

    #[test]
    fn test_out_of_bounds_reverted() {
        let grid = Grid::new(2, 2);
        let mut agents = roster(&[((0, 0), (1, 1))]);
        let res = resolve(&grid, &mut agents, &[Position::new(0, -3)], &RewardTable::default())
            .unwrap();
        assert_eq!(agents[0].pos(), Position::new(0, 0));
        assert_eq!(res.evaluations[0].map(|e| e.outcome), Some(Outcome::OutOfBounds));
    }
}
