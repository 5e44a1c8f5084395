use std::path::PathBuf;

use windy_gridworld::infra::{ReplayObserver, ReplayReader, StepRecord};
use windy_gridworld::runner::{EpisodeRunner, RandomPolicy};
use windy_gridworld::sim::{Outcome, Plane};
use windy_gridworld::state::BATTERY_MAX;
use windy_gridworld::{Action, Grid, GridWorld, GridWorldConfig, GridWorldError, Position, WindConfig};

fn temp_folder(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("gridworld-{}-{}", name, std::process::id()))
}

#[test]
fn test_two_agents_cross_a_windy_room() {
    // Row 1 always blows one column to the right.
    let grid = Grid::from_rows(&["....", "....", "...C", "...."]).unwrap();
    let config = GridWorldConfig {
        wind: WindConfig::with_range(vec![0, 1, 0, 0], 0, None),
        seed: Some(5),
        ..Default::default()
    };
    let mut env = GridWorld::with_layout(
        config,
        grid,
        &[Position::new(0, 0), Position::new(3, 0)],
        &[Position::new(1, 1), Position::new(2, 0)],
    )
    .unwrap();

    // No wind on rows 0 and 3.
    let result = env.step_actions(&[Action::Down, Action::Up]).unwrap();
    assert_eq!(env.agents()[0].pos(), Position::new(1, 0));
    assert_eq!(env.agents()[1].pos(), Position::new(2, 0));
    assert_eq!(result.dones, vec![false, true]);
    assert_eq!(result.info.outcomes[1], Some(Outcome::Goal));

    // In row 1 a right move becomes a two-column jump, past the goal.
    let result = env.step_actions(&[Action::Right, Action::Right]).unwrap();
    assert_eq!(env.agents()[0].pos(), Position::new(1, 2));
    assert_eq!(result.info.outcomes[0], Some(Outcome::Free));
    assert_eq!(result.info.outcomes[1], None);
    assert_eq!(env.agents()[1].pos(), Position::new(2, 0));

    let obs = &result.observations[0];
    assert!((obs.get(Plane::Agent, 1, 2) - (BATTERY_MAX - 20) as f32).abs() < 1e-6);
    assert!((obs.get(Plane::ChargingStation, 2, 3) - 1.0).abs() < 1e-6);

    // Moving down from row 1 is pushed sideways onto the station.
    let result = env.step_actions(&[Action::Down, Action::Down]).unwrap();
    assert_eq!(env.agents()[0].pos(), Position::new(2, 3));
    assert!(result.info.recharged[0]);
    assert_eq!(env.agents()[0].battery, BATTERY_MAX);
}

#[test]
fn test_invalid_action_leaves_state_untouched() {
    let mut env = GridWorld::new(GridWorldConfig {
        num_agents: 2,
        seed: Some(9),
        ..Default::default()
    })
    .unwrap();
    env.reset(true, 10, true).unwrap();
    let before = env.agents().to_vec();

    let err = env.step(&[0, 7]).unwrap_err();
    assert!(matches!(err, GridWorldError::InvalidAction { agent: 1, .. }));
    assert_eq!(env.agents(), &before[..]);
    assert_eq!(env.steps(), 0);
}

#[test]
fn test_runner_records_replays() {
    let folder = temp_folder("replays");
    let config = GridWorldConfig {
        rows: 6,
        cols: 6,
        num_agents: 2,
        max_steps: 30,
        seed: Some(21),
        ..Default::default()
    };
    let env = GridWorld::new(config).unwrap();
    let mut runner = EpisodeRunner::new(env, ReplayObserver::new(&folder, "test"));
    let mut policy = RandomPolicy::new(Some(4));

    let summaries: Vec<_> = (0..2).map(|_| runner.run_episode(&mut policy).unwrap()).collect();
    assert_eq!(runner.metrics().num_episodes, 2);

    let mut files: Vec<PathBuf> = std::fs::read_dir(&folder)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    files.sort_by_key(|path| path.to_string_lossy().to_string());
    assert_eq!(files.len(), 2);

    for path in &files {
        let mut reader = ReplayReader::open(path).unwrap();
        let episode = reader.header().episode as usize;
        let summary = &summaries[episode - 1];

        let header_grid = reader.header().grid().unwrap();
        assert_eq!(header_grid.rows, 6);
        assert_eq!(header_grid.charging_stations().len(), 1);
        assert_eq!(reader.header().agents.len(), 2);

        let steps: Vec<StepRecord> = reader.by_ref().collect::<Result<_, _>>().unwrap();
        assert_eq!(steps.len(), summary.steps);
        for (i, record) in steps.iter().enumerate() {
            assert_eq!(record.step as usize, i + 1);
            assert_eq!(record.actions.len(), 2);
        }

        let returns: Vec<f32> = (0..2)
            .map(|agent| steps.iter().map(|s| s.rewards[agent]).sum())
            .collect();
        for (recorded, expected) in returns.iter().zip(&summary.returns) {
            assert!((recorded - expected).abs() < 1e-3);
        }
        let last = steps.last().unwrap();
        assert!(last.truncated || last.dones.iter().all(|d| *d));
    }

    std::fs::remove_dir_all(&folder).unwrap();
}
