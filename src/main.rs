use dotenv::dotenv;
use std::env;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use windy_gridworld::infra::{CompositeObserver, DefaultObserver, EnvObserver, ReplayObserver};
use windy_gridworld::metrics::CsvLogger;
use windy_gridworld::runner::{EpisodeRunner, RandomPolicy};
use windy_gridworld::sim::generators::RandomObstacles;
use windy_gridworld::{GridWorld, GridWorldConfig, RewardTable, WindConfig};

fn get_env_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|val| val.parse::<T>().ok())
}

/// Comma-separated per-row wind bias, e.g. `0,0,1,1,2`
fn get_wind_bias(key: &str, rows: usize) -> Vec<i32> {
    let mut bias: Vec<i32> = env::var(key)
        .ok()
        .map(|val| val.split(',').filter_map(|v| v.trim().parse().ok()).collect())
        .unwrap_or_default();
    bias.resize(rows, 0);
    bias
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("windy_gridworld=debug,info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    init_logging();

    let rows = get_env_var::<i32>("GRIDWORLD_ROWS").unwrap_or(10);
    let cols = get_env_var::<i32>("GRIDWORLD_COLS").unwrap_or(10);
    let num_agents = get_env_var::<usize>("GRIDWORLD_AGENTS").unwrap_or(2);
    let episodes = get_env_var::<usize>("GRIDWORLD_EPISODES").unwrap_or(10);
    let max_steps = get_env_var::<usize>("GRIDWORLD_MAX_STEPS").unwrap_or(100);
    let seed = get_env_var::<u64>("GRIDWORLD_SEED");
    let wind_range = get_env_var::<i32>("GRIDWORLD_WIND_RANGE").unwrap_or(0);
    let obstacle_density = get_env_var::<f64>("GRIDWORLD_OBSTACLE_DENSITY");
    let replays_folder = env::var("GRIDWORLD_REPLAYS_FOLDER").ok();
    let metrics_folder = env::var("GRIDWORLD_METRICS_FOLDER").ok();
    let render = get_env_var::<bool>("GRIDWORLD_RENDER").unwrap_or(false);

    let config = GridWorldConfig {
        rows,
        cols,
        num_agents,
        wind: WindConfig::with_range(get_wind_bias("GRIDWORLD_WIND", rows.max(0) as usize), wind_range, None),
        rewards: RewardTable::from_env(),
        max_steps,
        seed,
        ..Default::default()
    };
    tracing::info!("Running {} episode(s) on a {}x{} grid with {} agent(s)", episodes, rows, cols, num_agents);

    let mut env = GridWorld::new(config)?;
    if let Some(density) = obstacle_density {
        tracing::info!("Obstacle density: {}", density);
        env = env.with_grid_generator(RandomObstacles::new(density));
    }

    let mut observers: Vec<Box<dyn EnvObserver>> = vec![Box::new(DefaultObserver::new(render))];
    if let Some(folder) = replays_folder {
        tracing::info!("Recording replays to {}", folder);
        observers.push(Box::new(ReplayObserver::new(folder, "gridworld")));
    }

    let mut runner = EpisodeRunner::new(env, CompositeObserver::new(observers));
    let mut policy = RandomPolicy::new(seed.map(|s| s.wrapping_add(1)));
    let metrics = runner.run(episodes, &mut policy)?;
    metrics.log_summary();

    if let Some(folder) = metrics_folder {
        let mut logger = CsvLogger::new(&folder)?;
        logger.log_metrics(metrics)?;
        tracing::info!("Metrics saved to {}", folder);
    }

    Ok(())
}
