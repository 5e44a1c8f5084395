//! Episode recording as a length-delimited protobuf stream.
//!
//! A replay file holds one [`EpisodeHeader`] followed by one [`StepRecord`]
//! per step, each prefixed with its varint length.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use prost::Message;
use time::OffsetDateTime;
use time::format_description;
use tracing::{debug, warn};

use crate::infra::{Action, EnvObserver, Position, Result};
use crate::metrics::EpisodeSummary;
use crate::sim::{GridWorld, StepResult};
use crate::state::Grid;

#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct PositionRecord {
    #[prost(int32, tag = "1")]
    pub row: i32,
    #[prost(int32, tag = "2")]
    pub col: i32,
}

impl From<Position> for PositionRecord {
    fn from(pos: Position) -> Self {
        Self {
            row: pos.row,
            col: pos.col,
        }
    }
}

impl From<PositionRecord> for Position {
    fn from(record: PositionRecord) -> Self {
        Position::new(record.row, record.col)
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AgentRecord {
    #[prost(uint32, tag = "1")]
    pub id: u32,
    #[prost(message, optional, tag = "2")]
    pub start: Option<PositionRecord>,
    #[prost(message, optional, tag = "3")]
    pub goal: Option<PositionRecord>,
}

/// Layout and placements at the start of an episode
#[derive(Clone, PartialEq, prost::Message)]
pub struct EpisodeHeader {
    #[prost(uint64, tag = "1")]
    pub episode: u64,
    /// Grid text rows as accepted by `Grid::from_rows`
    #[prost(string, repeated, tag = "2")]
    pub grid: Vec<String>,
    #[prost(message, repeated, tag = "3")]
    pub agents: Vec<AgentRecord>,
}

impl EpisodeHeader {
    pub fn capture(episode: usize, env: &GridWorld) -> Self {
        Self {
            episode: episode as u64,
            grid: env.grid().to_rows(),
            agents: env
                .agents()
                .iter()
                .map(|agent| AgentRecord {
                    id: agent.id as u32,
                    start: agent.start.map(Into::into),
                    goal: agent.goal.map(Into::into),
                })
                .collect(),
        }
    }

    /// Rebuild the recorded grid
    pub fn grid(&self) -> Option<Grid> {
        let rows: Vec<&str> = self.grid.iter().map(String::as_str).collect();
        Grid::from_rows(&rows)
    }
}

/// One step as seen by every agent
#[derive(Clone, PartialEq, prost::Message)]
pub struct StepRecord {
    #[prost(uint64, tag = "1")]
    pub step: u64,
    /// Action indices
    #[prost(int64, repeated, tag = "2")]
    pub actions: Vec<i64>,
    #[prost(float, repeated, tag = "3")]
    pub rewards: Vec<f32>,
    #[prost(bool, repeated, tag = "4")]
    pub dones: Vec<bool>,
    /// Positions after the step
    #[prost(message, repeated, tag = "5")]
    pub positions: Vec<PositionRecord>,
    #[prost(uint32, repeated, tag = "6")]
    pub batteries: Vec<u32>,
    #[prost(bool, tag = "7")]
    pub truncated: bool,
}

impl StepRecord {
    pub fn capture(actions: &[Action], result: &StepResult, env: &GridWorld) -> Self {
        Self {
            step: result.info.step as u64,
            actions: actions.iter().map(|a| a.index()).collect(),
            rewards: result.rewards.clone(),
            dones: result.dones.clone(),
            positions: env.agents().iter().map(|a| a.pos().into()).collect(),
            batteries: env.agents().iter().map(|a| a.battery).collect(),
            truncated: result.info.truncated,
        }
    }
}

pub struct ReplayWriter<W: Write = BufWriter<File>> {
    writer: W,
}

impl ReplayWriter {
    /// Create `<folder>/<prefix> - <timestamp> - episode <n>.replay` and
    /// write the header into it.
    pub fn create(folder: impl AsRef<Path>, prefix: &str, header: &EpisodeHeader) -> Result<Self> {
        let filename = folder.as_ref().join(format!(
            "{} - {} - episode {}.replay",
            prefix,
            timestamp()?,
            header.episode
        ));

        if let Some(parent) = filename.parent()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        debug!("Recording replay to {}", filename.display());
        let file = File::create(filename)?;
        Self::new(BufWriter::new(file), header)
    }
}

impl<W: Write> ReplayWriter<W> {
    pub fn new(writer: W, header: &EpisodeHeader) -> Result<Self> {
        let mut replay = Self { writer };
        replay.write_delimited_message(header)?;
        Ok(replay)
    }

    pub fn append(&mut self, record: &StepRecord) -> Result<()> {
        self.write_delimited_message(record)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_delimited_message<T: Message>(&mut self, message: &T) -> Result<()> {
        self.writer.write_all(&message.encode_length_delimited_to_vec())?;
        Ok(())
    }
}

fn timestamp() -> io::Result<String> {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let format = format_description::parse("[year][month][day]-[hour][minute][second]")
        .map_err(io::Error::other)?;
    now.format(&format).map_err(io::Error::other)
}

/// Decodes a replay stream: the header first, then steps on iteration.
pub struct ReplayReader {
    buffer: Vec<u8>,
    offset: usize,
    header: EpisodeHeader,
}

impl ReplayReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut buffer = Vec::new();
        File::open(path)?.read_to_end(&mut buffer)?;
        Self::from_bytes(buffer)
    }

    pub fn from_bytes(buffer: Vec<u8>) -> Result<Self> {
        let mut reader = Self {
            buffer,
            offset: 0,
            header: EpisodeHeader::default(),
        };
        reader.header = reader.read_delimited_message()?;
        Ok(reader)
    }

    pub fn header(&self) -> &EpisodeHeader {
        &self.header
    }

    fn read_delimited_message<T: Message + Default>(&mut self) -> Result<T> {
        let mut remaining = &self.buffer[self.offset..];
        let before = remaining.len();
        let message = T::decode_length_delimited(&mut remaining)?;
        self.offset += before - remaining.len();
        Ok(message)
    }
}

impl Iterator for ReplayReader {
    type Item = Result<StepRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.buffer.len() {
            return None;
        }
        let record = self.read_delimited_message();
        if record.is_err() {
            self.offset = self.buffer.len();
        }
        Some(record)
    }
}

/// Writes one replay file per episode into a folder.
pub struct ReplayObserver {
    folder: PathBuf,
    prefix: String,
    writer: Option<ReplayWriter>,
}

impl ReplayObserver {
    pub fn new(folder: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            prefix: prefix.into(),
            writer: None,
        }
    }
}

impl EnvObserver for ReplayObserver {
    fn on_reset(&mut self, episode: usize, env: &GridWorld) {
        let header = EpisodeHeader::capture(episode, env);
        self.writer = ReplayWriter::create(&self.folder, &self.prefix, &header)
            .inspect_err(|e| warn!("Replay recording disabled for episode {}: {}", episode, e))
            .ok();
    }

    fn on_step(&mut self, _episode: usize, actions: &[Action], result: &StepResult, env: &GridWorld) {
        if let Some(ref mut writer) = self.writer
            && let Err(e) = writer.append(&StepRecord::capture(actions, result, env))
        {
            warn!("Failed to append replay step: {}", e);
            self.writer = None;
        }
    }

    fn on_episode_finished(&mut self, _episode: usize, _summary: &EpisodeSummary) {
        if let Some(mut writer) = self.writer.take()
            && let Err(e) = writer.flush()
        {
            warn!("Failed to flush replay: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::GridWorldConfig;

    #[test]
    fn test_write_then_read_stream() {
        let grid = Grid::from_rows(&["..C", "...", "#.."]).unwrap();
        let mut env = GridWorld::with_layout(
            GridWorldConfig {
                seed: Some(1),
                ..Default::default()
            },
            grid,
            &[Position::new(0, 0)],
            &[Position::new(0, 2)],
        )
        .unwrap();

        let header = EpisodeHeader::capture(3, &env);
        let mut writer = ReplayWriter::new(Vec::new(), &header).unwrap();
        for _ in 0..2 {
            let actions = [Action::Right];
            let result = env.step_actions(&actions).unwrap();
            writer.append(&StepRecord::capture(&actions, &result, &env)).unwrap();
        }

        let mut reader = ReplayReader::from_bytes(writer.into_inner()).unwrap();
        assert_eq!(reader.header().episode, 3);
        assert_eq!(reader.header().grid(), Some(env.grid().clone()));
        assert_eq!(reader.header().agents[0].goal, Some(PositionRecord { row: 0, col: 2 }));

        let steps: Vec<StepRecord> = reader.by_ref().collect::<Result<_>>().unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].actions, vec![Action::Right.index()]);
        assert_eq!(Position::from(steps[1].positions[0]), Position::new(0, 2));
        assert_eq!(steps[1].dones, vec![true]);
        assert_eq!(steps[1].batteries, vec![crate::state::BATTERY_MAX]);
    }

    #[test]
    fn test_truncated_stream_is_an_error() {
        let header = EpisodeHeader {
            episode: 1,
            ..Default::default()
        };
        let mut bytes = ReplayWriter::new(Vec::new(), &header).unwrap().into_inner();
        bytes.push(0x05);

        let mut reader = ReplayReader::from_bytes(bytes).unwrap();
        assert!(matches!(reader.next(), Some(Err(crate::infra::GridWorldError::Replay(_)))));
        assert!(reader.next().is_none());
    }
}
