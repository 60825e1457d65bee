//! The scan pipeline: grouping, chunked reads, result mapping, the atomic
//! writer and the engine and scheduler that drive them.

pub mod engine;
pub mod grouper;
pub mod mapper;
pub mod reader;
pub mod scheduler;
pub mod writer;

pub use engine::{EngineConfig, ScanEngine};
pub use grouper::{group_signals, ConnectionGroup, Grouping, SignalIndex};
pub use mapper::{map_results, MappedResults, ResultMapper};
pub use reader::{BatchReader, ChunkFailure, GroupReadOutcome, ReaderConfig, DEFAULT_CHUNK_SIZE};
pub use scheduler::{
    CycleScheduler, SchedulerConfig, SchedulerEvent, SchedulerState, SchedulerStats,
    SchedulerStatsSnapshot,
};
pub use writer::ReadingWriter;
