//! Reconstructs the history of a Freeciv game out of per turn observation
//! recordings and, where available, the engine's own save files.
//!
//! ## Getting Started
//!
//! The facade for the library is the [report::ReportGenerator], which takes
//! a validated [report::ReportConfig] and writes one report per requested
//! turn. The pieces it is built from can be used on their own:
//!
//! ```no_run
//! use freeciv_history_extractor::{
//!     game_data::Ruleset, metrics::MetricsPipeline, save_file::NoSaveData,
//!     state::StateAccessor,
//! };
//!
//! let accessor = StateAccessor::index("/path/to/recording").unwrap();
//! let ruleset = Ruleset::default();
//! let report = MetricsPipeline::new(&accessor, &NoSaveData, &ruleset, "player")
//!     .collect(0, accessor.max_turn())
//!     .unwrap();
//! println!("{} events", report.events.len());
//! ```

/// Opaque id types and the snapshot model shared by every module
pub mod types;

/// Indexed, lazily loaded access to a recording directory
pub mod state;

/// Save file decompression, parsing, caching and fetching
pub mod save_file;

/// Discrete game events derived from consecutive snapshots
pub mod events;

/// Per turn metrics, the roster, standings, diplomacy and the pipeline
/// combining them into a report
pub mod metrics;

/// Choosing the turns worth drawing a territory map for
pub mod selector;

/// Static game data, the ruleset nations and terrain classes
pub mod game_data;

/// Report configuration, output and generation
pub mod report;
