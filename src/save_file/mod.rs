/// A submodule that parses the engine's save file text format.
/// The format is INI like, with CSV tables whose columns are declared inline
/// by every table.
pub mod parser;

/// A submodule defining what we extract from a save file
mod record;
pub use record::{Production, Relation, SaveFileRecord, Science, FOOD_PER_CITIZEN, TRADE_PER_CITIZEN};

/// A submodule that handles save file decompression
mod save_file;
pub use save_file::{SaveFile, SaveFileError};

/// A submodule fetching saves from outside, namely the game server container
mod source;
pub use source::{
    save_prefix, ContainerSource, FetchError, FetchedSave, SaveFileSource, CONTAINER_SAVE_DIR,
};

/// A submodule providing cached, memoised save data per turn
mod cache;
pub use cache::{NoSaveData, SaveDataProvider, SaveFileCache};

pub use parser::parse_save_file;
