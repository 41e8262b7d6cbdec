use std::io;
use std::path::PathBuf;
use std::time::Duration;

use derive_setters::Setters;
use ratatui::crossterm::event::KeyEvent;
use thiserror::Error;

use crate::columns::ColumnId;

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("io error: {0}")]
    IoError(#[from] io::Error),
    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("cannot expand path {0}")]
    PathExpansion(String),
    #[error("failed to set up logging: {0}")]
    Logging(String),
}

#[derive(Debug, Clone, Setters)]
pub struct BoardConfig {
    pub event_poll_time: u64,
    pub debounce: Duration,
    pub max_column_width: usize,
    /// Filtering this column forces an ascending sort on it.
    pub sort_follows_filter: Option<ColumnId>,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            event_poll_time: 100,
            debounce: Duration::from_millis(500),
            max_column_width: 30,
            sort_follows_filter: Some(ColumnId::Name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CMDMode {
    Search,
    FilterColumn(ColumnId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    ToggleSort,
    Search,
    Filter,
    HideColumn,
    ShowAllColumns,
    CopyCell,
    CopyRow,
    Help,
    Enter,
    Exit,
    Resize(usize, usize),
    RawKey(KeyEvent),
}

pub const HELP_TEXT: &str = "\
Navigation
  j / k / Up / Down     move row
  h / l / Left / Right  move column
  PgUp / PgDown         move a page
  g / G                 first / last row

Table
  s        toggle sort on column (first, opposite, off)
  /        search all columns (fuzzy)
  f        filter current column
  x        hide current column
  X        show all columns
  Enter    open record view
  c / C    copy cell / row

While typing
  Enter    apply now
  Esc      restore previous value

  ?        this help
  Esc      close view
  q        quit";
