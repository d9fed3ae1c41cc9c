//! Runtime core: polling, reconciliation and everything derived from the view

mod context;
mod dashboard;
mod export;
mod history;
mod mining_state;
mod poll_manager;
mod reconciler;
mod running_average;
mod wallet;

pub use context::AppContext;
pub use dashboard::{totals_store, Dashboard};
pub use export::{export_to_path, to_csv, to_json, ExportFormat};
pub use history::{History, HistoryPoint};
pub use mining_state::{MiningState, MiningTotals};
pub use poll_manager::{PollHandle, PollManager};
pub use reconciler::{block_probability, efficiency, reconcile, time_to_block};
pub use running_average::RunningAverage;
pub use wallet::{
    classify, validate_address, ClassifiedTransaction, HeuristicClassifier, LookupError,
    RewardClassifier, WalletInfo, WalletLookup, WalletTransaction,
};
