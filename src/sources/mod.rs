pub mod power_client;
pub mod reanalysis_table;

pub use power_client::PowerClient;
pub use reanalysis_table::ReanalysisTable;

use crate::error::Result;
use crate::models::{DateRange, ReanalysisCell, ReanalysisSeries};
use std::future::Future;

/// Daily point weather for a reanalysis grid cell.
///
/// Returned values are already in WTH units; sentinel readings are `None`.
pub trait ReanalysisSource: Send + Sync {
    fn fetch_daily_series(
        &self,
        cell: &ReanalysisCell,
        range: &DateRange,
    ) -> impl Future<Output = Result<ReanalysisSeries>> + Send;
}
