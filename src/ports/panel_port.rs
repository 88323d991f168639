//! Panel data access port trait.

use crate::domain::error::EbuissError;
use crate::domain::panel::{FactorPanel, PricePanel};
use chrono::NaiveDate;

/// Supplies price and factor panels, sorted by period and free of duplicates.
pub trait PanelPort {
    fn load_prices(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<PricePanel, EbuissError>;

    fn load_factors(
        &self,
        factor: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<FactorPanel, EbuissError>;
}
