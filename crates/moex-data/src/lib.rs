//! Data provider adapters for the moex-agents pipeline
//!
//! Three sources: the MOEX ISS API (quotes, candles, dividends, indices,
//! security search), RBC news feeds, and the Smart-Lab community feed.
//! The [`interface`] module exposes the text contract the analyst tools
//! consume: formatted markdown strings with failures embedded as
//! human-readable markers, never propagated as errors.

pub mod companies;
pub mod error;
pub mod interface;
pub mod moex;
pub mod news;

pub use companies::{company_name, RUSSIAN_COMPANIES};
pub use error::{DataError, Result};
pub use moex::{Candle, Dividend, MoexClient, SecuritySummary};
pub use news::{NewsItem, RbcCategory, RbcClient, SmartlabClient};
