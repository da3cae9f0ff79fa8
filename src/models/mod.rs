//! Data models
//!
//! - `Report`: a row of `REPORTES` plus its submission/mutation inputs
//! - `Session`: server-side authenticated identity

mod report;
mod session;

pub use report::{
    EditReportInput, NewReport, Report, ReportId, ReportIdInput, RESOLVED_STATUS,
};
pub use session::Session;
