//! `rollcall-upload`: daily CSV export discovery, parsing and delivery.
//!
//! [`send_daily_csv_data`] runs the whole pipeline:
//! validate options, find the day's file, parse it, then POST
//! `{date, school_id, school_domain, data}` with bounded retries.
//! [`deliver`] is also used on its own by the live attendance forwarder.

pub mod delivery;
pub mod discovery;
pub mod error;
pub mod parser;
pub mod pipeline;

pub use delivery::{deliver, Delivered, Envelope, RetryPolicy};
pub use discovery::find_file_for_day;
pub use error::{AttemptError, DeliveryError, Result, UploadError};
pub use parser::{parse_csv, parse_csv_file, CsvAttendanceRow};
pub use pipeline::{send_daily_csv_data, CsvMetadata, CsvSendSummary};
