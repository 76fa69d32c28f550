//! `rollcall-artemis`: signed client for the HikCentral Artemis OpenAPI
//! gateway, plus the calls built on it.
//!
//! | Key             | Path                                                    |
//! |-----------------|---------------------------------------------------------|
//! | `getAttendance` | `/artemis/api/attendance/v1/report`                     |
//! | `getPersonInfo` | `/artemis/api/resource/v1/person/personCode/personInfo` |
//! | `getPersonList` | `/artemis/api/resource/v1/person/personList`            |

pub mod attendance;
pub mod client;
pub mod error;
pub mod persons;
pub mod signing;

pub use attendance::fetch_attendance_for_day;
pub use client::{ApiResponse, ArtemisClient, Endpoint};
pub use error::{ArtemisError, ReportError};
pub use persons::fetch_person_list;
