//! Daily attendance report, enriched with each person's phone number.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};
use rollcall_core::config::SchoolConfig;
use rollcall_core::AttendanceRecord;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::client::{ArtemisClient, Endpoint};
use crate::error::ReportError;

const PAGE_SIZE: u32 = 100;

/// Fetch `day`'s attendance report (local calendar day) and resolve a phone
/// number for every person in it.
///
/// Person lookups are cached by person code for this call only. A failed
/// report call fails the whole fetch; a failed person lookup only leaves
/// that person's phone number empty.
pub async fn fetch_attendance_for_day(
    client: &ArtemisClient,
    school: &SchoolConfig,
    day: NaiveDate,
) -> Result<Vec<AttendanceRecord>, ReportError> {
    let (begin, end) = day_window(&Local, day).ok_or(ReportError::InvalidDay(day))?;
    debug!(%day, %begin, %end, "requesting attendance report");

    let response = client
        .send(Endpoint::Attendance, &report_request(&begin, &end))
        .await;
    if !response.is_success() {
        warn!(status = response.status(), body = %response.data(), "attendance report request failed");
        return Err(ReportError::Status {
            status: response.status(),
            body: response.data().clone(),
        });
    }

    let rows = report_rows(response.data())?;
    let mut phones: HashMap<String, Option<String>> = HashMap::new();
    let mut records = Vec::with_capacity(rows.len());

    for row in rows {
        let Some(person_code) = non_empty_str(row.pointer("/personInfo/personCode")) else {
            continue;
        };

        let phone_no = match phones.get(&person_code) {
            Some(cached) => cached.clone(),
            None => {
                let phone = lookup_phone(client, &person_code).await;
                phones.insert(person_code.clone(), phone.clone());
                phone
            }
        };

        records.push(AttendanceRecord {
            school_id: school.id.clone(),
            school_domain: school.domain.clone(),
            attendance_date: non_empty_str(row.get("date")),
            full_name: non_empty_str(row.pointer("/personInfo/fullName")),
            phone_no,
            attendance_status: stringify(row.pointer("/attendanceBaseInfo/attendanceStatus")),
            person_code,
        });
    }

    info!(%day, records = records.len(), lookups = phones.len(), "attendance report fetched");
    Ok(records)
}

/// UTC millisecond timestamps of the first and last instant of `day` in `tz`.
///
/// A bound that falls in a DST gap moves inward to the nearest wall-clock
/// time that exists.
pub fn day_window<Tz: TimeZone>(tz: &Tz, day: NaiveDate) -> Option<(String, String)> {
    let first = day.and_time(NaiveTime::from_hms_milli_opt(0, 0, 0, 0)?);
    let last = day.and_time(NaiveTime::from_hms_milli_opt(23, 59, 59, 999)?);
    let begin = (0..GAP_PROBES).find_map(|i| {
        tz.from_local_datetime(&(first + Duration::minutes(GAP_STEP_MINUTES * i)))
            .earliest()
    })?;
    let end = (0..GAP_PROBES).find_map(|i| {
        tz.from_local_datetime(&(last - Duration::minutes(GAP_STEP_MINUTES * i)))
            .latest()
    })?;
    Some((utc_millis(begin), utc_millis(end)))
}

const GAP_STEP_MINUTES: i64 = 15;
const GAP_PROBES: i64 = 4 * 24;

fn utc_millis<Tz: TimeZone>(instant: DateTime<Tz>) -> String {
    instant
        .with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn report_request(begin: &str, end: &str) -> Value {
    json!({
        "attendanceReportRequest": {
            "pageNo": 1,
            "pageSize": PAGE_SIZE,
            "queryInfo": {
                "beginTime": begin,
                "endTime": end,
                "sortInfo": { "sortField": 1, "sortType": 1 }
            }
        }
    })
}

/// Rows under `data.record`; absent means an empty report.
fn report_rows(body: &Value) -> Result<&[Value], ReportError> {
    match body.pointer("/data/record") {
        None | Some(Value::Null) => Ok(&[][..]),
        Some(Value::Array(rows)) => Ok(rows),
        Some(other) => Err(ReportError::Malformed(format!(
            "data.record is not a list: {other}"
        ))),
    }
}

async fn lookup_phone(client: &ArtemisClient, person_code: &str) -> Option<String> {
    let response = client
        .send(Endpoint::PersonInfo, &json!({ "personCode": person_code }))
        .await;
    if !response.is_success() {
        warn!(
            person_code,
            status = response.status(),
            body = %response.data(),
            "person info request failed"
        );
        return None;
    }
    resolve_phone(response.data().get("data")?)
}

/// Phone number from a person-info payload. The gateway has answered with
/// three shapes over time; they are tried in this order.
pub fn resolve_phone(data: &Value) -> Option<String> {
    non_empty_str(data.get("phoneNo"))
        .or_else(|| non_empty_str(data.pointer("/personInfo/phoneNo")))
        .or_else(|| non_empty_str(data.pointer("/0/phoneNo")))
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn stringify(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use chrono::{FixedOffset, LocalResult, NaiveDateTime};
    use rollcall_core::config::VendorConfig;

    use super::*;

    #[derive(Default)]
    struct Gateway {
        person_calls: AtomicUsize,
    }

    async fn report(Json(body): Json<Value>) -> Json<Value> {
        assert_eq!(body["attendanceReportRequest"]["pageSize"], 100);
        Json(json!({
            "code": "0",
            "data": { "record": [
                { "personInfo": { "personCode": "A1", "fullName": "Ada" },
                  "date": "2024-03-10",
                  "attendanceBaseInfo": { "attendanceStatus": 1 } },
                { "personInfo": { "fullName": "No Code" } },
                { "personInfo": { "personCode": "B2", "fullName": "Bo" },
                  "date": "2024-03-10",
                  "attendanceBaseInfo": { "attendanceStatus": "late" } },
                { "personInfo": { "personCode": "A1", "fullName": "Ada" },
                  "date": "2024-03-10" }
            ]}
        }))
    }

    async fn person(State(gw): State<Arc<Gateway>>, Json(body): Json<Value>) -> Json<Value> {
        gw.person_calls.fetch_add(1, Ordering::SeqCst);
        match body["personCode"].as_str() {
            Some("A1") => Json(json!({ "data": { "phoneNo": "0170000001" } })),
            _ => Json(json!({ "data": [ { "phoneNo": "0180000002" } ] })),
        }
    }

    async fn client_for(router: Router) -> ArtemisClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        ArtemisClient::new(&VendorConfig {
            base_uri: format!("http://{addr}"),
            ..VendorConfig::default()
        })
        .unwrap()
    }

    fn school() -> SchoolConfig {
        SchoolConfig {
            id: "42".to_string(),
            domain: "school.example".to_string(),
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
    }

    #[test]
    fn day_window_is_utc_of_local_bounds() {
        let dhaka = FixedOffset::east_opt(6 * 3600).unwrap();
        let (begin, end) = day_window(&dhaka, day()).unwrap();
        assert_eq!(begin, "2024-03-09T18:00:00.000Z");
        assert_eq!(end, "2024-03-10T17:59:59.999Z");

        let (begin, end) = day_window(&Utc, day()).unwrap();
        assert_eq!(begin, "2024-03-10T00:00:00.000Z");
        assert_eq!(end, "2024-03-10T23:59:59.999Z");
    }

    /// UTC-4 until 2024-09-08T04:00Z, then UTC-3: local 00:00-01:00 on
    /// 2024-09-08 never happens.
    #[derive(Debug, Clone)]
    struct MidnightGap;

    impl MidnightGap {
        fn switch() -> NaiveDateTime {
            NaiveDate::from_ymd_opt(2024, 9, 8)
                .unwrap()
                .and_hms_opt(4, 0, 0)
                .unwrap()
        }

        fn before() -> FixedOffset {
            FixedOffset::west_opt(4 * 3600).unwrap()
        }

        fn after() -> FixedOffset {
            FixedOffset::west_opt(3 * 3600).unwrap()
        }
    }

    impl TimeZone for MidnightGap {
        type Offset = FixedOffset;

        fn from_offset(_: &FixedOffset) -> Self {
            MidnightGap
        }

        fn offset_from_local_date(&self, local: &NaiveDate) -> LocalResult<FixedOffset> {
            self.offset_from_local_datetime(&local.and_hms_opt(0, 0, 0).unwrap())
        }

        fn offset_from_local_datetime(&self, local: &NaiveDateTime) -> LocalResult<FixedOffset> {
            let before = *local - Self::before() < Self::switch();
            let after = *local - Self::after() >= Self::switch();
            match (before, after) {
                (true, true) => LocalResult::Ambiguous(Self::before(), Self::after()),
                (true, false) => LocalResult::Single(Self::before()),
                (false, true) => LocalResult::Single(Self::after()),
                (false, false) => LocalResult::None,
            }
        }

        fn offset_from_utc_date(&self, utc: &NaiveDate) -> FixedOffset {
            self.offset_from_utc_datetime(&utc.and_hms_opt(0, 0, 0).unwrap())
        }

        fn offset_from_utc_datetime(&self, utc: &NaiveDateTime) -> FixedOffset {
            if *utc < Self::switch() {
                Self::before()
            } else {
                Self::after()
            }
        }
    }

    #[test]
    fn day_window_skips_a_missing_midnight() {
        let day = NaiveDate::from_ymd_opt(2024, 9, 8).unwrap();
        let (begin, end) = day_window(&MidnightGap, day).unwrap();
        assert_eq!(begin, "2024-09-08T04:00:00.000Z");
        assert_eq!(end, "2024-09-09T02:59:59.999Z");

        let (begin, _) = day_window(&MidnightGap, day.pred_opt().unwrap()).unwrap();
        assert_eq!(begin, "2024-09-07T04:00:00.000Z");
    }

    #[test]
    fn phone_lookup_order() {
        assert_eq!(
            resolve_phone(&json!({ "phoneNo": "1", "personInfo": { "phoneNo": "2" } })),
            Some("1".to_string())
        );
        assert_eq!(
            resolve_phone(&json!({ "phoneNo": "", "personInfo": { "phoneNo": "2" } })),
            Some("2".to_string())
        );
        assert_eq!(resolve_phone(&json!([{ "phoneNo": "3" }])), Some("3".to_string()));
        assert_eq!(resolve_phone(&json!({ "name": "x" })), None);
    }

    #[tokio::test]
    async fn builds_records_in_report_order_with_cached_lookups() {
        let gw = Arc::new(Gateway::default());
        let router = Router::new()
            .route("/artemis/api/attendance/v1/report", post(report))
            .route(
                "/artemis/api/resource/v1/person/personCode/personInfo",
                post(person),
            )
            .with_state(gw.clone());
        let client = client_for(router).await;

        let records = fetch_attendance_for_day(&client, &school(), day()).await.unwrap();

        let codes: Vec<&str> = records.iter().map(|r| r.person_code.as_str()).collect();
        assert_eq!(codes, vec!["A1", "B2", "A1"]);
        assert_eq!(gw.person_calls.load(Ordering::SeqCst), 2);

        assert_eq!(records[0].school_id, "42");
        assert_eq!(records[0].school_domain, "school.example");
        assert_eq!(records[0].full_name.as_deref(), Some("Ada"));
        assert_eq!(records[0].attendance_date.as_deref(), Some("2024-03-10"));
        assert_eq!(records[0].phone_no.as_deref(), Some("0170000001"));
        assert_eq!(records[0].attendance_status, "1");
        assert_eq!(records[1].phone_no.as_deref(), Some("0180000002"));
        assert_eq!(records[1].attendance_status, "late");
        assert_eq!(records[2].attendance_status, "");
    }

    #[tokio::test]
    async fn failed_person_lookup_leaves_phone_empty() {
        let router = Router::new()
            .route("/artemis/api/attendance/v1/report", post(report))
            .route(
                "/artemis/api/resource/v1/person/personCode/personInfo",
                post(|| async { StatusCode::NOT_FOUND }),
            );
        let client = client_for(router).await;

        let records = fetch_attendance_for_day(&client, &school(), day()).await.unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.phone_no.is_none()));
    }

    #[tokio::test]
    async fn failed_report_yields_no_records() {
        let router = Router::new().route(
            "/artemis/api/attendance/v1/report",
            post(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
        );
        let client = client_for(router).await;

        let err = fetch_attendance_for_day(&client, &school(), day())
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::Status { status: 502, .. }));
    }

    #[tokio::test]
    async fn report_without_records_is_empty() {
        let router = Router::new().route(
            "/artemis/api/attendance/v1/report",
            post(|| async { Json(json!({ "code": "0", "data": {} })) }),
        );
        let client = client_for(router).await;
        assert!(fetch_attendance_for_day(&client, &school(), day())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn non_list_records_are_malformed() {
        let router = Router::new().route(
            "/artemis/api/attendance/v1/report",
            post(|| async { Json(json!({ "data": { "record": "nope" } })) }),
        );
        let client = client_for(router).await;
        let err = fetch_attendance_for_day(&client, &school(), day())
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::Malformed(_)));
    }
}
