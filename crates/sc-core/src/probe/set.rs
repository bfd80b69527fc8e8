//! The per-node capability probes.
//!
//! Each probe runs one statement against one node. Probes that answer
//! "is this present" treat an empty result as a normal `false`; driver
//! errors are fatal unless the probe documents otherwise.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use super::executor::{ExecError, NodeConnection, ReadRoute, Row};
use super::sql::{self, variables};
use crate::logging::event_names;

/// Identifies a probe in errors and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Probe {
    Version,
    GlobalTimestamp,
    TimestampHeartbeat,
    CommitTimestampTx,
    SharedReadView,
    XEngine,
    PerformanceSchema,
    OpenSsl,
    LowerCaseTableNames,
    MdlPrivilege,
    MdlInstrumentation,
    Returning,
    UdfPlugin,
    UdfFunctions,
}

impl Probe {
    pub fn name(&self) -> &'static str {
        match self {
            Probe::Version => "version",
            Probe::GlobalTimestamp => "global_timestamp",
            Probe::TimestampHeartbeat => "timestamp_heartbeat",
            Probe::CommitTimestampTx => "commit_timestamp_tx",
            Probe::SharedReadView => "shared_read_view",
            Probe::XEngine => "xengine",
            Probe::PerformanceSchema => "performance_schema",
            Probe::OpenSsl => "open_ssl",
            Probe::LowerCaseTableNames => "lower_case_table_names",
            Probe::MdlPrivilege => "mdl_privilege",
            Probe::MdlInstrumentation => "mdl_instrumentation",
            Probe::Returning => "returning",
            Probe::UdfPlugin => "udf_plugin",
            Probe::UdfFunctions => "udf_functions",
        }
    }
}

impl std::fmt::Display for Probe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A fatal probe failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("probe '{probe}' failed: {source}")]
    Exec {
        probe: Probe,
        #[source]
        source: ExecError,
    },

    #[error("probe '{probe}' returned malformed data: {message}")]
    Malformed { probe: Probe, message: String },
}

impl ProbeError {
    pub fn probe(&self) -> Probe {
        match self {
            ProbeError::Exec { probe, .. } | ProbeError::Malformed { probe, .. } => *probe,
        }
    }

    fn malformed(probe: Probe, message: impl Into<String>) -> Self {
        ProbeError::Malformed {
            probe,
            message: message.into(),
        }
    }
}

fn run(
    conn: &dyn NodeConnection,
    probe: Probe,
    sql: &str,
    route: ReadRoute,
) -> Result<Vec<Row>, ProbeError> {
    conn.query(sql, route)
        .map_err(|source| ProbeError::Exec { probe, source })
}

/// Raw server version string (`SELECT @@version` on the primary).
pub fn probe_version(conn: &dyn NodeConnection) -> Result<String, ProbeError> {
    let rows = run(conn, Probe::Version, sql::SELECT_VERSION, ReadRoute::Master)?;
    let row = rows
        .first()
        .ok_or_else(|| ProbeError::malformed(Probe::Version, "no rows returned"))?;
    row.get(0)
        .map(str::to_string)
        .ok_or_else(|| ProbeError::malformed(Probe::Version, "version is NULL"))
}

/// True iff `SHOW VARIABLES LIKE '<variable>'` returns a row.
pub fn probe_variable_present(
    conn: &dyn NodeConnection,
    probe: Probe,
    variable: &str,
) -> Result<bool, ProbeError> {
    let rows = run(conn, probe, &sql::show_variable(variable), ReadRoute::Any)?;
    Ok(!rows.is_empty())
}

pub fn probe_global_timestamp(conn: &dyn NodeConnection) -> Result<bool, ProbeError> {
    probe_variable_present(conn, Probe::GlobalTimestamp, variables::COMMIT_SEQ)
}

pub fn probe_timestamp_heartbeat(conn: &dyn NodeConnection) -> Result<bool, ProbeError> {
    probe_variable_present(conn, Probe::TimestampHeartbeat, variables::HEARTBEAT_SEQ)
}

pub fn probe_commit_timestamp_tx(conn: &dyn NodeConnection) -> Result<bool, ProbeError> {
    probe_variable_present(conn, Probe::CommitTimestampTx, variables::CTS_TRANSACTION)
}

/// The variable only has to exist; its default value is OFF.
pub fn probe_shared_read_view(conn: &dyn NodeConnection) -> Result<bool, ProbeError> {
    probe_variable_present(conn, Probe::SharedReadView, variables::TRANSACTION_GROUP)
}

pub fn probe_xengine(conn: &dyn NodeConnection) -> Result<bool, ProbeError> {
    probe_variable_present(conn, Probe::XEngine, variables::XENGINE_DATADIR)
}

/// `performance_schema` must exist and be `ON` (any case).
pub fn probe_performance_schema(conn: &dyn NodeConnection) -> Result<bool, ProbeError> {
    let rows = run(
        conn,
        Probe::PerformanceSchema,
        &sql::show_variable(variables::PERFORMANCE_SCHEMA),
        ReadRoute::Any,
    )?;
    Ok(rows
        .first()
        .and_then(|row| row.get(1))
        .is_some_and(|value| value.eq_ignore_ascii_case("ON")))
}

pub fn probe_open_ssl(conn: &dyn NodeConnection) -> Result<bool, ProbeError> {
    let rows = run(conn, Probe::OpenSsl, sql::SHOW_RSA_PUBLIC_KEY, ReadRoute::Any)?;
    Ok(!rows.is_empty())
}

/// `lower_case_table_names` as reported by the primary (0, 1, or 2).
pub fn probe_lower_case_table_names(conn: &dyn NodeConnection) -> Result<i32, ProbeError> {
    let rows = run(
        conn,
        Probe::LowerCaseTableNames,
        sql::SELECT_LOWER_CASE_TABLE_NAMES,
        ReadRoute::Master,
    )?;
    let raw = rows
        .first()
        .ok_or_else(|| ProbeError::malformed(Probe::LowerCaseTableNames, "no rows returned"))?
        .get(0)
        .ok_or_else(|| ProbeError::malformed(Probe::LowerCaseTableNames, "value is NULL"))?;
    raw.trim().parse::<i32>().map_err(|_| {
        ProbeError::malformed(
            Probe::LowerCaseTableNames,
            format!("expected an integer, got {:?}", raw),
        )
    })
}

/// Whether the account may read the metadata-lock views. Never fatal.
pub fn probe_mdl_privilege(conn: &dyn NodeConnection) -> bool {
    match conn.query(sql::SELECT_MDL_PRIVILEGE, ReadRoute::Any) {
        Ok(_) => true,
        Err(err) => {
            warn!(
                event = event_names::PROBE_NEGATIVE,
                probe = %Probe::MdlPrivilege,
                error = %err,
                "cannot select from performance_schema.metadata_locks"
            );
            false
        }
    }
}

/// Whether MDL wait instrumentation is enabled. Never fatal.
pub fn probe_mdl_instrumentation(conn: &dyn NodeConnection) -> bool {
    match conn.query(sql::SELECT_MDL_INSTRUMENT, ReadRoute::Any) {
        Ok(rows) => rows
            .first()
            .and_then(|row| row.get(0))
            .is_some_and(|enabled| enabled.eq_ignore_ascii_case("YES")),
        Err(err) => {
            warn!(
                event = event_names::PROBE_NEGATIVE,
                probe = %Probe::MdlInstrumentation,
                error = %err,
                "cannot read MDL instrumentation state"
            );
            false
        }
    }
}

const RETURNING_SCHEMA: &str = "dbms_trans";
const RETURNING_PROCEDURE: &str = "returning";

/// Whether the node registers the native `dbms_trans.returning` procedure.
///
/// Over the extended protocol procedure calls are unavailable, so the probe
/// answers `false` without querying. Two specific server errors (missing
/// `dbms_admin` procedure, procedure calls rejected by a pluggable protocol)
/// are negative results; any other error is fatal.
pub fn probe_returning(
    conn: &dyn NodeConnection,
    extended_protocol: bool,
) -> Result<bool, ProbeError> {
    if extended_protocol {
        debug!(probe = %Probe::Returning, "skipped over extended protocol");
        return Ok(false);
    }

    match conn.query(sql::SHOW_NATIVE_PROCEDURES, ReadRoute::Any) {
        Ok(rows) => Ok(rows.iter().any(|row| {
            row.get(0)
                .is_some_and(|s| s.eq_ignore_ascii_case(RETURNING_SCHEMA))
                && row
                    .get(1)
                    .is_some_and(|p| p.eq_ignore_ascii_case(RETURNING_PROCEDURE))
        })),
        Err(ExecError::Sql(err)) if err.matches("42000", 1305, "does not exist") => {
            warn!(
                event = event_names::PROBE_NEGATIVE,
                probe = %Probe::Returning,
                "procedure dbms_admin.show_native_procedure does not exist"
            );
            Ok(false)
        }
        Err(ExecError::Sql(err))
            if err.matches("HY000", 3130, "Command not supported by pluggable protocols") =>
        {
            warn!(
                event = event_names::PROBE_NEGATIVE,
                probe = %Probe::Returning,
                "dbms_admin procedures are not callable over this protocol"
            );
            Ok(false)
        }
        Err(source) => Err(ProbeError::Exec {
            probe: Probe::Returning,
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::executor::SqlError;
    use std::collections::HashMap;

    /// Answers by exact statement; unknown statements return no rows.
    #[derive(Default)]
    struct Scripted {
        answers: HashMap<String, Result<Vec<Row>, ExecError>>,
    }

    impl Scripted {
        fn answer(mut self, sql: &str, rows: Vec<Row>) -> Self {
            self.answers.insert(sql.to_string(), Ok(rows));
            self
        }

        fn fail(mut self, sql: &str, err: ExecError) -> Self {
            self.answers.insert(sql.to_string(), Err(err));
            self
        }
    }

    impl NodeConnection for Scripted {
        fn query(&self, sql: &str, _route: ReadRoute) -> Result<Vec<Row>, ExecError> {
            self.answers.get(sql).cloned().unwrap_or(Ok(Vec::new()))
        }
    }

    fn sql_err(state: &str, code: i32, msg: &str) -> ExecError {
        ExecError::Sql(SqlError::new(state, code, msg))
    }

    #[test]
    fn test_version_reads_first_cell() {
        let conn = Scripted::default().answer(sql::SELECT_VERSION, vec![Row::from_strs(["8.0.32-X"])]);
        assert_eq!(probe_version(&conn).unwrap(), "8.0.32-X");
    }

    #[test]
    fn test_version_without_rows_is_malformed() {
        let err = probe_version(&Scripted::default()).unwrap_err();
        assert!(matches!(err, ProbeError::Malformed { probe: Probe::Version, .. }));
    }

    #[test]
    fn test_version_null_is_malformed() {
        let conn = Scripted::default().answer(sql::SELECT_VERSION, vec![Row::new(vec![None])]);
        assert!(matches!(
            probe_version(&conn),
            Err(ProbeError::Malformed { .. })
        ));
    }

    #[test]
    fn test_version_driver_error_is_fatal() {
        let conn = Scripted::default().fail(
            sql::SELECT_VERSION,
            ExecError::ConnectionLost("reset by peer".into()),
        );
        let err = probe_version(&conn).unwrap_err();
        assert_eq!(err.probe(), Probe::Version);
        assert!(err.to_string().contains("reset by peer"));
    }

    #[test]
    fn test_variable_presence() {
        let show = sql::show_variable(variables::COMMIT_SEQ);
        let conn = Scripted::default().answer(&show, vec![Row::from_strs(["innodb_commit_seq", "ON"])]);
        assert!(probe_global_timestamp(&conn).unwrap());
        assert!(!probe_timestamp_heartbeat(&conn).unwrap());
    }

    #[test]
    fn test_variable_probe_error_is_fatal() {
        let show = sql::show_variable(variables::TRANSACTION_GROUP);
        let conn = Scripted::default().fail(&show, sql_err("HY000", 1045, "denied"));
        assert!(matches!(
            probe_shared_read_view(&conn),
            Err(ProbeError::Exec { probe: Probe::SharedReadView, .. })
        ));
    }

    #[test]
    fn test_performance_schema_requires_on() {
        let show = sql::show_variable(variables::PERFORMANCE_SCHEMA);
        let on = Scripted::default().answer(&show, vec![Row::from_strs(["performance_schema", "on"])]);
        let off = Scripted::default().answer(&show, vec![Row::from_strs(["performance_schema", "OFF"])]);
        assert!(probe_performance_schema(&on).unwrap());
        assert!(!probe_performance_schema(&off).unwrap());
        assert!(!probe_performance_schema(&Scripted::default()).unwrap());
    }

    #[test]
    fn test_lower_case_table_names() {
        let conn = Scripted::default().answer(
            sql::SELECT_LOWER_CASE_TABLE_NAMES,
            vec![Row::from_strs(["2"])],
        );
        assert_eq!(probe_lower_case_table_names(&conn).unwrap(), 2);

        let garbage = Scripted::default().answer(
            sql::SELECT_LOWER_CASE_TABLE_NAMES,
            vec![Row::from_strs(["yes"])],
        );
        assert!(matches!(
            probe_lower_case_table_names(&garbage),
            Err(ProbeError::Malformed { .. })
        ));
        assert!(probe_lower_case_table_names(&Scripted::default()).is_err());
    }

    #[test]
    fn test_mdl_probes_never_fail() {
        let denied = Scripted::default()
            .fail(sql::SELECT_MDL_PRIVILEGE, sql_err("42000", 1142, "SELECT command denied"))
            .fail(sql::SELECT_MDL_INSTRUMENT, sql_err("42000", 1142, "SELECT command denied"));
        assert!(!probe_mdl_privilege(&denied));
        assert!(!probe_mdl_instrumentation(&denied));

        let granted = Scripted::default()
            .answer(sql::SELECT_MDL_INSTRUMENT, vec![Row::from_strs(["yes", "NO"])]);
        assert!(probe_mdl_privilege(&granted));
        assert!(probe_mdl_instrumentation(&granted));
    }

    #[test]
    fn test_returning_found_case_insensitive() {
        let conn = Scripted::default().answer(
            sql::SHOW_NATIVE_PROCEDURES,
            vec![
                Row::from_strs(["dbms_admin", "show_native_procedure"]),
                Row::from_strs(["DBMS_TRANS", "Returning"]),
            ],
        );
        assert!(probe_returning(&conn, false).unwrap());
    }

    #[test]
    fn test_returning_requires_both_columns() {
        let conn = Scripted::default().answer(
            sql::SHOW_NATIVE_PROCEDURES,
            vec![Row::from_strs(["dbms_trans", "commit"]), Row::from_strs(["other", "returning"])],
        );
        assert!(!probe_returning(&conn, false).unwrap());
    }

    #[test]
    fn test_returning_missing_procedure_is_negative() {
        let conn = Scripted::default().fail(
            sql::SHOW_NATIVE_PROCEDURES,
            sql_err("42000", 1305, "PROCEDURE dbms_admin.show_native_procedure does not exist"),
        );
        assert!(!probe_returning(&conn, false).unwrap());
    }

    #[test]
    fn test_returning_pluggable_protocol_is_negative() {
        let conn = Scripted::default().fail(
            sql::SHOW_NATIVE_PROCEDURES,
            sql_err("HY000", 3130, "Command not supported by pluggable protocols"),
        );
        assert!(!probe_returning(&conn, false).unwrap());
    }

    #[test]
    fn test_returning_other_error_is_fatal() {
        let conn = Scripted::default().fail(
            sql::SHOW_NATIVE_PROCEDURES,
            sql_err("42000", 1305, "FUNCTION x is ambiguous"),
        );
        assert!(matches!(
            probe_returning(&conn, false),
            Err(ProbeError::Exec { probe: Probe::Returning, .. })
        ));
    }

    #[test]
    fn test_returning_extended_protocol_short_circuits() {
        // Would be fatal if the query were issued.
        let conn = Scripted::default().fail(
            sql::SHOW_NATIVE_PROCEDURES,
            ExecError::ConnectionLost("unreachable".into()),
        );
        assert!(!probe_returning(&conn, true).unwrap());
    }

    #[test]
    fn test_probe_names_are_snake_case() {
        assert_eq!(Probe::OpenSsl.to_string(), "open_ssl");
        assert_eq!(
            serde_json::to_string(&Probe::LowerCaseTableNames).unwrap(),
            "\"lower_case_table_names\""
        );
    }
}
