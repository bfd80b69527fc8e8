//! Canonical probe statements.

/// Server version, read from the primary.
pub const SELECT_VERSION: &str = "SELECT @@version";

/// Identifier case-folding mode, read from the primary.
pub const SELECT_LOWER_CASE_TABLE_NAMES: &str = "SELECT @@global.lower_case_table_names";

/// Lists natively registered procedures as (schema, name) rows.
pub const SHOW_NATIVE_PROCEDURES: &str = "call dbms_admin.show_native_procedure()";

/// Present only when the server is built with OpenSSL.
pub const SHOW_RSA_PUBLIC_KEY: &str = "SHOW STATUS LIKE 'Rsa_public_key'";

/// MDL wait instrumentation row: (ENABLED, TIMED).
pub const SELECT_MDL_INSTRUMENT: &str = "select enabled,timed from performance_schema.setup_instruments WHERE NAME = 'wait/lock/metadata/sql/mdl'";

/// The metadata-lock wait-for query used by MDL deadlock detection,
/// short-circuited with `AND FALSE` so it only checks privileges.
pub const SELECT_MDL_PRIVILEGE: &str = "SELECT `pt`.`PROCESSLIST_ID` AS `waiting`, `gt`.`PROCESSLIST_ID` AS `blocking` \
FROM (((((`performance_schema`.`metadata_locks` `g` \
JOIN `performance_schema`.`metadata_locks` `p` ON ((`g`.`OBJECT_TYPE` = `p`.`OBJECT_TYPE`) \
AND (`g`.`OBJECT_SCHEMA` = `p`.`OBJECT_SCHEMA`) AND (`g`.`OBJECT_NAME` = `p`.`OBJECT_NAME`) \
AND (`g`.`LOCK_STATUS` = 'GRANTED') AND (`p`.`LOCK_STATUS` = 'PENDING'))) \
JOIN `performance_schema`.`threads` `gt` ON ((`g`.`OWNER_THREAD_ID` = `gt`.`THREAD_ID`))) \
JOIN `performance_schema`.`threads` `pt` ON ((`p`.`OWNER_THREAD_ID` = `pt`.`THREAD_ID`))) \
LEFT JOIN `performance_schema`.`events_statements_current` `gs` ON ((`g`.`OWNER_THREAD_ID` = `gs`.`THREAD_ID`))) \
LEFT JOIN `performance_schema`.`events_statements_current` `ps` ON ((`p`.`OWNER_THREAD_ID` = `ps`.`THREAD_ID`))) \
WHERE (`g`.`OBJECT_TYPE` = 'TABLE') AND `pt`.`PROCESSLIST_ID` != `gt`.`PROCESSLIST_ID` AND FALSE";

/// Server variables whose mere presence signals a capability.
pub mod variables {
    pub const COMMIT_SEQ: &str = "innodb_commit_seq";
    pub const HEARTBEAT_SEQ: &str = "innodb_heartbeat_seq";
    pub const CTS_TRANSACTION: &str = "innodb_cts_transaction";
    pub const TRANSACTION_GROUP: &str = "innodb_transaction_group";
    pub const XENGINE_DATADIR: &str = "xengine_datadir";
    pub const PERFORMANCE_SCHEMA: &str = "performance_schema";
}

/// `SHOW VARIABLES LIKE '<name>'`. The name must be a plain identifier.
pub fn show_variable(name: &str) -> String {
    format!("SHOW VARIABLES LIKE '{}'", name)
}

/// Version and status of a server plugin.
pub fn select_plugin(plugin_name: &str) -> String {
    format!(
        "select PLUGIN_VERSION, PLUGIN_STATUS from information_schema.plugins where PLUGIN_NAME='{}'",
        plugin_name
    )
}

/// Recover the variable name from a `SHOW VARIABLES LIKE` / `SHOW STATUS LIKE` statement.
pub fn like_target(sql: &str) -> Option<&str> {
    let start = sql.find("LIKE '")? + "LIKE '".len();
    let rest = &sql[start..];
    let end = rest.find('\'')?;
    Some(&rest[..end])
}

/// Recover the plugin name from a [`select_plugin`] statement.
pub fn plugin_target(sql: &str) -> Option<&str> {
    let start = sql.find("PLUGIN_NAME='")? + "PLUGIN_NAME='".len();
    let rest = &sql[start..];
    let end = rest.find('\'')?;
    Some(&rest[..end])
}
