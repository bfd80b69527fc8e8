//! Server-side UDF extension discovery.
//!
//! The extension is optional. A node without it, with a version string we
//! cannot read, or whose lookup fails simply reports [`UdfExtension::Absent`].

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

use super::executor::{NodeConnection, ReadRoute};
use super::set::Probe;
use super::sql;
use crate::logging::event_names;

pub const BLOOM_FILTER_FUNCTION: &str = "bloomfilter";
pub const HYPER_LOG_LOG_FUNCTION: &str = "hyperloglog";
pub const FAST_CHECKSUM_FUNCTION: &str = "hashcheck";

const ACTIVE_STATUS: &str = "ACTIVE";

/// What the extension reported about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UdfCapabilitySnapshot {
    pub major_version: i32,
    pub minor_version: i32,
    pub status: String,
    pub registered_functions: BTreeSet<String>,
}

/// The UDF extension as seen on one node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UdfExtension {
    #[default]
    Absent,
    Present(UdfCapabilitySnapshot),
}

impl UdfExtension {
    pub fn snapshot(&self) -> Option<&UdfCapabilitySnapshot> {
        match self {
            UdfExtension::Absent => None,
            UdfExtension::Present(snapshot) => Some(snapshot),
        }
    }
}

fn supports_function(udf: &UdfExtension, function: &str) -> bool {
    udf.snapshot().is_some_and(|s| {
        s.major_version >= 1
            && s.minor_version >= 1
            && s.status == ACTIVE_STATUS
            && s.registered_functions.contains(function)
    })
}

pub fn supports_bloom_filter(udf: &UdfExtension) -> bool {
    supports_function(udf, BLOOM_FILTER_FUNCTION)
}

pub fn supports_hyper_log_log(udf: &UdfExtension) -> bool {
    supports_function(udf, HYPER_LOG_LOG_FUNCTION)
}

pub fn supports_fast_checksum(udf: &UdfExtension) -> bool {
    supports_function(udf, FAST_CHECKSUM_FUNCTION)
}

/// Leading `major.minor` of a plugin version. Further components are ignored.
///
/// ```
/// use sc_core::probe::udf::parse_udf_version;
/// assert_eq!(parse_udf_version("1.2.7"), Some((1, 2)));
/// assert_eq!(parse_udf_version("1"), None);
/// ```
pub fn parse_udf_version(version: &str) -> Option<(i32, i32)> {
    let mut parts = version.trim().split('.');
    let major = parts.next()?.trim().parse().ok()?;
    let minor = parts.next()?.trim().parse().ok()?;
    Some((major, minor))
}

/// Split the comma-separated function list, dropping blanks.
pub fn parse_function_list(list: &str) -> BTreeSet<String> {
    list.split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect()
}

/// Look up the extension on a node. Never fails.
pub fn resolve_udf(
    conn: &dyn NodeConnection,
    plugin_name: &str,
    function_list_variable: &str,
) -> UdfExtension {
    let plugin_rows = match conn.query(&sql::select_plugin(plugin_name), ReadRoute::Any) {
        Ok(rows) => rows,
        Err(err) => {
            warn!(
                event = event_names::PROBE_NEGATIVE,
                probe = %Probe::UdfPlugin,
                plugin = plugin_name,
                error = %err,
                "UDF plugin lookup failed"
            );
            return UdfExtension::Absent;
        }
    };
    let Some(plugin) = plugin_rows.first() else {
        return UdfExtension::Absent;
    };

    let Some((major_version, minor_version)) = plugin.get(0).and_then(parse_udf_version) else {
        warn!(
            event = event_names::PROBE_NEGATIVE,
            probe = %Probe::UdfPlugin,
            plugin = plugin_name,
            version = ?plugin.get(0),
            "unreadable UDF plugin version"
        );
        return UdfExtension::Absent;
    };
    let status = plugin.get(1).unwrap_or_default().to_string();

    let function_rows = match conn.query(&sql::show_variable(function_list_variable), ReadRoute::Any)
    {
        Ok(rows) => rows,
        Err(err) => {
            warn!(
                event = event_names::PROBE_NEGATIVE,
                probe = %Probe::UdfFunctions,
                variable = function_list_variable,
                error = %err,
                "UDF function list lookup failed"
            );
            return UdfExtension::Absent;
        }
    };
    let Some(functions) = function_rows.first() else {
        return UdfExtension::Absent;
    };

    UdfExtension::Present(UdfCapabilitySnapshot {
        major_version,
        minor_version,
        status,
        registered_functions: parse_function_list(functions.get(1).unwrap_or_default()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::executor::{ExecError, Row, SqlError};

    fn present(version: (i32, i32), status: &str, functions: &[&str]) -> UdfExtension {
        UdfExtension::Present(UdfCapabilitySnapshot {
            major_version: version.0,
            minor_version: version.1,
            status: status.to_string(),
            registered_functions: functions.iter().map(|f| f.to_string()).collect(),
        })
    }

    struct Plugin {
        plugin: Result<Vec<Row>, ExecError>,
        functions: Result<Vec<Row>, ExecError>,
    }

    impl NodeConnection for Plugin {
        fn query(&self, sql: &str, _route: ReadRoute) -> Result<Vec<Row>, ExecError> {
            if sql.contains("information_schema.plugins") {
                self.plugin.clone()
            } else {
                self.functions.clone()
            }
        }
    }

    fn plugin(version: &str, status: &str, list: &str) -> Plugin {
        Plugin {
            plugin: Ok(vec![Row::from_strs([version, status])]),
            functions: Ok(vec![Row::from_strs(["polarx_udf_function_list", list])]),
        }
    }

    #[test]
    fn test_active_with_function_supported() {
        let udf = present((1, 1), "ACTIVE", &["bloomfilter"]);
        assert!(supports_bloom_filter(&udf));
        assert!(!supports_hyper_log_log(&udf));
        assert!(!supports_fast_checksum(&udf));
    }

    #[test]
    fn test_inactive_not_supported() {
        let udf = present((1, 1), "INACTIVE", &["bloomfilter"]);
        assert!(!supports_bloom_filter(&udf));
    }

    #[test]
    fn test_status_is_case_sensitive() {
        let udf = present((1, 1), "active", &["bloomfilter"]);
        assert!(!supports_bloom_filter(&udf));
    }

    #[test]
    fn test_minor_zero_not_supported() {
        assert!(!supports_bloom_filter(&present((1, 0), "ACTIVE", &["bloomfilter"])));
        assert!(!supports_bloom_filter(&present((2, 0), "ACTIVE", &["bloomfilter"])));
        assert!(!supports_bloom_filter(&present((0, 9), "ACTIVE", &["bloomfilter"])));
    }

    #[test]
    fn test_absent_supports_nothing() {
        let udf = UdfExtension::Absent;
        assert!(!supports_bloom_filter(&udf));
        assert!(!supports_hyper_log_log(&udf));
        assert!(!supports_fast_checksum(&udf));
    }

    #[test]
    fn test_parse_udf_version() {
        assert_eq!(parse_udf_version("1.1"), Some((1, 1)));
        assert_eq!(parse_udf_version(" 2.10.3 "), Some((2, 10)));
        assert_eq!(parse_udf_version("1"), None);
        assert_eq!(parse_udf_version("1.x"), None);
        assert_eq!(parse_udf_version(""), None);
        assert_eq!(parse_udf_version("v1.1"), None);
    }

    #[test]
    fn test_parse_function_list() {
        let set = parse_function_list("bloomfilter, hyperloglog,,hashcheck ");
        assert_eq!(set.len(), 3);
        assert!(set.contains("hyperloglog"));
        assert!(parse_function_list("").is_empty());
    }

    #[test]
    fn test_resolve_present() {
        let conn = plugin("1.1", "ACTIVE", "bloomfilter,hyperloglog,hashcheck");
        let udf = resolve_udf(&conn, "polarx_udf", "polarx_udf_function_list");
        assert!(supports_bloom_filter(&udf));
        assert!(supports_hyper_log_log(&udf));
        assert!(supports_fast_checksum(&udf));
    }

    #[test]
    fn test_resolve_no_plugin_row_is_absent() {
        let conn = Plugin {
            plugin: Ok(Vec::new()),
            functions: Ok(vec![Row::from_strs(["v", "bloomfilter"])]),
        };
        assert_eq!(resolve_udf(&conn, "polarx_udf", "v"), UdfExtension::Absent);
    }

    #[test]
    fn test_resolve_bad_version_is_absent() {
        let conn = plugin("one", "ACTIVE", "bloomfilter");
        assert_eq!(resolve_udf(&conn, "polarx_udf", "v"), UdfExtension::Absent);
    }

    #[test]
    fn test_resolve_query_error_is_absent() {
        let conn = Plugin {
            plugin: Ok(vec![Row::from_strs(["1.1", "ACTIVE"])]),
            functions: Err(ExecError::Sql(SqlError::new("42000", 1142, "denied"))),
        };
        assert_eq!(resolve_udf(&conn, "polarx_udf", "v"), UdfExtension::Absent);

        let conn = Plugin {
            plugin: Err(ExecError::ConnectionLost("gone".into())),
            functions: Ok(Vec::new()),
        };
        assert_eq!(resolve_udf(&conn, "polarx_udf", "v"), UdfExtension::Absent);
    }

    #[test]
    fn test_resolve_missing_function_variable_is_absent() {
        let conn = Plugin {
            plugin: Ok(vec![Row::from_strs(["1.1", "ACTIVE"])]),
            functions: Ok(Vec::new()),
        };
        assert_eq!(resolve_udf(&conn, "polarx_udf", "v"), UdfExtension::Absent);
    }

    #[test]
    fn test_absent_serializes_with_tag() {
        let json = serde_json::to_string(&UdfExtension::Absent).unwrap();
        assert_eq!(json, r#"{"state":"absent"}"#);
    }
}
