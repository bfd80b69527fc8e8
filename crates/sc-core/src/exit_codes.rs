//! Exit codes for the sc-core CLI.
//!
//! Exit code ranges:
//! - 0: success
//! - 10-19: user/environment errors (fixable by the operator)
//! - 20-29: internal errors

use sc_common::{Error, ErrorCategory};

/// Stable contract for automation. Changes require a major version bump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Clean = 0,

    // ========================================================================
    // User / Environment Errors (10-19)
    // ========================================================================
    ArgsError = 10,

    /// Config missing, unparseable, or failing validation
    ConfigError = 11,

    /// Topology file unreadable or a node unreachable
    TopologyError = 12,

    /// A probe failed fatally during the pass
    ProbeError = 13,

    /// Point query for a node that is not in the cache
    NodeNotFound = 14,

    // ========================================================================
    // Internal Errors (20-29)
    // ========================================================================
    InternalError = 20,

    IoError = 21,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        self == ExitCode::Clean
    }

    pub fn is_user_error(self) -> bool {
        (10..20).contains(&self.as_i32())
    }

    pub fn is_internal_error(self) -> bool {
        self.as_i32() >= 20
    }

    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::ConfigError => "ERR_CONFIG",
            ExitCode::TopologyError => "ERR_TOPOLOGY",
            ExitCode::ProbeError => "ERR_PROBE",
            ExitCode::NodeNotFound => "ERR_NODE_NOT_FOUND",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
        }
    }

    pub fn for_error(err: &Error) -> ExitCode {
        match err {
            Error::NodeNotFound { .. } => ExitCode::NodeNotFound,
            Error::Json(_) => ExitCode::InternalError,
            _ => match err.category() {
                ErrorCategory::Config => ExitCode::ConfigError,
                ErrorCategory::Topology => ExitCode::TopologyError,
                ErrorCategory::Probe => ExitCode::ProbeError,
                ErrorCategory::Lifecycle => ExitCode::InternalError,
                ErrorCategory::Io => ExitCode::IoError,
            },
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranges() {
        assert!(ExitCode::Clean.is_success());
        assert!(ExitCode::ProbeError.is_user_error());
        assert!(!ExitCode::ProbeError.is_internal_error());
        assert!(ExitCode::IoError.is_internal_error());
    }

    #[test]
    fn test_display() {
        assert_eq!(ExitCode::NodeNotFound.to_string(), "ERR_NODE_NOT_FOUND (14)");
        assert_eq!(i32::from(ExitCode::TopologyError), 12);
    }

    #[test]
    fn test_for_error() {
        assert_eq!(
            ExitCode::for_error(&Error::InvalidConfig("x".into())),
            ExitCode::ConfigError
        );
        assert_eq!(
            ExitCode::for_error(&Error::NodeNotFound { node: "dn-0".into() }),
            ExitCode::NodeNotFound
        );
        assert_eq!(
            ExitCode::for_error(&Error::ConnectionUnavailable {
                node: "dn-0".into(),
                message: "refused".into()
            }),
            ExitCode::TopologyError
        );
        assert_eq!(
            ExitCode::for_error(&Error::ProbeFailed {
                node: "dn-0".into(),
                probe: "version".into(),
                message: "lost".into()
            }),
            ExitCode::ProbeError
        );
        assert_eq!(
            ExitCode::for_error(&Error::InitializationFailed("panic".into())),
            ExitCode::InternalError
        );
    }

    #[test]
    fn test_each_category_has_an_exit_code() {
        let cases = [
            (Error::Config("x".into()), ErrorCategory::Config, ExitCode::ConfigError),
            (Error::Topology("x".into()), ErrorCategory::Topology, ExitCode::TopologyError),
            (
                Error::InitializationFailed("x".into()),
                ErrorCategory::Lifecycle,
                ExitCode::InternalError,
            ),
        ];
        for (err, category, code) in cases {
            assert_eq!(err.category(), category);
            assert_eq!(ExitCode::for_error(&err), code);
        }
    }
}
