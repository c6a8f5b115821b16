/*!
# SQL Error Handling

Error types for expression evaluation and plan operators. All SQL-level
operations return structured errors carrying the context needed to report
the failure without access to the originating query text.

## Error Categories

- **Execution Errors**: runtime failures while applying a plan operator
- **Type Errors**: value/type mismatches in places that are not covered by
  the permissive coercion rules (e.g. aggregate inputs)
- **Function Errors**: scalar or aggregate builtin failures
- **Stream Errors**: problems attributed to a named stream or operator
- **Window Errors**: invalid window specifications and windowing failures
- **Configuration Errors**: invalid setup detected before anything runs

Expression evaluation itself is deliberately permissive: type mismatches
resolve to null or `false` rather than an error, so a single malformed
field never halts a pipeline. The variants here cover the cases that are
genuine failures.
*/

use std::fmt;

/// Error type for SQL expression evaluation and plan operators.
///
/// Each variant carries the context relevant to its failure mode so
/// callers can log or surface a useful message without re-deriving it.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlError {
    /// Runtime failure while executing a plan operator or expression.
    ExecutionError {
        /// Description of the execution failure
        message: String,
        /// Extra context (operator name, expression text), if available
        context: Option<String>,
    },

    /// Value/type mismatch outside the permissive coercion rules.
    TypeError {
        /// Expected data type
        expected: String,
        /// Actual data type encountered
        actual: String,
        /// The value that caused the type error, if available
        value: Option<String>,
    },

    /// Scalar or aggregate function failure.
    FunctionError {
        /// Function name as called
        function: String,
        /// Description of the failure
        message: String,
    },

    /// Failure attributed to a named stream or operator.
    StreamError {
        /// Name of the stream or operator
        stream_name: String,
        /// Description of the failure
        message: String,
    },

    /// Invalid window specification or windowing failure.
    WindowError {
        /// Description of the windowing failure
        message: String,
        /// Window kind involved (TUMBLING, SLIDING, SESSION, ...)
        window_type: Option<String>,
    },

    /// Invalid setup detected before execution starts.
    ConfigurationError {
        /// Description of the configuration problem
        message: String,
    },
}

impl fmt::Display for SqlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlError::ExecutionError { message, context } => {
                if let Some(ctx) = context {
                    write!(f, "Execution error in {}: {}", ctx, message)
                } else {
                    write!(f, "Execution error: {}", message)
                }
            }
            SqlError::TypeError {
                expected,
                actual,
                value,
            } => {
                if let Some(val) = value {
                    write!(
                        f,
                        "Type error: expected {}, got {} for value '{}'",
                        expected, actual, val
                    )
                } else {
                    write!(f, "Type error: expected {}, got {}", expected, actual)
                }
            }
            SqlError::FunctionError { function, message } => {
                write!(f, "Function error in '{}': {}", function, message)
            }
            SqlError::StreamError {
                stream_name,
                message,
            } => {
                write!(f, "Stream error for '{}': {}", stream_name, message)
            }
            SqlError::WindowError {
                message,
                window_type,
            } => {
                if let Some(wtype) = window_type {
                    write!(f, "Window error for {} window: {}", wtype, message)
                } else {
                    write!(f, "Window error: {}", message)
                }
            }
            SqlError::ConfigurationError { message } => {
                write!(f, "Configuration error: {}", message)
            }
        }
    }
}

impl std::error::Error for SqlError {}

impl SqlError {
    /// Create an execution error with optional context
    pub fn execution_error(message: impl Into<String>, context: Option<String>) -> Self {
        SqlError::ExecutionError {
            message: message.into(),
            context,
        }
    }

    /// Create a type error
    pub fn type_error(
        expected: impl Into<String>,
        actual: impl Into<String>,
        value: Option<String>,
    ) -> Self {
        SqlError::TypeError {
            expected: expected.into(),
            actual: actual.into(),
            value,
        }
    }

    /// Create a function error
    pub fn function_error(function: impl Into<String>, message: impl Into<String>) -> Self {
        SqlError::FunctionError {
            function: function.into(),
            message: message.into(),
        }
    }

    /// Create a stream error
    pub fn stream_error(stream_name: impl Into<String>, message: impl Into<String>) -> Self {
        SqlError::StreamError {
            stream_name: stream_name.into(),
            message: message.into(),
        }
    }

    /// Create a window error
    pub fn window_error(message: impl Into<String>, window_type: Option<String>) -> Self {
        SqlError::WindowError {
            message: message.into(),
            window_type,
        }
    }

    /// Create a configuration error
    pub fn configuration_error(message: impl Into<String>) -> Self {
        SqlError::ConfigurationError {
            message: message.into(),
        }
    }
}

/// Result type for SQL operations
pub type SqlResult<T> = Result<T, SqlError>;
