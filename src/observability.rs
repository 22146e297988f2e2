//! Observability hooks for bulk serialization passes.
//!
//! The `log_metric!` macro emits one structured key-value line through the `log`
//! facade. It is compiled out of release builds by `#[cfg(debug_assertions)]`.

use log::LevelFilter;
use std::fs::OpenOptions;
use std::sync::Once;

use crate::error::Result;

/// Logs a structured key-value metric string at debug level, only in debug builds.
///
/// # Example
/// ```
/// use nullable_core::log_metric;
/// let rows = 4;
/// log_metric!("event"="write_chunk", "type"="Nullable(Int32)", "rows"=&rows);
/// ```
#[macro_export]
macro_rules! log_metric {
    ($($key:literal = $value:expr),+ $(,)?) => {
        #[cfg(debug_assertions)]
        {
            let mut parts = Vec::new();
            $(
                parts.push(format!("\"{}\": \"{}\"", $key, $value));
            )+

            $crate::__log::debug!("NULLABLE_METRIC: {{ {} }}", parts.join(", "));
        }
    };
}

static INIT_LOGGER: Once = Once::new();

/// Initialises `env_logger` once for the process, at `Debug` level.
///
/// When `log_file` is given, log lines are appended to that file instead of stderr.
/// Later calls are no-ops, including the file check.
pub fn enable_verbose_logging(log_file: Option<&str>) -> Result<()> {
    let target = match log_file {
        Some(filename) => Some(
            OpenOptions::new()
                .append(true)
                .create(true)
                .open(filename)?,
        ),
        None => None,
    };

    INIT_LOGGER.call_once(|| {
        let mut builder = env_logger::Builder::new();

        builder.is_test(false);
        builder.filter_level(LevelFilter::Debug);

        builder.format(|buf, record| {
            use std::io::Write;
            writeln!(buf, "[{}] {}", record.level(), record.args())?;
            buf.flush()?;
            Ok(())
        });

        if let Some(file) = target {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }

        let _ = builder.try_init();
    });
    Ok(())
}
