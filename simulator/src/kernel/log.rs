//! Logging macros prefixing each record with simulation time and component name.

#[macro_export]
macro_rules! log_trace {
    ($ctx:expr, $($arg:tt)+) => {
        $crate::__log::trace!("[{:.3} {} {}] {}", $ctx.time(), "TRACE", $ctx.name(), format!($($arg)+))
    };
}

#[macro_export]
macro_rules! log_debug {
    ($ctx:expr, $($arg:tt)+) => {
        $crate::__log::debug!("[{:.3} {} {}] {}", $ctx.time(), "DEBUG", $ctx.name(), format!($($arg)+))
    };
}

#[macro_export]
macro_rules! log_info {
    ($ctx:expr, $($arg:tt)+) => {
        $crate::__log::info!("[{:.3} {}  {}] {}", $ctx.time(), "INFO", $ctx.name(), format!($($arg)+))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($ctx:expr, $($arg:tt)+) => {
        $crate::__log::warn!("[{:.3} {}  {}] {}", $ctx.time(), "WARN", $ctx.name(), format!($($arg)+))
    };
}

#[macro_export]
macro_rules! log_error {
    ($ctx:expr, $($arg:tt)+) => {
        $crate::__log::error!("[{:.3} {} {}] {}", $ctx.time(), "ERROR", $ctx.name(), format!($($arg)+))
    };
}
