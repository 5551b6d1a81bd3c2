#![allow(unused_macros)]
use self::simple_logger::SimpleLogger;

mod simple_logger;

macro_rules! logger_macro {
    ($name:ident is $rule_level:ident to $target:expr, $d:tt) => {
        macro_rules! $name {
            ($d($d arg:tt)+) => (::log::log!(target: $target, ::log::Level::$rule_level, $d($d arg)+));
        }

        #[allow(unused_imports)]
        pub(crate) use $name;
    };
    ($name:ident is $rule_level:ident to $target:expr) => {
        logger_macro!($name is $rule_level to $target, $);
    };
}

logger_macro!(user_error is Error to "sigdispatch::user");
logger_macro!(user_warn is Warn to "sigdispatch::user");
logger_macro!(user_info is Info to "sigdispatch::user");

macro_rules! dev_logger_macro {
    ($name:ident is $rule_level:ident to $target:expr, $d:tt) => {
        macro_rules! $name {
            ($d($d arg:tt)+) => {
                if std::cfg!(feature = "dev") {
                    (::log::log!(
                        target: $target,
                        ::log::Level::$rule_level,
                        "{}: {}",
                        std::panic::Location::caller(),
                        format_args!($d($d arg)+)
                    ));
                }
            };
        }

        #[allow(unused_imports)]
        pub(crate) use $name;
    };
    ($name:ident is $rule_level:ident to $target:expr) => {
        dev_logger_macro!($name is $rule_level to $target, $);
    };
}

dev_logger_macro!(dev_error is Error to "sigdispatch::dev");
dev_logger_macro!(dev_warn is Warn to "sigdispatch::dev");
dev_logger_macro!(dev_info is Info to "sigdispatch::dev");
dev_logger_macro!(dev_debug is Debug to "sigdispatch::dev");

/// A logger that forwards records to a sub-logger chosen by the record's target prefix.
///
/// Records are never emitted from inside a signal action, only from registration calls and from
/// the processing loop.
#[derive(Default)]
pub struct DispatchLogger(Vec<(String, Box<dyn log::Log>)>);

impl DispatchLogger {
    pub fn new(prefix: &'static str) -> Self {
        let mut logger: Self = Default::default();

        logger.add_logger("sigdispatch::user", SimpleLogger::to_stderr(prefix));

        #[cfg(feature = "dev")]
        {
            let path = std::env::var_os("SIGDISPATCH_DEV_LOGS")
                .map(|s| s.into())
                .unwrap_or_else(|| {
                    std::env::temp_dir().join(format!("sigdispatch-dev-{}.log", std::process::id()))
                });
            match SimpleLogger::to_file(path, "") {
                Ok(file_logger) => logger.add_logger("sigdispatch::dev", file_logger),
                Err(_) => logger.add_logger("sigdispatch::dev", SimpleLogger::to_stderr(prefix)),
            }
        }

        logger
    }

    /// Install this logger as the global `log` logger.
    ///
    /// Returns `false` if another logger was installed first.
    pub fn into_global_logger(self) -> bool {
        log::set_boxed_logger(Box::new(self))
            .map(|()| log::set_max_level(log::LevelFilter::Trace))
            .is_ok()
    }

    /// Route every record whose target is `target` or lies below it to `logger`.
    fn add_logger(&mut self, target: &str, logger: impl log::Log + 'static) {
        // stored with a trailing `::` so `a::b` matches `a::b::c` but not `a::bc`
        let prefix = match target.strip_suffix("::") {
            Some(_) => target.to_owned(),
            None => format!("{target}::"),
        };
        self.0.push((prefix, Box::new(logger)))
    }

    fn matches(prefix: &str, target: &str) -> bool {
        target.starts_with(prefix) || prefix.strip_suffix("::") == Some(target)
    }
}

impl log::Log for DispatchLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level() && metadata.level() <= log::STATIC_MAX_LEVEL
    }

    fn log(&self, record: &log::Record) {
        self.0
            .iter()
            .filter(|(prefix, _)| Self::matches(prefix, record.target()))
            .for_each(|(_, logger)| logger.log(record));
    }

    fn flush(&self) {
        self.0.iter().for_each(|(_, logger)| logger.flush());
    }
}

#[cfg(test)]
mod tests {
    use super::DispatchLogger;

    #[test]
    fn can_construct_logger() {
        let logger = DispatchLogger::new("sigdispatch: ");
        let len = if cfg!(feature = "dev") { 2 } else { 1 };
        assert_eq!(logger.0.len(), len);
    }

    #[test]
    fn prefix_matching_respects_path_boundaries() {
        assert!(DispatchLogger::matches("sigdispatch::user::", "sigdispatch::user"));
        assert!(DispatchLogger::matches(
            "sigdispatch::user::",
            "sigdispatch::user::registry"
        ));
        assert!(!DispatchLogger::matches("sigdispatch::user::", "sigdispatch::username"));
        assert!(!DispatchLogger::matches("sigdispatch::dev::", "sigdispatch::user"));
    }
}
