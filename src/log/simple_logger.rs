use std::io::Write;

#[cfg(feature = "dev")]
use std::{fs::File, path::Path};

use log::Log;

/// Writes one line per record into `target`.
///
/// Warnings and errors are tagged with their level, informational records are written as is.
pub struct SimpleLogger<W: Send + Sync>
where
    for<'a> &'a W: Write,
{
    target: W,
    prefix: &'static str,
}

impl<W: Send + Sync> SimpleLogger<W>
where
    for<'a> &'a W: Write,
{
    fn format_line(&self, record: &log::Record) -> String {
        match record.level() {
            log::Level::Error => format!("{}error: {}", self.prefix, record.args()),
            log::Level::Warn => format!("{}warning: {}", self.prefix, record.args()),
            _ => format!("{}{}", self.prefix, record.args()),
        }
    }
}

impl<W: Send + Sync> Log for SimpleLogger<W>
where
    for<'a> &'a W: Write,
{
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level() && metadata.level() <= log::STATIC_MAX_LEVEL
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            let _ = writeln!(&self.target, "{}", self.format_line(record));
        }
    }

    fn flush(&self) {
        let _ = (&self.target).flush();
    }
}

impl SimpleLogger<std::io::Stderr> {
    pub fn to_stderr(prefix: &'static str) -> SimpleLogger<std::io::Stderr> {
        SimpleLogger {
            target: std::io::stderr(),
            prefix,
        }
    }
}

#[cfg(feature = "dev")]
impl SimpleLogger<File> {
    pub fn to_file<P: AsRef<Path>>(name: P, prefix: &'static str) -> Result<Self, std::io::Error> {
        let target = std::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(name)?;
        Ok(Self { target, prefix })
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        sync::{Arc, RwLock},
    };

    use super::SimpleLogger;
    use log::{LevelFilter, Log};

    #[derive(Clone, Default)]
    struct SharedBuffer {
        inner: Arc<RwLock<String>>,
    }

    impl SharedBuffer {
        fn read(&self) -> String {
            self.inner.read().unwrap().clone()
        }
    }

    impl io::Write for &'_ SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.inner
                .write()
                .unwrap()
                .push_str(std::str::from_utf8(buf).unwrap());
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn level_filter_is_honored() {
        let logger = SimpleLogger::to_stderr("test");
        let trace = log::Metadata::builder().level(log::Level::Trace).build();
        let info = log::Metadata::builder().level(log::Level::Info).build();

        log::set_max_level(LevelFilter::Info);
        assert!(logger.enabled(&info));
        assert!(!logger.enabled(&trace));
    }

    #[test]
    fn warnings_are_tagged() {
        log::set_max_level(LevelFilter::Info);

        let target = SharedBuffer::default();
        let logger = SimpleLogger {
            target: target.clone(),
            prefix: "sigwatch: ",
        };

        logger.log(
            &log::Record::builder()
                .args(format_args!("caught SIGHUP"))
                .level(log::Level::Info)
                .build(),
        );
        logger.log(
            &log::Record::builder()
                .args(format_args!("queue is full"))
                .level(log::Level::Warn)
                .build(),
        );

        assert_eq!(
            target.read(),
            "sigwatch: caught SIGHUP\nsigwatch: warning: queue is full\n"
        );
    }
}
