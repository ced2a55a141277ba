use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::utils;
use super::{CpuTimes, FileHandles, KeyValueStat, LoadAverage, MemInfo, NetDevStat, SingleLineStat};

/// One reading of every host-wide procfs file.
///
/// A field is `None` when its file was unavailable or could not be parsed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostStats {
    pub cpu: Option<CpuTimes>,
    pub memory: Option<MemInfo>,
    pub network: Option<NetDevStat>,
    pub load: Option<LoadAverage>,
    pub file_handles: Option<FileHandles>,
}

/// Keeps the host-wide procfs files open and re-reads them on demand.
#[derive(Debug)]
pub struct HostFiles {
    stat_file: Option<BufReader<File>>,
    meminfo_file: Option<BufReader<File>>,
    net_dev_file: Option<BufReader<File>>,
    loadavg_file: Option<BufReader<File>>,
    file_nr_file: Option<BufReader<File>>,
}

fn read_logged<T, R>(
    what: &str,
    file: Option<&mut BufReader<File>>,
    reader: R,
) -> Option<T>
where
    R: FnOnce(&mut BufReader<File>) -> std::io::Result<T>,
{
    match utils::rewind_and_read(file, reader) {
        Ok(value) => value,
        Err(err) => {
            log::debug!("failed reading {what}: {err}");
            None
        }
    }
}

impl HostFiles {
    /// Opens the standard files below `proc_root`.
    pub fn open(proc_root: impl AsRef<Path>) -> Self {
        let root = proc_root.as_ref();
        let mut builder = HostFilesBuilder::default();
        builder
            .set_stat_file(root.join("stat"))
            .set_meminfo_file(root.join("meminfo"))
            .set_net_dev_file(root.join("net/dev"))
            .set_loadavg_file(root.join("loadavg"))
            .set_file_nr_file(root.join("sys/fs/file-nr"));
        builder.build()
    }

    /// Reads every file. Never fails; unavailable sources are left as `None`.
    pub fn refresh(&mut self) -> HostStats {
        HostStats {
            cpu: read_logged("/proc/stat", self.stat_file.as_mut(), CpuTimes::from_reader),
            memory: read_logged(
                "/proc/meminfo",
                self.meminfo_file.as_mut(),
                MemInfo::from_reader,
            ),
            network: read_logged(
                "/proc/net/dev",
                self.net_dev_file.as_mut(),
                NetDevStat::from_reader,
            ),
            load: read_logged(
                "/proc/loadavg",
                self.loadavg_file.as_mut(),
                LoadAverage::from_reader,
            ),
            file_handles: read_logged(
                "/proc/sys/fs/file-nr",
                self.file_nr_file.as_mut(),
                FileHandles::from_reader,
            ),
        }
    }
}

#[derive(Debug, Default)]
pub struct HostFilesBuilder {
    stat_file: Option<BufReader<File>>,
    meminfo_file: Option<BufReader<File>>,
    net_dev_file: Option<BufReader<File>>,
    loadavg_file: Option<BufReader<File>>,
    file_nr_file: Option<BufReader<File>>,
}

impl HostFilesBuilder {
    /// Sets the path to the aggregate CPU counters (`/proc/stat`).
    pub fn set_stat_file(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.stat_file = utils::open_file(path);
        self
    }

    /// Sets the path to `/proc/meminfo`.
    pub fn set_meminfo_file(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.meminfo_file = utils::open_file(path);
        self
    }

    /// Sets the path to the interface counters (`/proc/net/dev`).
    pub fn set_net_dev_file(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.net_dev_file = utils::open_file(path);
        self
    }

    pub fn set_loadavg_file(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.loadavg_file = utils::open_file(path);
        self
    }

    pub fn set_file_nr_file(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.file_nr_file = utils::open_file(path);
        self
    }

    /// Builds the `HostFiles`. Paths never set stay unavailable.
    pub fn build(self) -> HostFiles {
        HostFiles {
            stat_file: self.stat_file,
            meminfo_file: self.meminfo_file,
            net_dev_file: self.net_dev_file,
            loadavg_file: self.loadavg_file,
            file_nr_file: self.file_nr_file,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_missing_files_yield_none() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = HostFiles::open(dir.path());
        assert_eq!(files.refresh(), HostStats::default());
    }

    #[test]
    fn test_refresh_sees_rewritten_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "stat", "cpu 1 0 1 8 0 0 0 0\n");
        write(dir.path(), "loadavg", "0.10 0.20 0.30 1/100 42\n");
        write(dir.path(), "sys/fs/file-nr", "100 10 1000\n");

        let mut files = HostFiles::open(dir.path());
        let first = files.refresh();
        assert_eq!(first.cpu.unwrap().total(), 10);
        assert_eq!(first.file_handles.unwrap().open(), 90);
        assert_eq!(first.load.unwrap().five, 0.20);
        assert!(first.memory.is_none());

        write(dir.path(), "stat", "cpu 2 0 2 16 0 0 0 0\n");
        let second = files.refresh();
        assert_eq!(second.cpu.unwrap().total(), 20);
    }

    #[test]
    fn test_malformed_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "loadavg", "garbage\n");
        let mut files = HostFiles::open(dir.path());
        assert!(files.refresh().load.is_none());
    }
}
