//! File-backed [`ExperimentLog`]: one CSV file per log, header row first.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, warn};

use crate::error::{StateError, StateResult};
use crate::records::{
    EvaluationRecord, FitnessRecord, LogRecord, PartialRecord, PopulationRecord,
};
use crate::storage_traits::ExperimentLog;

/// CSV logs living in one directory.
#[derive(Debug, Clone)]
pub struct CsvExperimentLog {
    dir: PathBuf,
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StateError + '_ {
    move |source| StateError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Cut a final line left without newline by an interrupted append.
async fn drop_torn_tail<T: LogRecord>(file: &mut fs::File, path: &Path) -> StateResult<()> {
    let len = file.metadata().await.map_err(io_err(path))?.len();
    if len == 0 {
        return Ok(());
    }
    file.seek(SeekFrom::End(-1)).await.map_err(io_err(path))?;
    if file.read_u8().await.map_err(io_err(path))? == b'\n' {
        return Ok(());
    }
    let mut bytes = Vec::with_capacity(len as usize);
    file.seek(SeekFrom::Start(0)).await.map_err(io_err(path))?;
    file.read_to_end(&mut bytes).await.map_err(io_err(path))?;
    let keep = bytes.iter().rposition(|b| *b == b'\n').map_or(0, |i| i + 1);
    warn!(file = T::FILE, dropped = bytes.len() - keep, "dropping partial trailing row");
    file.set_len(keep as u64).await.map_err(io_err(path))?;
    file.sync_data().await.map_err(io_err(path))
}

impl CsvExperimentLog {
    /// Create the four log files with their header rows.
    ///
    /// Fails with [`StateError::AlreadyExists`] rather than truncating a log.
    pub async fn create(dir: impl Into<PathBuf>) -> StateResult<Self> {
        let log = Self { dir: dir.into() };
        fs::create_dir_all(&log.dir)
            .await
            .map_err(io_err(&log.dir))?;
        log.create_file::<PopulationRecord>().await?;
        log.create_file::<EvaluationRecord>().await?;
        log.create_file::<PartialRecord>().await?;
        log.create_file::<FitnessRecord>().await?;
        Ok(log)
    }

    /// Open existing logs; every file must be present.
    pub async fn open(dir: impl Into<PathBuf>) -> StateResult<Self> {
        let log = Self { dir: dir.into() };
        for file in [
            PopulationRecord::FILE,
            EvaluationRecord::FILE,
            PartialRecord::FILE,
            FitnessRecord::FILE,
        ] {
            let path = log.dir.join(file);
            if !fs::try_exists(&path).await.map_err(io_err(&path))? {
                return Err(StateError::Missing(path));
            }
        }
        Ok(log)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn create_file<T: LogRecord>(&self) -> StateResult<()> {
        let path = self.dir.join(T::FILE);
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|source| {
                if source.kind() == std::io::ErrorKind::AlreadyExists {
                    StateError::AlreadyExists(path.clone())
                } else {
                    StateError::Io {
                        path: path.clone(),
                        source,
                    }
                }
            })?;
        file.write_all(format!("{}\n", T::HEADER).as_bytes())
            .await
            .map_err(io_err(&path))?;
        file.sync_all().await.map_err(io_err(&path))
    }

    async fn append<T: LogRecord>(&self, rows: &[T]) -> StateResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let path = self.dir.join(T::FILE);
        let mut buf = String::new();
        for row in rows {
            buf.push_str(&row.to_row());
            buf.push('\n');
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .await
            .map_err(io_err(&path))?;
        drop_torn_tail::<T>(&mut file, &path).await?;
        file.seek(SeekFrom::End(0)).await.map_err(io_err(&path))?;
        file.write_all(buf.as_bytes()).await.map_err(io_err(&path))?;
        file.sync_data().await.map_err(io_err(&path))?;
        debug!(file = T::FILE, rows = rows.len(), "rows appended");
        Ok(())
    }

    async fn read<T: LogRecord>(&self) -> StateResult<Vec<T>> {
        let path = self.dir.join(T::FILE);
        let text = fs::read_to_string(&path).await.map_err(io_err(&path))?;
        let mut lines = text.lines().enumerate();

        match lines.next() {
            Some((_, header)) if header.trim() == T::HEADER => {}
            Some((_, header)) => {
                return Err(StateError::Header {
                    file: T::FILE.to_string(),
                    found: header.to_string(),
                })
            }
            None => return Ok(Vec::new()),
        }

        // A final line without newline is a torn append; ignore it.
        let complete = text.ends_with('\n');
        let total = text.lines().count();

        let mut rows = Vec::new();
        for (idx, line) in lines {
            if line.trim().is_empty() {
                continue;
            }
            if !complete && idx + 1 == total {
                warn!(file = T::FILE, line = idx + 1, "ignoring partial trailing row");
                break;
            }
            let row = T::from_row(line).map_err(|reason| StateError::Parse {
                file: T::FILE.to_string(),
                line: idx + 1,
                reason,
            })?;
            rows.push(row);
        }
        Ok(rows)
    }
}

#[async_trait]
impl ExperimentLog for CsvExperimentLog {
    async fn append_population(&self, rows: &[PopulationRecord]) -> StateResult<()> {
        self.append(rows).await
    }

    async fn append_evaluation(&self, row: &EvaluationRecord) -> StateResult<()> {
        self.append(std::slice::from_ref(row)).await
    }

    async fn append_partial(&self, row: &PartialRecord) -> StateResult<()> {
        self.append(std::slice::from_ref(row)).await
    }

    async fn append_fitness(&self, rows: &[FitnessRecord]) -> StateResult<()> {
        self.append(rows).await
    }

    async fn populations(&self) -> StateResult<Vec<PopulationRecord>> {
        self.read().await
    }

    async fn evaluations(&self) -> StateResult<Vec<EvaluationRecord>> {
        self.read().await
    }

    async fn partials(&self) -> StateResult<Vec<PartialRecord>> {
        self.read().await
    }

    async fn fitness(&self) -> StateResult<Vec<FitnessRecord>> {
        self.read().await
    }
}
