//! Directory archiving: traversal, entry naming, and zip writing.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};
use uuid::Uuid;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use zipper_core::config::archive::ArchiveConfig;
use zipper_entity::{ArchiveResult, Progress};

use crate::error::ArchiveError;
use crate::sink::ProgressSink;

/// Entries at or above this size need zip64 headers.
const LARGE_FILE_THRESHOLD: u64 = u32::MAX as u64;

/// Archives directories according to the configured output format.
#[derive(Debug, Clone)]
pub struct ArchiveExecutor {
    /// Archive extension without the leading dot.
    extension: String,
    /// Deflate level, `None` for the codec default.
    compression_level: Option<i64>,
}

impl ArchiveExecutor {
    /// Create an executor from configuration.
    pub fn new(config: &ArchiveConfig) -> Self {
        Self {
            extension: config.extension.trim_start_matches('.').to_string(),
            compression_level: config.compression_level,
        }
    }

    /// Archive `input_dir` into `output_dir` in one call.
    pub fn execute(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        on_progress: impl ProgressSink,
    ) -> Result<ArchiveResult, ArchiveError> {
        let plan = self.prepare(input_dir, output_dir)?;
        if plan.is_empty() {
            return Ok(plan.empty_result());
        }
        plan.write(on_progress, &AtomicBool::new(false))
    }

    /// Validate the input, create the output directory, and enumerate files.
    ///
    /// The archive is named after `input_dir` as given, so a symlinked input
    /// takes the link's name while its target is traversed. Nothing is
    /// written into `output_dir` besides the directory itself.
    pub fn prepare(&self, input_dir: &Path, output_dir: &Path) -> Result<ArchivePlan, ArchiveError> {
        let invalid = || ArchiveError::InvalidInput {
            path: input_dir.to_path_buf(),
        };

        match fs::metadata(input_dir) {
            Ok(meta) if meta.is_dir() => {}
            _ => return Err(invalid()),
        }

        let root = fs::canonicalize(input_dir).map_err(|_| invalid())?;
        let base_name = lexical_file_name(input_dir)
            .or_else(|| root.file_name().map(|name| name.to_string_lossy().into_owned()))
            .ok_or_else(invalid)?;

        let archive_path = output_dir.join(format!("{base_name}.{}", self.extension));

        // create_dir_all treats a directory created concurrently as success.
        fs::create_dir_all(output_dir).map_err(|source| ArchiveError::DirectoryCreate {
            path: output_dir.to_path_buf(),
            source,
        })?;

        let files = collect_files(&root)?;

        debug!(
            input = %root.display(),
            archive = %archive_path.display(),
            files = files.len(),
            "Prepared archive plan"
        );

        Ok(ArchivePlan {
            root,
            archive_path,
            files,
            compression_level: self.compression_level,
        })
    }
}

/// A fully enumerated archive job, ready to be written.
#[derive(Debug, Clone)]
pub struct ArchivePlan {
    /// Canonical input directory.
    root: PathBuf,
    /// Final archive location.
    archive_path: PathBuf,
    /// Every regular file under `root`, sorted by path.
    files: Vec<PathBuf>,
    /// Deflate level.
    compression_level: Option<i64>,
}

impl ArchivePlan {
    /// Canonical input directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the archive will be written.
    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    /// Number of files that will be archived.
    pub fn files_total(&self) -> u64 {
        self.files.len() as u64
    }

    /// Whether the input held no regular files.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// In-archive entry names, in write order.
    pub fn entry_names(&self) -> Vec<String> {
        self.files
            .iter()
            .map(|file| entry_name(&self.root, file))
            .collect()
    }

    /// Result for an input without files. No archive is written.
    pub fn empty_result(&self) -> ArchiveResult {
        ArchiveResult::empty(self.archive_path.to_string_lossy())
    }

    /// Write every file into the archive, reporting progress after each one.
    ///
    /// The archive is assembled in a hidden sibling file and renamed into
    /// place on success, so `archive_path` never holds a partial archive.
    /// `cancel` is checked before each file.
    pub fn write(
        &self,
        mut on_progress: impl ProgressSink,
        cancel: &AtomicBool,
    ) -> Result<ArchiveResult, ArchiveError> {
        let temp_path = self.temp_path();

        let outcome = self.write_to(&temp_path, &mut on_progress, cancel).and_then(|()| {
            fs::rename(&temp_path, &self.archive_path)
                .map_err(|e| ArchiveError::write(&self.archive_path, e))
        });

        if let Err(err) = outcome {
            if let Err(e) = fs::remove_file(&temp_path) {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(
                        path = %temp_path.display(),
                        error = %e,
                        "Failed to remove partial archive"
                    );
                }
            }
            return Err(err);
        }

        Ok(ArchiveResult::succeeded(
            self.archive_path.to_string_lossy(),
            self.files_total(),
        ))
    }

    fn write_to(
        &self,
        temp_path: &Path,
        on_progress: &mut impl ProgressSink,
        cancel: &AtomicBool,
    ) -> Result<(), ArchiveError> {
        let file = File::create(temp_path).map_err(|e| ArchiveError::write(temp_path, e))?;
        let mut zip = ZipWriter::new(file);
        let total = self.files_total();

        for (index, path) in self.files.iter().enumerate() {
            if cancel.load(Ordering::Relaxed) {
                return Err(ArchiveError::Cancelled { path: path.clone() });
            }

            let name = entry_name(&self.root, path);
            let source = File::open(path).map_err(|e| ArchiveError::write(path, e))?;
            let size = source
                .metadata()
                .map_err(|e| ArchiveError::write(path, e))?
                .len();

            let options = SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .compression_level(self.compression_level)
                .large_file(size >= LARGE_FILE_THRESHOLD);

            zip.start_file(name.as_str(), options)
                .map_err(|e| ArchiveError::write(path, io::Error::other(e)))?;
            io::copy(&mut BufReader::new(source), &mut zip)
                .map_err(|e| ArchiveError::write(path, e))?;

            let processed = index as u64 + 1;
            on_progress.report(Progress::new(processed, total, name));
        }

        zip.finish()
            .map_err(|e| ArchiveError::write(temp_path, io::Error::other(e)))?;
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .archive_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.archive_path.with_file_name(format!(
            ".{file_name}.{}.partial",
            Uuid::new_v4().simple()
        ))
    }
}

/// Recursively collect every regular file under `root`. Symlinks are not
/// followed and are not archived.
fn collect_files(root: &Path) -> Result<Vec<PathBuf>, ArchiveError> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            let source = e
                .into_io_error()
                .unwrap_or_else(|| io::Error::other("filesystem loop detected"));
            ArchiveError::Traversal { path, source }
        })?;

        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

/// Last component of `path` with `.` and `..` resolved lexically.
/// Symlinks are left unresolved.
fn lexical_file_name(path: &Path) -> Option<String> {
    let absolute = std::path::absolute(path).ok()?;
    let mut parts = Vec::new();
    for component in absolute.components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::ParentDir => {
                parts.pop();
            }
            _ => {}
        }
    }
    parts.last().map(|part| part.to_string_lossy().into_owned())
}

/// POSIX-style path of `file` relative to `root`.
fn entry_name(root: &Path, file: &Path) -> String {
    let relative = file.strip_prefix(root).unwrap_or(file);
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::sync::{Arc, Barrier};

    use zip::ZipArchive;
    use zipper_entity::JobState;

    fn executor() -> ArchiveExecutor {
        ArchiveExecutor::new(&ArchiveConfig::default())
    }

    fn write(path: &Path, contents: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn read_entries(archive: &Path) -> Vec<(String, Vec<u8>)> {
        let mut zip = ZipArchive::new(File::open(archive).unwrap()).unwrap();
        let mut entries = Vec::new();
        for i in 0..zip.len() {
            let mut entry = zip.by_index(i).unwrap();
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes).unwrap();
            entries.push((entry.name().to_string(), bytes));
        }
        entries.sort();
        entries
    }

    fn leftovers(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".partial"))
            .collect()
    }

    #[test]
    fn test_archives_relative_entries_byte_identical() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("photos");
        write(&input.join("a.txt"), b"alpha");
        write(&input.join("sub/b.txt"), b"bravo bravo bravo");
        let output = tmp.path().join("out");

        let mut events = Vec::new();
        let result = executor()
            .execute(&input, &output, |p: Progress| events.push(p))
            .unwrap();

        assert_eq!(result.state, JobState::Succeeded);
        assert_eq!(result.files_archived, 2);
        assert_eq!(
            PathBuf::from(&result.archive_path),
            output.join("photos.zip")
        );
        assert_eq!(
            read_entries(&output.join("photos.zip")),
            vec![
                ("a.txt".to_string(), b"alpha".to_vec()),
                ("sub/b.txt".to_string(), b"bravo bravo bravo".to_vec()),
            ]
        );
        assert!(leftovers(&output).is_empty());
    }

    #[test]
    fn test_progress_is_strictly_increasing_and_ends_at_hundred() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("docs");
        for i in 0..7 {
            write(&input.join(format!("d{}/f{i}.txt", i % 3)), b"x");
        }

        let mut events = Vec::new();
        executor()
            .execute(&input, &tmp.path().join("out"), |p: Progress| events.push(p))
            .unwrap();

        assert_eq!(events.len(), 7);
        for pair in events.windows(2) {
            assert!(pair[1].files_processed > pair[0].files_processed);
            assert!(pair[1].percent >= pair[0].percent);
        }
        let last = events.last().unwrap();
        assert_eq!(last.files_processed, 7);
        assert_eq!(last.files_total, 7);
        assert_eq!(last.percent, 100);
        assert!(events.iter().all(|p| p.files_total == 7));
    }

    #[test]
    fn test_entry_count_matches_file_count() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("tree");
        write(&input.join("one"), b"1");
        write(&input.join("deep/er/still/two"), b"2");
        write(&input.join("deep/three"), b"3");
        fs::create_dir_all(input.join("hollow/inside")).unwrap();

        let output = tmp.path().join("out");
        let result = executor().execute(&input, &output, |_: Progress| {}).unwrap();

        let zip = ZipArchive::new(File::open(output.join("tree.zip")).unwrap()).unwrap();
        assert_eq!(zip.len(), 3);
        assert_eq!(result.files_archived, 3);
    }

    #[test]
    fn test_empty_tree_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("nothing");
        fs::create_dir_all(input.join("a/b/c")).unwrap();
        let output = tmp.path().join("out");

        let mut events = 0;
        let result = executor()
            .execute(&input, &output, |_: Progress| events += 1)
            .unwrap();

        assert_eq!(result.state, JobState::Empty);
        assert_eq!(result.files_archived, 0);
        assert_eq!(events, 0);
        assert!(!output.join("nothing.zip").exists());
        assert!(output.is_dir());
        assert!(leftovers(&output).is_empty());
    }

    #[test]
    fn test_invalid_input() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("plain.txt");
        write(&file, b"not a dir");

        for input in [tmp.path().join("missing"), file] {
            let err = executor()
                .prepare(&input, &tmp.path().join("out"))
                .unwrap_err();
            assert!(matches!(err, ArchiveError::InvalidInput { .. }));
            assert_eq!(err.path(), input.as_path());
        }
        assert!(!tmp.path().join("out").exists());
    }

    #[test]
    fn test_trailing_separator_and_relative_segments() {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join("music/track.flac"), b"la");

        let input = PathBuf::from(format!("{}/music/", tmp.path().display()));
        let plan = executor().prepare(&input, &tmp.path().join("out")).unwrap();
        assert_eq!(plan.archive_path(), tmp.path().join("out/music.zip"));

        let dotted = tmp.path().join("music/../music/.");
        let plan = executor().prepare(&dotted, &tmp.path().join("out")).unwrap();
        assert_eq!(plan.archive_path(), tmp.path().join("out/music.zip"));
        assert_eq!(plan.entry_names(), vec!["track.flac".to_string()]);
    }

    #[test]
    fn test_creates_nested_output_dir() {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join("src/a"), b"a");
        let output = tmp.path().join("x/y/z");

        executor()
            .execute(&tmp.path().join("src"), &output, |_: Progress| {})
            .unwrap();
        assert!(output.join("src.zip").is_file());
    }

    #[test]
    fn test_output_dir_blocked_by_file() {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join("src/a"), b"a");
        let blocker = tmp.path().join("out");
        write(&blocker, b"i am a file");

        let err = executor()
            .prepare(&tmp.path().join("src"), &blocker)
            .unwrap_err();
        assert!(matches!(err, ArchiveError::DirectoryCreate { .. }));
    }

    #[test]
    fn test_concurrent_prepare_on_shared_output() {
        let tmp = tempfile::tempdir().unwrap();
        let output = Arc::new(tmp.path().join("shared/out"));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let input = tmp.path().join(format!("in{i}"));
                write(&input.join("f"), b"f");
                let output = Arc::clone(&output);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    executor().execute(&input, &output, |_: Progress| {})
                })
            })
            .collect();

        for handle in handles {
            let result = handle.join().unwrap().unwrap();
            assert_eq!(result.state, JobState::Succeeded);
        }
        assert_eq!(fs::read_dir(output.as_path()).unwrap().count(), 8);
    }

    #[test]
    fn test_rerun_overwrites_deterministically() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("proj");
        write(&input.join("readme"), b"v1");
        write(&input.join("old.txt"), b"gone soon");
        let output = tmp.path().join("out");

        executor().execute(&input, &output, |_: Progress| {}).unwrap();

        write(&input.join("readme"), b"v2");
        fs::remove_file(input.join("old.txt")).unwrap();
        executor().execute(&input, &output, |_: Progress| {}).unwrap();

        assert_eq!(
            read_entries(&output.join("proj.zip")),
            vec![("readme".to_string(), b"v2".to_vec())]
        );
        assert!(leftovers(&output).is_empty());
    }

    #[test]
    fn test_write_failure_is_not_success() {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join("src/a"), b"a");
        let output = tmp.path().join("out");
        // A non-empty directory squatting on the archive path defeats the rename.
        write(&output.join("src.zip/keep"), b"k");

        let err = executor()
            .execute(&tmp.path().join("src"), &output, |_: Progress| {})
            .unwrap_err();

        assert!(matches!(err, ArchiveError::ArchiveWrite { .. }));
        assert_eq!(err.path(), output.join("src.zip").as_path());
        assert!(output.join("src.zip/keep").is_file());
        assert!(leftovers(&output).is_empty());
    }

    #[test]
    fn test_cancel_flag_stops_before_next_file() {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join("src/a"), b"a");
        write(&tmp.path().join("src/b"), b"b");
        let output = tmp.path().join("out");

        let plan = executor().prepare(&tmp.path().join("src"), &output).unwrap();
        let cancel = AtomicBool::new(false);
        let err = plan
            .write(
                |p: Progress| {
                    if p.files_processed == 1 {
                        cancel.store(true, Ordering::Relaxed);
                    }
                },
                &cancel,
            )
            .unwrap_err();

        assert!(matches!(err, ArchiveError::Cancelled { .. }));
        assert!(err.path().ends_with("b"));
        assert!(!output.join("src.zip").exists());
        assert!(leftovers(&output).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_not_archived() {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join("elsewhere/secret"), b"s");
        write(&tmp.path().join("src/real"), b"r");
        std::os::unix::fs::symlink(tmp.path().join("elsewhere"), tmp.path().join("src/dirlink"))
            .unwrap();
        std::os::unix::fs::symlink(
            tmp.path().join("elsewhere/secret"),
            tmp.path().join("src/filelink"),
        )
        .unwrap();

        let plan = executor()
            .prepare(&tmp.path().join("src"), &tmp.path().join("out"))
            .unwrap();
        assert_eq!(plan.entry_names(), vec!["real".to_string()]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_input_is_named_after_the_link() {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join("a/data/one"), b"1");
        write(&tmp.path().join("b/data/two"), b"2");
        std::os::unix::fs::symlink(tmp.path().join("a/data"), tmp.path().join("alpha")).unwrap();
        std::os::unix::fs::symlink(tmp.path().join("b/data"), tmp.path().join("beta")).unwrap();
        let output = tmp.path().join("out");

        let first = executor()
            .execute(&tmp.path().join("alpha"), &output, |_: Progress| {})
            .unwrap();
        let second = executor()
            .execute(&tmp.path().join("beta"), &output, |_: Progress| {})
            .unwrap();

        assert_eq!(PathBuf::from(&first.archive_path), output.join("alpha.zip"));
        assert_eq!(PathBuf::from(&second.archive_path), output.join("beta.zip"));
        assert_eq!(
            read_entries(&output.join("alpha.zip")),
            vec![("one".to_string(), b"1".to_vec())]
        );
        assert_eq!(
            read_entries(&output.join("beta.zip")),
            vec![("two".to_string(), b"2".to_vec())]
        );
    }

    #[test]
    fn test_file_removed_after_prepare_fails_the_write() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["a", "b", "c"] {
            write(&tmp.path().join("src").join(name), name.as_bytes());
        }
        let output = tmp.path().join("out");

        let plan = executor().prepare(&tmp.path().join("src"), &output).unwrap();
        fs::remove_file(tmp.path().join("src/b")).unwrap();

        let mut reported = Vec::new();
        let err = plan
            .write(
                |p: Progress| reported.push(p.files_processed),
                &AtomicBool::new(false),
            )
            .unwrap_err();

        assert!(matches!(err, ArchiveError::ArchiveWrite { .. }));
        assert_eq!(err.path(), plan.root().join("b").as_path());
        assert_eq!(reported, vec![1]);
        assert!(!output.join("src.zip").exists());
        assert!(leftovers(&output).is_empty());
    }

    #[test]
    fn test_custom_extension() {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join("src/a"), b"a");
        let executor = ArchiveExecutor::new(&ArchiveConfig {
            extension: ".cbz".to_string(),
            compression_level: Some(9),
        });

        let plan = executor
            .prepare(&tmp.path().join("src"), &tmp.path().join("out"))
            .unwrap();
        assert_eq!(plan.archive_path(), tmp.path().join("out/src.cbz"));
    }
}
