//! Load-order driver.
//!
//! [`ContentLoader`] opens content files one at a time in load order,
//! resolves each file's masters against the files already loaded, and
//! walks it into a shared [`ContentStore`]. Cells are only shallow loaded;
//! [`ContentLoader::materialize`] reads their deferred contents later from
//! the files registered here.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};

use super::cells;
use super::codec::strings::same_file_name;
use super::content::ContentStore;
use super::format::header;
use super::groups::GroupWalker;
use super::reader::Esm4Reader;
use super::types::diagnostics::Diagnostic;
use super::types::error::{Esm4Error, Result};
use super::types::formid::{FormId, FormIdMap};
use super::types::models::{FileHeader, RecordType};

/// Called with the file name and a value in `0..=progress_range`.
pub type ProgressCallback = Box<dyn FnMut(&str, u32)>;

/// Knobs for a load.
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// Kinds whose top-level groups are walked; every other top-level group is skipped.
    pub eager_types: Vec<RecordType>,
    /// Leave temporary and visible-distance children for [`ContentLoader::materialize`].
    pub defer_cell_children: bool,
    pub progress_range: u32,
    /// Checked between files; setting it stops the load at the next file boundary.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            eager_types: RecordType::eager_default(),
            defer_cell_children: true,
            progress_range: 1000,
            cancel: None,
        }
    }
}

impl LoaderOptions {
    pub fn with_eager_types(mut self, eager_types: Vec<RecordType>) -> Self {
        self.eager_types = eager_types;
        self
    }

    pub fn with_deferred_cell_children(mut self, defer: bool) -> Self {
        self.defer_cell_children = defer;
        self
    }

    pub fn with_progress_range(mut self, range: u32) -> Self {
        self.progress_range = range;
        self
    }

    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn is_eager(&self, record_type: RecordType) -> bool {
        self.eager_types.contains(&record_type)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }
}

/// How a multi-file load ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Completed,
    /// Stopped at a file boundary; `files_loaded` files are fully in the store.
    Cancelled { files_loaded: usize },
}

/// A loaded content file, kept so deferred groups can be read later.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub name: String,
    pub index: usize,
    pub header: FileHeader,
    pub form_ids: FormIdMap,
}

impl SourceFile {
    /// Reopens the file with the header width and FormId map of its first read.
    pub fn open(&self) -> Result<Esm4Reader<BufReader<File>>> {
        debug!("Reopening {}", self.path.display());
        let file = File::open(&self.path)?;
        let mut reader = Esm4Reader::new(BufReader::new(file), self.index)?;
        reader.set_header_width(self.header.header_width);
        reader.set_form_ids(self.form_ids.clone());
        Ok(reader)
    }
}

pub struct ContentLoader {
    options: LoaderOptions,
    store: ContentStore,
    sources: Vec<SourceFile>,
    diagnostics: Vec<Diagnostic>,
    progress: Option<ProgressCallback>,
}

impl ContentLoader {
    pub fn new(options: LoaderOptions) -> Self {
        Self {
            options,
            store: ContentStore::new(),
            sources: Vec::new(),
            diagnostics: Vec::new(),
            progress: None,
        }
    }

    pub fn with_progress<F>(mut self, progress: F) -> Self
    where
        F: FnMut(&str, u32) + 'static,
    {
        self.progress = Some(Box::new(progress));
        self
    }

    /// Loads the next file in load order.
    ///
    /// # Errors
    /// Every error is fatal for the load and names the offending file.
    /// Notably, each master named in the file header must already be
    /// loaded. A file that fails is not registered, and the deferred groups
    /// it left are dropped; records it merged before failing stay.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.load_file_named(path, &name)
            .map_err(|e| e.in_file(&name))
    }

    fn load_file_named(&mut self, path: &Path, name: &str) -> Result<()> {
        let index = self.sources.len();
        if index >= FormId::RUNTIME_FILE_INDEX as usize {
            return Err(Esm4Error::TooManyFiles {
                max: FormId::RUNTIME_FILE_INDEX as usize,
            });
        }
        info!("Loading {} as file {}", path.display(), index);

        let file = File::open(path)?;
        let mut reader = Esm4Reader::new(BufReader::new(file), index)?;
        let file_header = header::parse(&mut reader)?;

        let parent_indices = file_header
            .masters
            .iter()
            .map(|master| {
                self.sources
                    .iter()
                    .position(|s| same_file_name(&s.name, master))
                    .map(|i| i as u8)
                    .ok_or_else(|| Esm4Error::MissingMaster {
                        file: name.to_string(),
                        master: master.clone(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        debug!("Masters of {} map to files {:?}", name, parent_indices);
        let form_ids = FormIdMap::new(parent_indices, index as u8);
        reader.set_form_ids(form_ids.clone());

        let walked = GroupWalker::new(
            &mut reader,
            &mut self.store,
            &self.options,
            &mut self.diagnostics,
            name,
            file_header.is_localized(),
        )
        .with_progress(self.progress.as_mut())
        .walk_file();
        if let Err(e) = walked {
            let dropped = self.store.cells_mut().discard_file(index);
            warn!("{} failed to load; dropped {} deferred groups it left", name, dropped);
            return Err(e);
        }

        self.sources.push(SourceFile {
            path: path.to_path_buf(),
            name: name.to_string(),
            index,
            header: file_header,
            form_ids,
        });
        info!("Loaded {}", name);
        Ok(())
    }

    /// Loads files in order, then resolves cross-references.
    ///
    /// The cancel flag is checked before each file; a cancelled load keeps
    /// the files already loaded.
    pub fn load_files<I, P>(&mut self, paths: I) -> Result<LoadOutcome>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut outcome = LoadOutcome::Completed;
        for path in paths {
            if self.options.is_cancelled() {
                warn!("Load cancelled after {} files", self.sources.len());
                outcome = LoadOutcome::Cancelled {
                    files_loaded: self.sources.len(),
                };
                break;
            }
            self.load_file(path)?;
        }
        self.finalize();
        Ok(outcome)
    }

    /// Resolves portal destinations over everything loaded so far.
    pub fn finalize(&mut self) -> usize {
        info!("Finalizing {} files", self.sources.len());
        self.store.finalize()
    }

    /// Reads a cell's deferred children from every file that contributed them.
    pub fn materialize(&mut self, cell: FormId) -> Result<usize> {
        let merged = cells::materialize(&mut self.store, &self.sources, cell, &mut self.diagnostics)?;
        if merged > 0 {
            self.store.finalize();
        }
        Ok(merged)
    }

    /// Materializes every cell that still has pending snapshots.
    pub fn materialize_all(&mut self) -> Result<usize> {
        let pending: Vec<FormId> = self
            .store
            .cells()
            .cells()
            .list_identifiers()
            .iter()
            .copied()
            .filter(|&id| self.store.needs_materialization(id))
            .collect();
        info!("Materializing {} cells", pending.len());

        let mut merged = 0;
        for id in pending {
            merged += cells::materialize(&mut self.store, &self.sources, id, &mut self.diagnostics)?;
        }
        self.store.finalize();
        Ok(merged)
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ContentStore {
        &mut self.store
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn sources(&self) -> &[SourceFile] {
        &self.sources
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// Gives up the store, keeping nothing needed for later materialization.
    pub fn into_store(self) -> ContentStore {
        self.store
    }
}
