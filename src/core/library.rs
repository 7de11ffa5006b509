//! Purpose: Own a loaded kernel library and resolve its exported symbols by name.
//! Exports: `NativeLibrary`, `LoadOptions`, `SymbolSource`, `prepend_library_search_path`.
//! Role: Leaf of the native boundary; every other module reaches native code through here.
//! Invariants: Symbols are resolved on demand and never outlive the `NativeLibrary`.
//! Invariants: Dependency search-path edits are process-wide and never undone.
use std::env;
use std::ffi::c_void;
use std::mem;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

use libc::c_int;
use libloading::Library;

use crate::core::error::{Error, ErrorKind};
use crate::core::workdir::WorkingDirectory;

/// Name-based lookup of exported functions and globals.
///
/// Implemented for `libloading::Library`; an in-process table of `extern "C"`
/// functions can implement it to stand in for a shared library.
pub trait SymbolSource {
    fn symbol(&self, name: &str) -> Option<NonNull<c_void>>;
}

impl SymbolSource for Library {
    fn symbol(&self, name: &str) -> Option<NonNull<c_void>> {
        let mut raw = Vec::with_capacity(name.len() + 1);
        raw.extend_from_slice(name.as_bytes());
        raw.push(0);
        // SAFETY: the symbol is only read as an address here; typing happens in
        // `NativeLibrary::function` / `constant_int` under their own contracts.
        let sym = unsafe { self.get::<*mut c_void>(&raw) }.ok()?;
        NonNull::new(*sym)
    }
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    dependency_dir: Option<PathBuf>,
    working_directory: Option<PathBuf>,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory holding the kernel's own shared-library dependencies.
    pub fn with_dependency_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dependency_dir = Some(dir.into());
        self
    }

    /// Directory the kernel expects as cwd while it runs. Defaults to the cwd at load time.
    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn dependency_dir(&self) -> Option<&Path> {
        self.dependency_dir.as_deref()
    }

    pub fn working_directory(&self) -> Option<&Path> {
        self.working_directory.as_deref()
    }
}

pub struct NativeLibrary {
    name: String,
    path: Option<PathBuf>,
    working_directory: PathBuf,
    symbols: Box<dyn SymbolSource>,
}

impl std::fmt::Debug for NativeLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeLibrary")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("working_directory", &self.working_directory)
            .finish_non_exhaustive()
    }
}

impl NativeLibrary {
    pub fn load(path: impl AsRef<Path>, options: &LoadOptions) -> Result<Self, Error> {
        let path = path.as_ref();
        if let Some(dir) = options.dependency_dir() {
            prepend_library_search_path(dir)?;
        }
        let working_directory = resolve_working_directory(options.working_directory())?;

        // SAFETY: loading runs the library's initializers; the kernel is trusted by contract.
        let library = unsafe { Library::new(path) }.map_err(|err| {
            Error::new(ErrorKind::Load)
                .with_message("failed to load shared library")
                .with_path(path)
                .with_source(err)
        })?;

        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        tracing::debug!(library = %name, workdir = %working_directory.display(), "loaded kernel library");

        Ok(Self {
            name,
            path: Some(path.to_path_buf()),
            working_directory,
            symbols: Box::new(library),
        })
    }

    pub fn from_symbols(
        name: impl Into<String>,
        symbols: impl SymbolSource + 'static,
        working_directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            path: None,
            working_directory: working_directory.into(),
            symbols: Box::new(symbols),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    pub fn enter_working_directory(&self) -> Result<WorkingDirectory, Error> {
        WorkingDirectory::enter(&self.working_directory)
    }

    pub fn has_symbol(&self, name: &str) -> bool {
        self.symbols.symbol(name).is_some()
    }

    pub fn constant_int(&self, name: &str) -> Result<i32, Error> {
        let ptr = self.global(name)?;
        // SAFETY: exported length constants and knobs are C `int` globals.
        Ok(unsafe { ptr.cast::<c_int>().as_ptr().read() })
    }

    pub fn set_constant_int(&self, name: &str, value: i32) -> Result<(), Error> {
        let ptr = self.global(name)?;
        // SAFETY: see `constant_int`; the global lives as long as the library.
        unsafe { ptr.cast::<c_int>().as_ptr().write(value) };
        Ok(())
    }

    /// Resolve `name` as a function pointer of type `F`.
    ///
    /// # Safety
    /// `F` must be an `extern "C"` function pointer type matching the exported
    /// symbol's actual signature, and must not be called after `self` is dropped.
    pub unsafe fn function<F: Copy>(&self, name: &str) -> Result<F, Error> {
        if mem::size_of::<F>() != mem::size_of::<*mut c_void>() {
            return Err(Error::new(ErrorKind::Internal)
                .with_message("function type is not pointer sized")
                .with_function(name));
        }
        let ptr = self.lookup(name)?.as_ptr();
        // SAFETY: size checked above; signature guaranteed by the caller.
        Ok(unsafe { mem::transmute_copy::<*mut c_void, F>(&ptr) })
    }

    fn global(&self, name: &str) -> Result<NonNull<c_void>, Error> {
        self.lookup(name)
            .map_err(|err| err.with_message("exported integer not found"))
    }

    fn lookup(&self, name: &str) -> Result<NonNull<c_void>, Error> {
        self.symbols.symbol(name).ok_or_else(|| {
            Error::new(ErrorKind::Lookup)
                .with_message("symbol not found")
                .with_function(name)
        })
    }
}

/// Prepend `dir` to the dynamic-linker search variable (`PATH` on Windows,
/// `LD_LIBRARY_PATH` elsewhere) so the kernel's own dependencies resolve.
///
/// The edit is process-wide, cumulative, and never reverted. Call it during
/// single-threaded setup only.
pub fn prepend_library_search_path(dir: &Path) -> Result<(), Error> {
    let var = if cfg!(windows) { "PATH" } else { "LD_LIBRARY_PATH" };
    let mut paths = vec![dir.to_path_buf()];
    if let Some(existing) = env::var_os(var) {
        paths.extend(env::split_paths(&existing));
    }
    let joined = env::join_paths(paths).map_err(|err| {
        Error::new(ErrorKind::Input)
            .with_message("dependency path cannot be joined into the search path")
            .with_path(dir)
            .with_source(err)
    })?;
    tracing::debug!(var, dir = %dir.display(), "prepending library search path");
    // SAFETY: documented as a setup-time, single-threaded mutation of the environment.
    unsafe { env::set_var(var, joined) };
    Ok(())
}

fn resolve_working_directory(requested: Option<&Path>) -> Result<PathBuf, Error> {
    let cwd = env::current_dir().map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read current directory")
            .with_source(err)
    })?;
    Ok(match requested {
        Some(dir) if dir.is_absolute() => dir.to_path_buf(),
        Some(dir) => cwd.join(dir),
        None => cwd,
    })
}
