//! 文件打开模式标志
//!
//! 诊断持久化使用的文件子系统边界。

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenFor {
    Writing,
    Appending,
    Reading,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwriteExistingFile {
    Yes,
    No,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateIfNonExistent {
    Yes,
    No,
}

/// Whether the opened handle is kept for later writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsCachedHandle {
    Yes,
    No,
}

/// Opens `path` according to the mode flags.
///
/// `OverwriteExistingFile` only applies to [`OpenFor::Writing`];
/// `CreateIfNonExistent` does not apply to [`OpenFor::Reading`].
pub fn open(
    path: &Path,
    open_for: OpenFor,
    overwrite: OverwriteExistingFile,
    create: CreateIfNonExistent,
) -> io::Result<File> {
    let create = create == CreateIfNonExistent::Yes;
    let mut options = OpenOptions::new();
    match (open_for, overwrite) {
        (OpenFor::Reading, _) => {
            options.read(true);
        }
        (OpenFor::Appending, _) => {
            options.append(true).create(create);
        }
        (OpenFor::Writing, OverwriteExistingFile::Yes) => {
            options.write(true).truncate(true).create(create);
        }
        (OpenFor::Writing, OverwriteExistingFile::No) => {
            if path.exists() {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{} exists and overwriting is disabled", path.display()),
                ));
            }
            if !create {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{} does not exist and creation is disabled", path.display()),
                ));
            }
            options.write(true).create_new(true);
        }
    }
    options.open(path)
}
