/*
 * I/O Resource Interfaces
 *
 * A process owns two I/O-side resources: its file descriptor table and its
 * working directory. Their APIs live entirely in the I/O subsystem; the
 * scheduler only holds the owning references for the process's lifetime and
 * releases them when the process is torn down. The traits here are that
 * ownership boundary and nothing more.
 */

use alloc::boxed::Box;

/// A process's file descriptor table, as the scheduler sees it.
pub trait FileTable: Send {}

/// Owning reference; dropping it closes the table's descriptors.
pub type FileTableRef = Box<dyn FileTable + Send>;

/// A process's working directory, as the scheduler sees it.
pub trait WorkingDir: Send {}

/// Owning reference; dropping it releases the directory.
pub type WorkingDirRef = Box<dyn WorkingDir + Send>;
