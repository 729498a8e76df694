use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Local;
use log::warn;

use crate::error::{Error, Result};
use crate::fat32::{FileEntry, Folder, Volume};
use crate::host::{compose_short_name, HostSink, Overwrite};
use crate::sd::BlockDevice;

// One slot in the breadth-first folder queue. The queue doubles as an
// arena: parent back-edges make path reconstruction an O(depth) walk.
struct FolderNode {
    name: [u8; 11],
    first_cluster: u32,
    parent: Option<usize>,
    scanned: bool,
}

#[derive(Debug, Default)]
pub struct CopySummary {
    pub folders_created: usize,
    pub files_copied: usize,
    pub bytes: u64,
    pub skipped: usize,
}

/// Copy the subtree rooted at `root` (a directory entry) into `base` on
/// the host. Directories are created first in queue order, then each
/// folder's files are streamed through the overwrite policy. Report lines
/// go to `out`.
pub fn copy_tree<D, S, W>(
    volume: &mut Volume<D>,
    root: &FileEntry,
    base: &Path,
    sink: &mut S,
    out: &mut W,
) -> Result<CopySummary>
where
    D: BlockDevice,
    S: HostSink,
    W: Write,
{
    if !root.is_dir() {
        return Err(Error::NotFile);
    }

    let nodes = enumerate(volume, root)?;
    let max_path = volume.limits().max_path_len;
    let mut summary = CopySummary::default();

    // pass 1: directory skeleton, aborting the copy on the first failure
    for index in 0..nodes.len() {
        let path = base.join(rel_path(&nodes, index, max_path)?);
        write!(out, ">> DIR: {}", path.display()).map_err(Error::Sink)?;

        if sink.folder_exists(&path) {
            writeln!(out, " [EXISTS]").map_err(Error::Sink)?;
        } else {
            match sink.mkdir(&path) {
                Ok(()) => {
                    writeln!(out, " [CREATED]").map_err(Error::Sink)?;
                    summary.folders_created += 1;
                }
                Err(e) => {
                    writeln!(out, " [ERROR]").map_err(Error::Sink)?;
                    return Err(Error::Sink(e));
                }
            }
        }
    }

    // pass 2: files, with the overwrite-all latch shared across the copy
    let mut persistent = false;
    for index in 0..nodes.len() {
        let dir_path = base.join(rel_path(&nodes, index, max_path)?);
        let folder = Folder {
            first_cluster: nodes[index].first_cluster,
            name: nodes[index].name,
        };
        let entries = volume.list_dir(&folder)?;
        for entry in entries.iter().filter(|e| !e.is_dir()) {
            transfer_one(volume, entry, &dir_path, sink, out, &mut persistent, &mut summary)?;
        }
    }

    writeln!(
        out,
        "-- transfer complete at {} --",
        Local::now().format("%H:%M:%S")
    )
    .map_err(Error::Sink)?;
    Ok(summary)
}

/// Copy one file entry into `base`, prompting on collision. Used for the
/// navigator's single-file copy and by the tree copier for every file.
pub fn copy_file<D, S, W>(
    volume: &mut Volume<D>,
    entry: &FileEntry,
    base: &Path,
    sink: &mut S,
    out: &mut W,
) -> Result<CopySummary>
where
    D: BlockDevice,
    S: HostSink,
    W: Write,
{
    let mut summary = CopySummary::default();
    let mut persistent = false;
    transfer_one(volume, entry, base, sink, out, &mut persistent, &mut summary)?;
    Ok(summary)
}

fn transfer_one<D, S, W>(
    volume: &mut Volume<D>,
    entry: &FileEntry,
    dir_path: &Path,
    sink: &mut S,
    out: &mut W,
    persistent: &mut bool,
    summary: &mut CopySummary,
) -> Result<()>
where
    D: BlockDevice,
    S: HostSink,
    W: Write,
{
    let target = dir_path.join(compose_short_name(&entry.basename, &entry.extension));
    write!(out, " + File: {}", target.display()).map_err(Error::Sink)?;

    if sink.file_exists(&target) {
        if *persistent {
            write!(out, " (A)").map_err(Error::Sink)?;
        } else {
            match sink.prompt_overwrite(&target).map_err(Error::Sink)? {
                Overwrite::Yes => {}
                Overwrite::All => *persistent = true,
                Overwrite::No => {
                    writeln!(out, " [SKIP]").map_err(Error::Sink)?;
                    summary.skipped += 1;
                    return Ok(());
                }
            }
        }
    }

    let started = Instant::now();
    let mut writer = sink.create(&target).map_err(Error::Sink)?;
    match volume.stream_file(entry, &mut writer) {
        Ok(bytes) => {
            writeln!(
                out,
                " ({} bytes; {:.2} s) [OK]",
                bytes,
                started.elapsed().as_secs_f64()
            )
            .map_err(Error::Sink)?;
            summary.files_copied += 1;
            summary.bytes += bytes;
            Ok(())
        }
        Err(e) => {
            writeln!(out, " [FAIL]").map_err(Error::Sink)?;
            Err(e)
        }
    }
}

// Breadth-first expansion of the folder queue. Each pass scans every
// not-yet-scanned node and appends its subdirectories; the walk ends when
// a pass finds nothing new. The queue is capped; children beyond the cap
// are dropped.
fn enumerate<D: BlockDevice>(volume: &mut Volume<D>, root: &FileEntry) -> Result<Vec<FolderNode>> {
    let cap = volume.limits().max_tree_folders;
    let mut nodes = vec![FolderNode {
        name: root.raw_name(),
        first_cluster: root.first_cluster,
        parent: None,
        scanned: false,
    }];

    let mut warned = false;
    loop {
        let pending: Vec<usize> = (0..nodes.len()).filter(|&i| !nodes[i].scanned).collect();
        if pending.is_empty() {
            break;
        }
        for index in pending {
            let folder = Folder {
                first_cluster: nodes[index].first_cluster,
                name: nodes[index].name,
            };
            let entries = volume.list_dir(&folder)?;
            for child in entries.iter().filter(|e| e.is_dir() && !e.is_dot()) {
                if nodes.len() >= cap {
                    if !warned {
                        warn!("folder queue full, subtree truncated at {} folders", cap);
                        warned = true;
                    }
                    break;
                }
                nodes.push(FolderNode {
                    name: child.raw_name(),
                    first_cluster: child.first_cluster,
                    parent: Some(index),
                    scanned: false,
                });
            }
            nodes[index].scanned = true;
        }
    }

    Ok(nodes)
}

// Rebuild the host-relative path of a queue entry by walking the parent
// links, trimming each 11-byte name at its first space.
fn rel_path(nodes: &[FolderNode], index: usize, max_len: usize) -> Result<PathBuf> {
    let mut lineage = vec![index];
    let mut cursor = index;
    while let Some(parent) = nodes[cursor].parent {
        lineage.push(parent);
        cursor = parent;
    }

    let mut path = PathBuf::new();
    let mut len = 0;
    for &i in lineage.iter().rev() {
        let name = &nodes[i].name;
        let cut = name.iter().position(|&b| b == b' ').unwrap_or(name.len());
        let component = String::from_utf8_lossy(&name[..cut]).into_owned();

        if len > 0 {
            len += 1; // separator
        }
        len += component.len();
        if len > max_len {
            return Err(Error::PathTooLong { len, max: max_len });
        }
        path.push(component);
    }
    Ok(path)
}
