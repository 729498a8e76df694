use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Answer to the per-file overwrite prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overwrite {
    Yes,
    No,
    All,
}

/// Host-side operations the copy engine drives. Everything the engine
/// needs from the destination filesystem goes through here, which keeps
/// the copier testable without touching the real disk.
pub trait HostSink {
    fn mkdir(&mut self, path: &Path) -> io::Result<()>;
    fn folder_exists(&mut self, path: &Path) -> bool;
    fn file_exists(&mut self, path: &Path) -> bool;
    fn create(&mut self, path: &Path) -> io::Result<Box<dyn Write>>;
    fn prompt_overwrite(&mut self, path: &Path) -> io::Result<Overwrite>;
}

/// The real filesystem, with the overwrite prompt answered from the
/// keyboard (raw mode is already active while the navigator runs).
pub struct LocalSink;

impl HostSink for LocalSink {
    fn mkdir(&mut self, path: &Path) -> io::Result<()> {
        fs::create_dir(path)
    }

    fn folder_exists(&mut self, path: &Path) -> bool {
        path.is_dir()
    }

    fn file_exists(&mut self, path: &Path) -> bool {
        path.is_file()
    }

    fn create(&mut self, path: &Path) -> io::Result<Box<dyn Write>> {
        Ok(Box::new(fs::File::create(path)?))
    }

    fn prompt_overwrite(&mut self, _path: &Path) -> io::Result<Overwrite> {
        let mut out = io::stdout();
        write!(out, "\r\n File exists; Overwrite? (y/n/a) ")?;
        out.flush()?;
        loop {
            let key = crate::nav::screen::read_byte()?;
            let answer = match key {
                b'y' | b'Y' => Overwrite::Yes,
                b'n' | b'N' => Overwrite::No,
                b'a' | b'A' => Overwrite::All,
                _ => continue,
            };
            write!(out, "{}", key as char)?;
            out.flush()?;
            return Ok(answer);
        }
    }
}

/// Join a space-padded 8-byte basename and 3-byte extension into the
/// visible `NAME.EXT` form; the dot appears only when the extension is
/// non-empty.
pub fn compose_short_name(basename: &[u8; 8], extension: &[u8; 3]) -> String {
    let base_len = basename.iter().position(|&b| b == b' ').unwrap_or(8);
    let ext_len = extension.iter().position(|&b| b == b' ').unwrap_or(3);

    let mut name = String::with_capacity(12);
    name.push_str(&String::from_utf8_lossy(&basename[..base_len]));
    if ext_len > 0 {
        name.push('.');
        name.push_str(&String::from_utf8_lossy(&extension[..ext_len]));
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_compose_short_name_with_extension() {
        assert_eq!(compose_short_name(b"CONFIG  ", b"SYS"), "CONFIG.SYS");
        assert_eq!(compose_short_name(b"HELLO   ", b"TXT"), "HELLO.TXT");
    }

    #[test]
    fn test_compose_short_name_without_extension() {
        assert_eq!(compose_short_name(b"README  ", b"   "), "README");
    }

    #[test]
    fn test_compose_short_name_full_width() {
        assert_eq!(compose_short_name(b"LONGNAME", b"BIN"), "LONGNAME.BIN");
    }

    #[test]
    fn test_local_sink_roundtrip() {
        let dir = tempdir().unwrap();
        let mut sink = LocalSink;

        let sub = dir.path().join("SUB");
        assert!(!sink.folder_exists(&sub));
        sink.mkdir(&sub).unwrap();
        assert!(sink.folder_exists(&sub));

        let file = sub.join("OUT.TXT");
        assert!(!sink.file_exists(&file));
        {
            let mut w = sink.create(&file).unwrap();
            w.write_all(b"payload").unwrap();
        }
        assert!(sink.file_exists(&file));
        assert_eq!(std::fs::read(&file).unwrap(), b"payload");
    }

    #[test]
    fn test_local_sink_mkdir_existing_fails() {
        let dir = tempdir().unwrap();
        let mut sink = LocalSink;
        let sub = dir.path().join("TWICE");
        sink.mkdir(&sub).unwrap();
        assert!(sink.mkdir(&sub).is_err());
    }
}
