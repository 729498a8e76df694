//! Two-pane navigator: SD card contents on the left, the host working
//! directory on the right. The SD side is fed by the FAT32 engine; the
//! host side walks the real filesystem. Copying always goes SD -> host.

use std::cmp::Ordering;
use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use log::{error, warn};

use crate::config::UiConfig;
use crate::copy::{copy_file, copy_tree};
use crate::error::{Error, Result};
use crate::fat32::{FileEntry, Folder, Volume};
use crate::host::{compose_short_name, LocalSink};
use crate::sd::BlockDevice;

pub mod pane;
pub mod screen;

use pane::Pane;
use screen::Key;

const LEFT_COL: u16 = 1;
const RIGHT_COL: u16 = 41;
const PANE_WIDTH: usize = 40;
const LIST_TOP: u16 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Sd,
    Host,
}

struct HostEntry {
    name: String,
    is_dir: bool,
    size: u64,
}

fn host_order(a: &HostEntry, b: &HostEntry) -> Ordering {
    match (a.is_dir, b.is_dir) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a.name.cmp(&b.name),
    }
}

fn fit(text: &str, width: usize) -> String {
    let truncated: String = text.chars().take(width).collect();
    format!("{:<width$}", truncated, width = width)
}

pub struct Navigator<D: BlockDevice> {
    volume: Volume<D>,
    current_folder: Folder,
    sd_entries: Vec<FileEntry>,
    host_entries: Vec<HostEntry>,
    sd_pane: Pane,
    host_pane: Pane,
    side: Side,
    rows: usize,
    start_cwd: PathBuf,
}

impl<D: BlockDevice> Navigator<D> {
    pub fn new(volume: Volume<D>, ui: &UiConfig) -> Result<Self> {
        let rows = ui.pane_rows;
        let start_cwd = env::current_dir().map_err(Error::Sink)?;
        let mut nav = Navigator {
            volume,
            current_folder: Folder::root(),
            sd_entries: Vec::new(),
            host_entries: Vec::new(),
            sd_pane: Pane::new(LEFT_COL, LIST_TOP, PANE_WIDTH, rows),
            host_pane: Pane::new(RIGHT_COL, LIST_TOP, PANE_WIDTH, rows),
            side: Side::Sd,
            rows,
            start_cwd,
        };
        nav.refresh_sd()?;
        nav.refresh_host()?;
        Ok(nav)
    }

    /// Run the keyboard loop until the user exits. The terminal state and
    /// the starting working directory are restored on the way out.
    pub fn run(&mut self) -> Result<()> {
        let _raw = screen::RawMode::enter().map_err(Error::Sink)?;
        screen::enter_alt_screen().map_err(Error::Sink)?;
        screen::hide_cursor().map_err(Error::Sink)?;

        let result = self.main_loop();

        let _ = screen::show_cursor();
        let _ = screen::leave_alt_screen();
        let _ = screen::flush();
        let _ = env::set_current_dir(&self.start_cwd);
        result
    }

    fn main_loop(&mut self) -> Result<()> {
        loop {
            self.draw().map_err(Error::Sink)?;
            match screen::read_key().map_err(Error::Sink)? {
                Key::Tab => {
                    self.side = match self.side {
                        Side::Sd => Side::Host,
                        Side::Host => Side::Sd,
                    };
                }
                Key::Up => self.move_active(-1),
                Key::Down => self.move_active(1),
                Key::PageUp => self.move_active(-(self.rows as isize)),
                Key::PageDown => self.move_active(self.rows as isize),
                Key::Enter => self.enter_selected()?,
                Key::F(3) | Key::Char(b'c') | Key::Char(b'C') if self.side == Side::Sd => {
                    self.copy_selected()?
                }
                Key::F(2) | Key::Char(b'm') | Key::Char(b'M') if self.side == Side::Host => {
                    self.make_folder()?
                }
                Key::F(10) | Key::Char(b'q') | Key::Char(b'Q') => break,
                _ => {}
            }
        }
        Ok(())
    }

    fn move_active(&mut self, delta: isize) {
        match self.side {
            Side::Sd => {
                let count = self.sd_entries.len();
                self.sd_pane.move_cursor(delta, count);
            }
            Side::Host => {
                let count = self.host_entries.len();
                self.host_pane.move_cursor(delta, count);
            }
        }
    }

    fn refresh_sd(&mut self) -> Result<()> {
        self.sd_entries = self.volume.list_dir(&self.current_folder)?;
        Ok(())
    }

    fn refresh_host(&mut self) -> Result<()> {
        let cwd = env::current_dir().map_err(Error::Sink)?;
        let mut entries = Vec::new();
        if cwd.parent().is_some() {
            entries.push(HostEntry {
                name: "..".to_string(),
                is_dir: true,
                size: 0,
            });
        }
        for item in fs::read_dir(&cwd).map_err(Error::Sink)? {
            let item = item.map_err(Error::Sink)?;
            let meta = item.metadata().map_err(Error::Sink)?;
            entries.push(HostEntry {
                name: item.file_name().to_string_lossy().into_owned(),
                is_dir: meta.is_dir(),
                size: meta.len(),
            });
        }
        entries.sort_by(host_order);
        self.host_entries = entries;
        Ok(())
    }

    fn enter_selected(&mut self) -> Result<()> {
        match self.side {
            Side::Sd => {
                let entry = match self.sd_entries.get(self.sd_pane.selected()) {
                    Some(e) => *e,
                    None => return Ok(()),
                };
                if entry.is_dir() {
                    self.current_folder = Folder::from_entry(&entry);
                    self.refresh_sd()?;
                    self.sd_pane.reset();
                }
            }
            Side::Host => {
                let (name, is_dir) = match self.host_entries.get(self.host_pane.selected()) {
                    Some(e) => (e.name.clone(), e.is_dir),
                    None => return Ok(()),
                };
                if is_dir {
                    env::set_current_dir(&name).map_err(Error::Sink)?;
                    self.refresh_host()?;
                    self.host_pane.reset();
                }
            }
        }
        Ok(())
    }

    // Copy the selected SD entry into the host working directory, on a
    // cleared screen so the report lines stay readable.
    fn copy_selected(&mut self) -> Result<()> {
        let entry = match self.sd_entries.get(self.sd_pane.selected()) {
            Some(e) => *e,
            None => return Ok(()),
        };
        if entry.is_dot() {
            return Ok(());
        }

        screen::clear_screen().map_err(Error::Sink)?;
        screen::goto(1, 1).map_err(Error::Sink)?;
        let mut out = io::stdout();
        writeln!(out, "START TRANSFER...").map_err(Error::Sink)?;

        let base = env::current_dir().map_err(Error::Sink)?;
        let mut sink = LocalSink;
        let result = if entry.is_dir() {
            copy_tree(&mut self.volume, &entry, &base, &mut sink, &mut out).map(|_| ())
        } else {
            copy_file(&mut self.volume, &entry, &base, &mut sink, &mut out).map(|_| ())
        };
        if let Err(e) = result {
            error!("transfer failed: {}", e);
            writeln!(out, "TRANSFER FAILED: {}", e).map_err(Error::Sink)?;
        }

        writeln!(out, "-- press any key to return to the navigator --").map_err(Error::Sink)?;
        out.flush().map_err(Error::Sink)?;
        screen::read_byte().map_err(Error::Sink)?;

        self.refresh_host()?;
        self.host_pane.reset();
        Ok(())
    }

    // Prompt for a new directory name on the status row: up to 8
    // alphanumeric characters, Enter confirms, Esc cancels.
    fn make_folder(&mut self) -> Result<()> {
        let row = self.status_row();
        let mut name = String::new();
        loop {
            screen::goto(1, row).map_err(Error::Sink)?;
            screen::clear_to_eol().map_err(Error::Sink)?;
            write!(io::stdout(), "Enter folder name: {}", name).map_err(Error::Sink)?;
            screen::flush().map_err(Error::Sink)?;

            match screen::read_key().map_err(Error::Sink)? {
                Key::Enter => break,
                Key::Escape => {
                    name.clear();
                    break;
                }
                Key::Backspace => {
                    name.pop();
                }
                Key::Char(c) if name.len() < 8 && (c as char).is_ascii_alphanumeric() => {
                    name.push(c as char);
                }
                _ => {}
            }
        }

        if !name.is_empty() {
            if let Err(e) = fs::create_dir(&name) {
                warn!("mkdir {} failed: {}", name, e);
            }
            self.refresh_host()?;
            self.host_pane.reset();
        }
        Ok(())
    }

    fn status_row(&self) -> u16 {
        LIST_TOP + self.rows as u16 + 1
    }

    fn draw(&self) -> io::Result<()> {
        screen::clear_screen()?;

        // title bar with the volume label on the right
        screen::goto(1, 1)?;
        screen::set_highlight()?;
        let title = format!(
            "{:<58}SDCARD: {}",
            format!(" SD-CARD NAVIGATOR v{}", env!("CARGO_PKG_VERSION")),
            self.volume.partition().label_string()
        );
        write!(io::stdout(), "{}", fit(&title, 80))?;
        screen::set_normal()?;

        self.draw_sd_pane()?;
        self.draw_host_pane()?;

        // command bar for the active side
        screen::goto(1, self.status_row())?;
        screen::set_highlight()?;
        let commands = match self.side {
            Side::Sd => " TAB: SWITCH | ENTER: OPEN | F3/C: COPY | F10/Q: EXIT",
            Side::Host => " TAB: SWITCH | ENTER: OPEN | F2/M: MKDIR | F10/Q: EXIT",
        };
        write!(io::stdout(), "{}", fit(commands, 80))?;
        screen::set_normal()?;

        screen::flush()
    }

    fn draw_sd_pane(&self) -> io::Result<()> {
        let rows: Vec<String> = self
            .sd_entries
            .iter()
            .map(|e| {
                let name = compose_short_name(&e.basename, &e.extension);
                if e.is_dir() {
                    format!("  {:<20} {:>10}", name, "[DIR]")
                } else {
                    format!("  {:<20} {:>10}", name, e.size)
                }
            })
            .collect();
        self.draw_list(&self.sd_pane, &rows, self.side == Side::Sd)
    }

    fn draw_host_pane(&self) -> io::Result<()> {
        let rows: Vec<String> = self
            .host_entries
            .iter()
            .map(|e| {
                if e.is_dir {
                    format!("  {:<20} {:>10}", e.name, "[DIR]")
                } else {
                    format!("  {:<20} {:>10}", e.name, e.size)
                }
            })
            .collect();
        self.draw_list(&self.host_pane, &rows, self.side == Side::Host)
    }

    fn draw_list(&self, pane: &Pane, rows: &[String], active: bool) -> io::Result<()> {
        let mut out = io::stdout();
        for (line, index) in pane.visible(rows.len()).enumerate() {
            screen::goto(pane.origin_col, pane.origin_row + line as u16)?;
            let selected = active && index == pane.selected();
            if selected {
                screen::set_highlight()?;
                write!(out, ">{}", fit(&rows[index][1..], pane.width - 1))?;
                screen::set_normal()?;
            } else {
                write!(out, "{}", fit(&rows[index], pane.width))?;
            }
        }
        Ok(())
    }
}
