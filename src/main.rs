/*
 * SD Card Navigator Entry Point
 * =============================
 *
 * Handles configuration, logging and card bring-up, then hands control
 * to the navigator.
 *
 * Startup Flow:
 * ------------
 * 1. Parse the command line and load the TOML configuration.
 * 2. Route log output to a file so the screen stays usable.
 * 3. Open the block source: the SD interface card on its I/O port, or a
 *    raw image file when --image is given.
 * 4. Bring the card up (bounded retries) and verify the boot sector.
 * 5. Mount the first FAT32 partition and start the two-pane navigator,
 *    or run one of the diagnostic modes (--list, --dump-sector).
 *
 * The process exits non-zero when the card cannot be brought up.
 */

use std::fs::File;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn, LevelFilter};
use simplelog::WriteLogger;

use sdnav::config::Config;
use sdnav::fat32::{Folder, Volume};
use sdnav::host::compose_short_name;
use sdnav::nav::Navigator;
use sdnav::sd::{BlockDevice, ImageDevice, PortBus, SdCard};

#[derive(Parser)]
#[command(name = "sdnav")]
#[command(about = "Two-pane navigator that copies files from an SD card", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, value_name = "FILE", default_value = "sdnav.toml")]
    config: PathBuf,

    /// Read from a raw SD card image instead of the hardware port
    #[arg(long, value_name = "IMAGE")]
    image: Option<PathBuf>,

    /// Print the root directory listing and exit
    #[arg(long)]
    list: bool,

    /// Hex-dump one sector and exit
    #[arg(long, value_name = "LBA")]
    dump_sector: Option<u32>,

    /// Log file
    #[arg(long, value_name = "FILE", default_value = "sdnav.log")]
    log_file: PathBuf,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config).context("loading configuration")?;

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    WriteLogger::init(
        level,
        simplelog::Config::default(),
        File::create(&cli.log_file).context("creating log file")?,
    )?;
    info!(
        "sdnav {} starting at {}",
        env!("CARGO_PKG_VERSION"),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );

    match &cli.image {
        Some(path) => {
            let dev = ImageDevice::open(path)
                .with_context(|| format!("opening image {}", path.display()))?;
            run(dev, &cli, &config)
        }
        None => {
            let dev = bring_up_card(&config)?;
            run(dev, &cli, &config)
        }
    }
}

// A cold card sometimes needs several whole bring-up rounds before the
// boot sector reads back with its signature intact.
fn bring_up_card(config: &Config) -> Result<SdCard<PortBus>> {
    let bus = PortBus::open(config.card.base_port).with_context(|| {
        format!(
            "opening /dev/port for base port {:#05x}",
            config.card.base_port
        )
    })?;
    let mut card = SdCard::new(bus, config.card.init_attempts);

    let mut attempt = 0;
    loop {
        attempt += 1;
        info!("card bring-up attempt {}", attempt);
        let booted = match card.init() {
            Ok(()) => card.read_sector(0),
            Err(e) => Err(e),
        };
        match booted {
            Ok(sector) if sector[510] == 0x55 && sector[511] == 0xAA => return Ok(card),
            Ok(_) => warn!("boot sector signature missing, retrying"),
            Err(e) => warn!("bring-up failed: {}", e),
        }
        if attempt >= config.card.boot_attempts {
            bail!("cannot bring up the SD card after {} attempts", attempt);
        }
    }
}

fn run<D: BlockDevice>(dev: D, cli: &Cli, config: &Config) -> Result<()> {
    if let Some(lba) = cli.dump_sector {
        return dump_sector(dev, lba);
    }

    let volume = Volume::mount(dev, config.limits).context("mounting FAT32 partition")?;
    if cli.list {
        return list_root(volume);
    }

    let mut navigator = Navigator::new(volume, &config.ui)?;
    navigator.run()?;
    Ok(())
}

fn dump_sector<D: BlockDevice>(mut dev: D, lba: u32) -> Result<()> {
    let sector = dev.read_sector(lba)?;
    for (i, chunk) in sector.chunks(16).enumerate() {
        print!("{:04X} | ", i * 16);
        for byte in chunk {
            print!("{:02X} ", byte);
        }
        print!("| ");
        for &byte in chunk {
            if (0x20..=0x7E).contains(&byte) {
                print!("{}", byte as char);
            } else {
                print!(".");
            }
        }
        println!(" |");
    }
    Ok(())
}

fn list_root<D: BlockDevice>(mut volume: Volume<D>) -> Result<()> {
    let partition = volume.partition().clone();
    println!("Volume label:        {}", partition.label_string());
    println!("Bytes per sector:    {}", partition.bytes_per_sector);
    println!("Sectors per cluster: {}", partition.sectors_per_cluster);
    println!("Reserved sectors:    {}", partition.reserved_sectors);
    println!("Number of FATs:      {}", partition.number_of_fats);
    println!("Root dir cluster:    {:#010X}", partition.root_dir_first_cluster);
    println!("FAT begin LBA:       {:#010X}", partition.fat_begin_lba);
    println!("Data begin LBA:      {:#010X}", partition.data_begin_lba);
    println!();

    for entry in volume.list_dir(&Folder::root())? {
        let name = compose_short_name(&entry.basename, &entry.extension);
        if entry.is_dir() {
            println!("{:<14} {:>10}", name, "[DIR]");
        } else {
            println!("{:<14} {:>10}", name, entry.size);
        }
    }
    Ok(())
}
