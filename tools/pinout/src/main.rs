/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 */

use {
    anyhow::{anyhow, bail, Context, Result},
    clap::{value_parser, Arg, ArgAction, ArgMatches, Command},
    colored::*,
    log::{warn, LevelFilter},
    prettytable::{format, row, Table},
    raspio::{
        board::{self, BoardClassification, Layout},
        pins::{self, PinMap},
        Config, DevicePreference, Gpio, Level, NumberingScheme, PinFunction, PinMode, Pull,
    },
    std::{
        fs,
        path::{Path, PathBuf},
    },
};

// pinout [--scheme wpi|bcm|phys] <info|map|readall|mode|read|write|pull>
fn main() -> Result<()> {
    let matches = cli().get_matches();
    // Global options are propagated into the subcommand's matches.
    let Some((command, sub)) = matches.subcommand() else {
        bail!("no command given, see --help");
    };

    let level = match sub.get_count("verbose") {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    raspio::logger::init(level).map_err(|err| anyhow!("cannot install the logger: {err}"))?;

    let cpuinfo: PathBuf = required(sub, "cpuinfo")?;

    match command {
        "info" => info(&cpuinfo),
        "map" => map(&cpuinfo, sub),
        "readall" => readall(&open(sub, NumberingScheme::Native)?),
        _ => {
            let gpio = open(sub, scheme(sub))?;
            let pin: u32 = required(sub, "pin")?;
            if pin < pins::ONBOARD_PINS && gpio.to_native(pin).is_none() {
                bail!("pin {pin} is not connected in the {} numbering", gpio.scheme());
            }
            match command {
                "mode" => gpio.pin_mode(pin, required(sub, "mode")?),
                "read" => println!("{}", u8::from(gpio.digital_read(pin))),
                "write" => gpio.digital_write(pin, required(sub, "level")?),
                "pull" => gpio.pull_up_dn_control(pin, required(sub, "pull")?),
                other => bail!("unknown command {other}"),
            }
            Ok(())
        }
    }
}

fn cli() -> Command {
    let pin = || {
        Arg::new("pin")
            .help("Pin number in the selected numbering scheme")
            .value_parser(value_parser!(u32))
            .required(true)
    };

    Command::new("pinout - Raspberry Pi header tool")
        .about("Show the board, translate pin numbers and drive single pins")
        .disable_version_flag(true)
        .subcommand_required(true)
        .arg(
            Arg::new("scheme")
                .long("scheme")
                .short('s')
                .help("Pin numbering: wpi, bcm or phys")
                .value_parser(|s: &str| s.parse::<NumberingScheme>())
                .global(true),
        )
        .arg(
            Arg::new("cpuinfo")
                .long("cpuinfo")
                .help("Hardware descriptor to identify the board from")
                .value_parser(value_parser!(PathBuf))
                .default_value("/proc/cpuinfo")
                .global(true),
        )
        .arg(
            Arg::new("restricted")
                .long("restricted")
                .help("Map registers through /dev/gpiomem only")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .help("More log output, repeat for more")
                .action(ArgAction::Count)
                .global(true),
        )
        .subcommand(Command::new("info").about("Identify the board"))
        .subcommand(
            Command::new("map")
                .about("Print the pin translation table, without touching the hardware")
                .arg(
                    Arg::new("layout")
                        .long("layout")
                        .help("Header layout, detected from the board when omitted")
                        .value_parser(["legacy", "standard"]),
                ),
        )
        .subcommand(Command::new("readall").about("Show every header pin with its mode and level"))
        .subcommand(
            Command::new("mode").about("Set a pin mode").arg(pin()).arg(
                Arg::new("mode")
                    .help("in, out, pwm, clock, softpwm or softtone")
                    .value_parser(|s: &str| s.parse::<PinMode>())
                    .required(true),
            ),
        )
        .subcommand(Command::new("read").about("Read a pin level").arg(pin()))
        .subcommand(
            Command::new("write").about("Drive a pin").arg(pin()).arg(
                Arg::new("level")
                    .help("0 or 1")
                    .value_parser(|s: &str| s.parse::<Level>())
                    .required(true),
            ),
        )
        .subcommand(
            Command::new("pull").about("Set a pin's pull resistor").arg(pin()).arg(
                Arg::new("pull")
                    .help("up, down or off")
                    .value_parser(|s: &str| s.parse::<Pull>())
                    .required(true),
            ),
        )
}

fn required<T: Clone + Send + Sync + 'static>(matches: &ArgMatches, id: &str) -> Result<T> {
    matches
        .get_one::<T>(id)
        .cloned()
        .ok_or_else(|| anyhow!("{id} must be specified"))
}

fn scheme(matches: &ArgMatches) -> NumberingScheme {
    matches
        .get_one::<NumberingScheme>("scheme")
        .copied()
        .unwrap_or_default()
}

fn identify(cpuinfo: &Path) -> Result<BoardClassification> {
    let descriptor = fs::read_to_string(cpuinfo)
        .with_context(|| format!("cannot read {}", cpuinfo.display()))?;
    Ok(board::identify(&descriptor)?)
}

fn open(matches: &ArgMatches, scheme: NumberingScheme) -> Result<Gpio> {
    let device = if matches.get_flag("restricted") {
        DevicePreference::RestrictedOnly
    } else {
        DevicePreference::Auto
    };
    let config = Config::default()
        .with_scheme(scheme)
        .with_device(device)
        .with_cpuinfo_path(required::<PathBuf>(matches, "cpuinfo")?);
    Ok(Gpio::setup(config)?)
}

fn info(cpuinfo: &Path) -> Result<()> {
    let board = identify(cpuinfo)?;

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_CLEAN);
    table.add_row(row!["Model".bold(), board.model]);
    table.add_row(row!["Revision".bold(), format!("1.{}", board.revision)]);
    table.add_row(row!["Memory".bold(), format!("{} MB", board.memory_mb())]);
    table.add_row(row!["Maker".bold(), board.maker]);
    table.add_row(row!["SoC".bold(), board.soc().name()]);
    table.add_row(row!["Header".bold(), header_name(board.layout)]);
    table.add_row(row![
        "Code".bold(),
        format!(
            "{:#x} ({} encoding)",
            board.code,
            if board.new_style { "new" } else { "old" }
        )
    ]);
    if board.overvolted {
        table.add_row(row!["Warranty".bold(), "void (overvolted)".yellow()]);
    }
    table.printstd();
    Ok(())
}

fn map(cpuinfo: &Path, sub: &ArgMatches) -> Result<()> {
    let scheme = scheme(sub);
    let layout = match sub.get_one::<String>("layout").map(String::as_str) {
        Some("legacy") => Layout::Legacy,
        Some(_) => Layout::Standard,
        None => identify(cpuinfo).map(|board| board.layout).unwrap_or_else(|err| {
            warn!("{err:#}, assuming the 40 pin header");
            Layout::Standard
        }),
    };

    let selected = PinMap::new(layout, scheme);
    let logical = PinMap::new(layout, NumberingScheme::Logical);
    let physical = PinMap::new(layout, NumberingScheme::Physical);
    let or_dash = |pin: Option<u32>| pin.map_or_else(|| "-".to_string(), |p| p.to_string());

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BOX_CHARS);
    table.set_titles(row![scheme.name().bold(), "BCM", "wPi", "Physical", "Name"]);
    for (pin, native) in selected.iter() {
        table.add_row(row![
            pin,
            native,
            or_dash(logical.from_native(native)),
            or_dash(physical.from_native(native)),
            pins::native_name(native),
        ]);
    }
    println!("{} header, {} numbering", header_name(layout), scheme);
    table.printstd();
    Ok(())
}

fn readall(gpio: &Gpio) -> Result<()> {
    let layout = gpio.board().layout;
    let positions = match layout {
        Layout::Legacy => 26,
        Layout::Standard => 40,
    };

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BOX_CHARS);
    table.set_titles(row![
        "BCM", "wPi", "Name", "Mode", "V", "Physical", "V", "Mode", "Name", "wPi", "BCM"
    ]);
    for left in (1..=positions).step_by(2) {
        let [l_bcm, l_wpi, l_name, l_mode, l_value] = header_pin(gpio, left);
        let [r_bcm, r_wpi, r_name, r_mode, r_value] = header_pin(gpio, left + 1);
        table.add_row(row![
            l_bcm,
            l_wpi,
            l_name,
            l_mode,
            l_value,
            format!("{left:>2} || {:<2}", left + 1),
            r_value,
            r_mode,
            r_name,
            r_wpi,
            r_bcm,
        ]);
    }
    println!("{}", gpio.board().to_string().bold());
    table.printstd();
    Ok(())
}

/// BCM, wPi, name, mode and level cells of one header position.
fn header_pin(gpio: &Gpio, physical: u32) -> [String; 5] {
    let layout = gpio.board().layout;
    let name = pins::header_label(layout, physical).to_string();
    let native = match pins::phys_to_native(layout, physical) {
        Some(native) if gpio.to_native(native.into()).is_some() => native,
        _ => return [String::new(), String::new(), name, String::new(), String::new()],
    };
    let wpi = PinMap::new(layout, NumberingScheme::Logical)
        .from_native(native)
        .map_or_else(String::new, |pin| pin.to_string());
    let mode = match gpio.get_alt(native.into()) {
        Some(PinFunction::Output) => "OUT".green().to_string(),
        Some(function) => function.to_string(),
        None => String::new(),
    };
    let value = match gpio.digital_read(native.into()) {
        Level::High => "1".bright_white().bold().to_string(),
        Level::Low => "0".to_string(),
    };
    [native.to_string(), wpi, name, mode, value]
}

fn header_name(layout: Layout) -> &'static str {
    match layout {
        Layout::Legacy => "26 pin (rev 1)",
        Layout::Standard => "40 pin",
    }
}
