use anyhow::{bail, Context, Result};

use retro80::MachineConfig;

fn parse_hex(arg: &str) -> Result<u16> {
    let digits = arg.trim_start_matches("0x").trim_start_matches("0X");
    u16::from_str_radix(digits, 16).with_context(|| format!("invalid hex address {:?}", arg))
}

fn main() -> Result<()> {
    env_logger::init();

    let mut image_path = None;
    let mut org = 0u16;
    let mut entry = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--org" => {
                let value = args.next().context("--org needs a hex address")?;
                org = parse_hex(&value)?;
            }
            "--entry" => {
                let value = args.next().context("--entry needs a hex address")?;
                entry = Some(parse_hex(&value)?);
            }
            _ if image_path.is_none() => image_path = Some(arg),
            _ => bail!("unexpected argument {:?}", arg),
        }
    }

    let Some(image_path) = image_path else {
        bail!("usage: retro80 [--org HEX] [--entry HEX] IMAGE");
    };

    let config = MachineConfig::builder()
        .org(org)
        .entry(entry.unwrap_or(org))
        .build();

    let (machine, report) = retro80::run(&image_path, config)?;

    println!("{}", retro80::register_dump(&machine.cpu));
    println!(
        "cycles={} clock={:.3} MHz ({:?})",
        report.tstates,
        retro80::clock_mhz(report.tstates, report.elapsed),
        report.state,
    );

    Ok(())
}
