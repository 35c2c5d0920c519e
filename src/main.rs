use std::io::Write;
use std::path::PathBuf;

use clap::Parser;

#[cfg(feature = "dbus")]
use dbus::blocking::Connection;
#[cfg(feature = "dbus")]
use std::time::Duration;

use dbus_stub_gen::GenError;

/// Generates C service/proxy stub source from D-Bus XML introspection data.
#[derive(Parser)]
#[command(name = "dbus-stub-gen", about = "Generates C stub source from D-Bus XML introspection data")]
struct Args {
    /// D-Bus XML introspection file. Reads from stdin if neither this nor
    /// --destination is given.
    #[arg(long, value_name = "FILE")]
    file: Option<PathBuf>,

    /// Connects to the supplied service to fetch introspection data live,
    /// instead of reading a file or stdin.
    #[cfg(feature = "dbus")]
    #[arg(short, long, value_name = "BUSNAME")]
    destination: Option<String>,

    /// The object path to ask for introspection data (ignored unless
    /// --destination is given).
    #[cfg(feature = "dbus")]
    #[arg(short, long, default_value = "/", value_name = "PATH")]
    path: String,

    /// Connects to the system bus instead of the session bus (ignored
    /// unless --destination is given).
    #[cfg(feature = "dbus")]
    #[arg(short, long = "system-bus")]
    systembus: bool,

    /// Comma-separated list of interface names. Only matching interfaces are
    /// generated if set.
    #[arg(short = 'f', long, value_name = "FILTER", value_delimiter = ',')]
    interfaces: Vec<String>,

    /// Symbol prefix used for every generated function/struct/typedef name.
    #[arg(long, default_value = "my", value_name = "PREFIX")]
    prefix: String,

    /// Write output into the specified file instead of stdout.
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

fn read_input(args: &Args) -> Result<String, GenError> {
    #[cfg(feature = "dbus")]
    if let Some(dest) = &args.destination {
        if args.file.is_some() {
            return Err(GenError::Structure("expected either --file or --destination, not both".to_owned()));
        }
        let conn = if args.systembus { Connection::new_system() } else { Connection::new_session() }?;
        let proxy = conn.with_proxy(dest, &args.path, Duration::from_millis(10000));
        let (xml,): (String,) = proxy.method_call("org.freedesktop.DBus.Introspectable", "Introspect", ())?;
        return Ok(xml);
    }

    match &args.file {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => {
            let mut s = String::new();
            std::io::Read::read_to_string(&mut std::io::stdin(), &mut s)?;
            Ok(s)
        }
    }
}

fn run() -> Result<(), GenError> {
    env_logger::init();
    let args = Args::parse();

    let xml = read_input(&args)?;
    let generated = dbus_stub_gen::generate(xml.as_bytes(), &args.prefix, &args.interfaces)?;

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(std::fs::File::create(path)?),
        None => Box::new(std::io::stdout()),
    };

    writeln!(out, "{}", generated.handler_typedefs)?;
    writeln!(out, "{}", generated.struct_decls)?;
    writeln!(out, "/* Object-side (server) functions */\n")?;
    writeln!(out, "{}", generated.object_source)?;
    writeln!(out, "/* Proxy-side (client) functions */\n")?;
    writeln!(out, "{}", generated.proxy_source)?;
    out.flush()?;

    Ok(())
}

fn main() {
    if let Err(err) = run() {
        log::error!("{}", err);
        std::process::exit(1);
    }
}
