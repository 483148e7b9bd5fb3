use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::{debug, error, warn};
use x11rb::{connection::Connection, protocol::xproto::Window};
use xppu::{
    cli::{self, Action, Config},
    display::{self, DisplayMetrics},
    inspect::{Atoms, WindowInspector},
    select, Error,
};

fn main() -> ExitCode {
    let (config, actions) = match cli::parse_from(std::env::args_os()) {
        Ok(parsed) => parsed,
        Err(err) => err.exit(),
    };

    if let Err(err) = init_tracing(&config.log_level) {
        eprintln!("{}: invalid log filter: {:#}", config.program, err);
    }

    match run(&config, &actions) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            let code = err.downcast_ref::<Error>().map_or(1, Error::exit_code);
            ExitCode::from(code)
        }
    }
}

fn run(config: &Config, actions: &[Action]) -> Result<()> {
    let (conn, screen_num) = x11rb::connect(config.display.as_deref()).map_err(Error::from)?;
    let screen = &conn.setup().roots[screen_num];
    let root = screen.root;
    debug!(screen_num, root, "connected to display");

    let atoms = Atoms::new(&conn)
        .map_err(Error::from)?
        .reply()
        .map_err(Error::from)
        .context("failed to intern atoms")?;
    let inspector = WindowInspector::new(&conn, atoms);

    let mut out = io::stdout().lock();
    for action in actions {
        match *action {
            Action::Resolution => {
                writeln!(out, "{}", DisplayMetrics::from_screen(screen))?;
            }
            Action::MousePosition => match display::pointer_position(&conn, root) {
                Ok(point) => writeln!(out, "{}", point)?,
                Err(err) => warn!("unable to query pointer position: {}", err),
            },
            Action::MouseMove { x, y } => {
                display::warp_pointer(&conn, root, x, y)
                    .with_context(|| format!("failed to move pointer to {},{}", x, y))?;
            }
            Action::WindowTitle => {
                let focus = focus_target(&conn, root);
                writeln!(out, "wintitle={}", inspector.title(focus))?;
            }
            Action::FocusedWindow => {
                let focus = focus_target(&conn, root);
                writeln!(out, "{}", inspector.describe(focus))?;
            }
            Action::SelectWindow => {
                // Flush so the report so far is visible while the pointer is grabbed.
                out.flush()?;
                match select::select(&conn, root) {
                    Ok(target) => writeln!(out, "{}", inspector.describe(target))?,
                    Err(Error::Grab(err)) => error!("can't grab the mouse: {}", err),
                    Err(err) => return Err(err).context("window selection failed"),
                }
            }
        }
    }

    out.flush()?;
    conn.flush().map_err(Error::from)?;
    Ok(())
}

fn focus_target<C: Connection>(conn: &C, root: Window) -> Window {
    display::focused_window(conn, root).unwrap_or_else(|err| {
        warn!("unable to query input focus: {}", err);
        root
    })
}

fn init_tracing(level: &str) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(io::stderr),
        )
        .try_init()?;

    Ok(())
}
