pub mod logging;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ColorChoice, Command,
};

pub const ARG_DSN: &str = "dsn";
pub const ARG_PORT: &str = "port";
pub const ARG_WEB_CONTEXT: &str = "web-context";
pub const ARG_ALLOWED_HOST: &str = "allowed-host";
pub const ARG_SECURITY_PATH: &str = "security-path";

pub const CMD_SERVER: &str = "server";
pub const CMD_SETUP: &str = "setup";
pub const CMD_RESET: &str = "reset";

fn server() -> Command {
    Command::new(CMD_SERVER)
        .about("Serve the panel API")
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8081")
                .env("PANELGATE_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_WEB_CONTEXT)
                .long("web-context")
                .help("Path the panel routes are mounted under")
                .default_value("/")
                .env("PANELGATE_WEB_CONTEXT"),
        )
}

fn setup() -> Command {
    Command::new(CMD_SETUP)
        .about("Store the host and path prefix the panel may be reached through")
        .arg(
            Arg::new(ARG_ALLOWED_HOST)
                .long("allowed-host")
                .help("Host the panel must be reached through, example: panel.example.com")
                .required(true),
        )
        .arg(
            Arg::new(ARG_SECURITY_PATH)
                .long("security-path")
                .help("Path prefix the panel must be reached under, example: /secure")
                .required(true),
        )
}

fn reset() -> Command {
    Command::new(CMD_RESET).about("Reset the default admin to a random username and password")
}

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("panelgate")
        .about("Panel authentication and access gate")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new(ARG_DSN)
                .short('d')
                .long("dsn")
                .help("Database connection string")
                .default_value("sqlite://panelgate.db")
                .env("PANELGATE_DSN")
                .global(true),
        )
        .subcommand(server())
        .subcommand(setup())
        .subcommand(reset());

    logging::with_args(command)
}
