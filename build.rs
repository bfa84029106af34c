// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn build_cli() -> Command {
    Command::new("deb-installer")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Deb Installer Contributors")
        .about("Check and install local Debian packages against the system package database")
        .subcommand_required(false)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .global(true)
                .default_value("/etc/deb-installer/config.toml")
                .help("Configuration file"),
        )
        .arg(
            Arg::new("cache")
                .long("cache")
                .value_name("PATH")
                .global(true)
                .help("Index cache database (overrides the configuration)"),
        )
        .subcommand(
            Command::new("check")
                .about("Check whether package archives can be installed")
                .arg(
                    Arg::new("debs")
                        .required(true)
                        .num_args(1..)
                        .help("Paths to .deb files"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the report as JSON"),
                ),
        )
        .subcommand(
            Command::new("rdepends")
                .about("Show installed packages that depend on a package")
                .arg(Arg::new("package").required(true).help("Package name"))
                .arg(
                    Arg::new("arch")
                        .short('a')
                        .long("arch")
                        .help("Architecture (default: native)"),
                ),
        )
        .subcommand(
            Command::new("install")
                .about("Install package archives through the privileged helper")
                .arg(
                    Arg::new("debs")
                        .required(true)
                        .num_args(1..)
                        .help("Paths to .deb files"),
                ),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "elvish", "fish", "powershell", "zsh"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory
    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    // Generate main man page
    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    let man_path = man_dir.join("deb-installer.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");
}
