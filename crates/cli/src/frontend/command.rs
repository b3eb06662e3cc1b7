use clap::{Arg, ArgAction, Command, builder::OsStringValueParser, value_parser};

/// Operand names in positional order.
pub(crate) const OPERANDS: [&str; 7] = [
    "source",
    "target",
    "output",
    "log-folder",
    "working-folder",
    "recompressed-target",
    "signing-command",
];

pub(crate) fn clap_command(program_name: &'static str) -> Command {
    let command = Command::new(program_name)
        .about("Build a verified binary patch between two archives.")
        .version(env!("CARGO_PKG_VERSION"))
        .disable_help_subcommand(true)
        .arg_required_else_help(false);
    let command = operands(command);
    options(command)
}

fn operands(mut command: Command) -> Command {
    let operands = [
        ("SOURCE", "Archive the device already has."),
        ("TARGET", "Archive the device should end up with."),
        ("OUTPUT", "Patch file to write."),
        ("LOG_FOLDER", "Folder for DiffBuilder.log and diagnostic documents."),
        ("WORKING_FOLDER", "Folder for intermediate state; reused when a build is resumed."),
        ("RECOMPRESSED_TARGET", "Recompress the target into this file first."),
        ("SIGNING_COMMAND", "Signing command passed to the recompression tool."),
    ];
    for (index, (name, (value_name, help))) in OPERANDS.iter().zip(operands).enumerate() {
        command = command.arg(
            Arg::new(*name)
                .value_name(value_name)
                .help(help)
                .index(index + 1)
                .value_parser(OsStringValueParser::new()),
        );
    }
    command
}

fn options(command: Command) -> Command {
    command
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("Read build settings from a JSON file; flags override it.")
                .num_args(1)
                .value_parser(OsStringValueParser::new()),
        )
        .arg(
            Arg::new("keep-working-folder")
                .long("keep-working-folder")
                .help("Leave the working folder in place after a successful build.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("not-diffable-threshold")
                .long("not-diffable-threshold")
                .value_name("BYTES")
                .help("Fail when more than BYTES of the target cannot be derived from the source.")
                .num_args(1)
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("no-target-recipes")
                .long("no-target-recipes")
                .help("Never rebuild target items from the target's own recipes.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("threads")
                .long("threads")
                .value_name("COUNT")
                .help("Worker threads for parallel stages.")
                .num_args(1)
                .value_parser(value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("bsdiff")
                .long("bsdiff")
                .value_name("PROGRAM")
                .help("Binary diff tool used for deltas.")
                .num_args(1)
                .value_parser(OsStringValueParser::new()),
        )
        .arg(
            Arg::new("bspatch")
                .long("bspatch")
                .value_name("PROGRAM")
                .help("Binary patch tool used to verify deltas.")
                .num_args(1)
                .value_parser(OsStringValueParser::new()),
        )
        .arg(
            Arg::new("recompress")
                .long("recompress")
                .value_name("PROGRAM")
                .help("Recompression tool for the recompressed target.")
                .num_args(1)
                .value_parser(OsStringValueParser::new()),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Log more; repeat for per-item detail.")
                .action(ArgAction::Count)
                .overrides_with("quiet"),
        )
        .arg(
            Arg::new("quiet")
                .long("quiet")
                .short('q')
                .help("Only log warnings and errors.")
                .action(ArgAction::SetTrue)
                .overrides_with("verbose"),
        )
        .arg(
            Arg::new("dump")
                .long("dump")
                .value_name("PATCH")
                .help("Print a JSON description of PATCH and exit.")
                .num_args(1)
                .value_parser(OsStringValueParser::new()),
        )
}
