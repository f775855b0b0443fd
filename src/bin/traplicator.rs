use std::env;
use std::process;

use getopts::Options;
use log::warn;

use traplicator::config::{self, Config};
use traplicator::logs::{self, Sink, CONTROL_LOG_FILE};
use traplicator::phy::RawSocket;
use traplicator::server::{Pipeline, Server};
use traplicator::transmit::Transmitter;

fn main() {
    process::exit(run());
}

fn run() -> i32 {
    let args: Vec<String> = env::args().collect();
    let brief = format!("Usage: {} [options]", args[0]);

    let mut opts = Options::new();
    opts.optopt("c", "conf-path", "configuration file or directory", "PATH");
    opts.optflag("h", "help", "print this help menu");
    let matches = match opts.parse(&args[1..]) {
        Ok(matches) => matches,
        Err(err) => {
            eprintln!("{err}");
            eprint!("{}", opts.usage(&brief));
            return 2;
        }
    };
    if matches.opt_present("h") {
        print!("{}", opts.usage(&brief));
        return 0;
    }

    let conf_path = config::resolve_conf_path(matches.opt_str("c").as_deref());

    // Records written before the configured sinks exist go to the
    // default control log in the working directory.
    let bootstrap_log = Sink::new(CONTROL_LOG_FILE);

    if !conf_path.exists() {
        bootstrap_log.append(["No config file found. Generating config with default values"]);
        if let Err(err) = config::generate(&conf_path) {
            logs::fatal(
                &bootstrap_log,
                &format!("unable to write {}: {err}", conf_path.display()),
            );
            return 1;
        }
        bootstrap_log.append(["Config file successfully created", "Exiting"]);
        return 0;
    }

    match config::load(&conf_path) {
        Ok(config) => serve(config, &bootstrap_log),
        Err(err) => {
            logs::fatal(&bootstrap_log, &format!("unable to parse config file: {err:#}"));
            1
        }
    }
}

fn serve(config: Config, bootstrap_log: &Sink) -> i32 {
    let Config {
        settings,
        rules,
        notices,
    } = config;

    let (control_log, data_log) = Sink::pair(&settings.log_path, &settings.data_log_path);
    if let Err(err) = logs::init(control_log.clone()) {
        logs::fatal(bootstrap_log, &format!("unable to install logger: {err}"));
        return 1;
    }

    control_log.append([
        "------------------------",
        "Initialising traplicator",
        "------------------------",
    ]);
    for notice in &notices {
        warn!("{notice}");
    }

    if settings.spoof_src {
        // Fail now, loudly, rather than on the first trap.
        if let Err(err) = RawSocket::open() {
            logs::fatal(
                &control_log,
                &format!("source spoofing requires a raw socket (CAP_NET_RAW): {err}"),
            );
            return 1;
        }
    }

    let mut banner = vec![format!("Running traplicator on port {}", settings.listen_port)];
    if settings.log_traps {
        banner.push("---Logging snmp trap contents---".to_string());
    }
    if settings.spoof_src {
        banner.push("---Spoofing source addresses---".to_string());
    }
    banner.push("Forwarding rules".to_string());
    banner.push("----------------".to_string());
    banner.extend(rules.iter().map(ToString::to_string));

    let pipeline = Pipeline {
        rules,
        transmitter: Transmitter::new(settings.spoof_src),
        data_log,
        log_traps: settings.log_traps,
        log_bytes: settings.log_bytes,
    };
    let server = match Server::bind(settings.listen_port, pipeline) {
        Ok(server) => server,
        Err(err) => {
            logs::fatal(
                &control_log,
                &format!(
                    "could not bind socket to port {}: {err}",
                    settings.listen_port
                ),
            );
            return 1;
        }
    };

    let terminating = control_log.clone();
    if let Err(err) = ctrlc::set_handler(move || {
        terminating.append([
            "-----------------------",
            "Terminating traplicator",
            "-----------------------",
        ]);
        process::exit(0);
    }) {
        logs::fatal(&control_log, &format!("unable to install signal handler: {err}"));
        return 1;
    }

    control_log.append(&banner);

    match server.run() {
        Ok(()) => 0,
        Err(err) => {
            logs::fatal(&control_log, &format!("{err:#}"));
            1
        }
    }
}
