// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod logging;
mod runtime;

use anyhow::{Context, Result, anyhow};
use config::{Config, ServiceMode};
use ghgscope_app::{AppState, DataService, NavigationParams};
use ghgscope_client::Client;
use ghgscope_db::Store;
use ghgscope_tui::AppRuntime;
use runtime::{InlineRuntime, ThreadedRuntime};
use std::env;
use std::path::{Path, PathBuf};
use tracing::info;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `ghgscope --print-example-config` to generate a v1 template",
            options.config_path.display()
        )
    })?;

    let db_path = if options.demo {
        PathBuf::from(":memory:")
    } else {
        config.db_path()?
    };
    if options.print_db_path {
        println!("{}", db_path.display());
        return Ok(());
    }

    logging::init(config.log_level(), &config.log_file()?)?;

    let mode = if options.demo {
        ServiceMode::Local
    } else {
        config.service_mode()
    };
    info!(?mode, demo = options.demo, "starting ghgscope");

    match mode {
        ServiceMode::Local => {
            let store = open_store(&db_path, options.demo)?;
            if let Some(dest) = &options.export_all {
                let rows = store.export_all(dest)?;
                println!("exported {rows} rows to {}", dest.display());
                return Ok(());
            }
            let runtime = InlineRuntime::new(&store, config.export_dir());
            launch(&store, runtime, &options)
        }
        ServiceMode::Remote => {
            let client = Client::new(config.service_base_url(), config.service_timeout()?)
                .with_context(|| {
                    format!(
                        "invalid [service] config in {}; fix base_url/timeout values",
                        options.config_path.display()
                    )
                })?;
            if let Some(dest) = &options.export_all {
                let all = client.all_rows()?;
                let rows = ghgscope_db::write_csv(&all.rows, dest)?;
                println!("exported {rows} rows to {}", dest.display());
                return Ok(());
            }
            let runtime = ThreadedRuntime::new(client.clone(), config.export_dir());
            launch(&client, runtime, &options)
        }
    }
}

fn open_store(db_path: &Path, demo: bool) -> Result<Store> {
    let store = if demo {
        Store::open_memory()?
    } else {
        Store::open(db_path).with_context(|| {
            format!(
                "open database {} -- if this path is wrong, set [storage].db_path or GHGSCOPE_DB_PATH",
                db_path.display()
            )
        })?
    };
    store.bootstrap()?;
    if demo {
        let dataset = ghgscope_testkit::demo_dataset();
        store.seed(&dataset.records, &dataset.references)?;
        store.create_user(
            ghgscope_testkit::DEMO_USERNAME,
            ghgscope_testkit::DEMO_PASSWORD,
            true,
        )?;
    }
    Ok(store)
}

fn launch<R: AppRuntime>(
    service: &dyn DataService,
    mut runtime: R,
    options: &CliOptions,
) -> Result<()> {
    if options.check_only {
        service
            .filter_options()
            .map_err(|error| anyhow!("startup check failed: {error}"))?;
        return Ok(());
    }

    let restore = options.view.as_deref().map(NavigationParams::parse);
    let mut state = AppState::load(service);
    ghgscope_tui::run_app(&mut state, &mut runtime, restore.as_ref())
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_db_path: bool,
    demo: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
    view: Option<String>,
    export_all: Option<PathBuf>,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_db_path: false,
        demo: false,
        print_example: false,
        check_only: false,
        show_help: false,
        view: None,
        export_all: None,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-path" => {
                options.print_db_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--demo" => {
                options.demo = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--view" => {
                let value = iter.next().ok_or_else(|| {
                    anyhow!("--view requires a query string, for example \"page=2&sector=Energy\"")
                })?;
                options.view = Some(value.as_ref().to_owned());
            }
            "--export-all" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--export-all requires a destination CSV path"))?;
                options.export_all = Some(PathBuf::from(value.as_ref()));
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("ghgscope - emissions data explorer");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-path             Print resolved database path");
    println!("  --print-example-config   Print a v1 config template");
    println!("  --demo                   Launch with seeded demo data (in-memory, admin/admin)");
    println!("  --check                  Validate config + data service and exit");
    println!("  --view <query>           Restore page and filters, e.g. \"page=2&sector=Energy\"");
    println!("  --export-all <path>      Write every row as CSV and exit");
    println!("  --help                   Show this help");
}
