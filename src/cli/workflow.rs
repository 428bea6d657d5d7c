//! Command implementations: wire config, context, graph, and watcher
//! together and map outcomes to exit codes.

use std::env;
use std::path::{Path, PathBuf};

use super::{Cli, Commands, EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};
use crate::config::{self, CliOverrides, ConfigError};
use crate::context::BuildContext;
use crate::graph::{run_task, TaskGraph};
use crate::mode::ModeContext;
use crate::stages;
use crate::watch;

pub fn dispatch(cli: Cli) -> u8 {
    let forced_prod = matches!(cli.command, Commands::Start { .. } | Commands::Deploy { .. });
    let mode = ModeContext::from_flags(cli.production || forced_prod, cli.prod);

    let overrides = match &cli.command {
        Commands::Serve { port, open } | Commands::Start { port, open } => CliOverrides {
            port: *port,
            open: if *open { Some(true) } else { None },
            deploy_target: None,
        },
        Commands::Deploy { target } => CliOverrides {
            port: None,
            open: None,
            deploy_target: target.clone(),
        },
        _ => CliOverrides::default(),
    };

    let ctx = match build_context(&cli, mode, &overrides) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error: {}", e);
            return match e {
                ConfigError::Validation(_) => EXIT_INVALID_ARGS,
                _ => EXIT_ERROR,
            };
        }
    };
    let graph = stages::default_graph();

    match cli.command {
        Commands::Lint => run_and_report(&graph, "lint", &ctx),
        Commands::Compile => run_and_report(&graph, "compile", &ctx),
        Commands::Build => run_and_report(&graph, "build", &ctx),
        Commands::Clean => run_and_report(&graph, "clean", &ctx),
        Commands::Deploy { .. } => run_and_report(&graph, "deploy", &ctx),
        Commands::Serve { .. } => serve_session(&graph, &ctx, "serve", true),
        Commands::Start { .. } => serve_session(&graph, &ctx, "start", false),
    }
}

fn build_context(
    cli: &Cli,
    mode: ModeContext,
    overrides: &CliOverrides,
) -> Result<BuildContext, ConfigError> {
    let config_path = match &cli.config {
        Some(path) => Some(path.clone()),
        None => config::find_config(),
    };

    let mut config = config::load_config(config_path.as_deref())?;
    config::merge_cli_overrides(&mut config, overrides);

    let project_root = config_path
        .as_deref()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .filter(|p| !p.as_os_str().is_empty())
        .or_else(|| env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    Ok(BuildContext::new(config, project_root, mode).with_verbose(cli.verbose))
}

fn run_and_report(graph: &TaskGraph, workflow: &str, ctx: &BuildContext) -> u8 {
    match run_task(graph, workflow, ctx) {
        Ok(report) => {
            print!("{}", report.summary());
            if report.success() {
                EXIT_SUCCESS
            } else {
                EXIT_ERROR
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            EXIT_ERROR
        }
    }
}

/// Build, bring up the dev server, and either watch for changes (serve)
/// or park until interrupted (start).
fn serve_session(graph: &TaskGraph, ctx: &BuildContext, workflow: &str, watch_src: bool) -> u8 {
    let code = run_and_report(graph, workflow, ctx);
    if code != EXIT_SUCCESS {
        return code;
    }

    let handle = match ctx.toolchain.dev_server.serve(
        &ctx.dist_dir(),
        ctx.config.serve.port,
        ctx.config.serve.open,
    ) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_ERROR;
        }
    };

    if watch_src {
        let rules = watch::default_rules(&ctx.config.project.src, &ctx.config.project.public);
        if let Err(e) = watch::watch(graph, ctx, &rules, Some(handle.as_ref())) {
            eprintln!("Error: {}", e);
            return EXIT_ERROR;
        }
    } else {
        // The server runs until the process is interrupted.
        loop {
            std::thread::park();
        }
    }
    EXIT_SUCCESS
}
