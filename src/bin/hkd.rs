// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use house_keeper::{
    alias::{self, AliasRegistry, Answer, SystemHost},
    config::Settings,
    db::{
        self,
        pg_dump::{default_output_file, PgDumpRequest, DEFAULT_SCHEMA},
        pg_restore::PgRestoreRequest,
        Connection, DbType,
    },
    files::{
        checksum::ChecksumRequest,
        list::{list_files, ListOptions, OrderBy},
        rsync::{Direction, RsyncRequest},
    },
    gen,
    launch::{ExitCode, Launch, OutputSinks},
    path::{self, default_alias_file, default_settings_file},
    release::{self, BuildInfo},
    secret::env_password,
    tools::{resolve_tool, verify_tools, SystemToolbox, Toolbox},
};

use anyhow::Result;
use chrono::Local;
use clap::{ArgAction, Parser, Subcommand};
use std::{path::PathBuf, process::exit};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Seconds to wait before executing alias without confirmation.
const ALIAS_COUNTDOWN_SECS: u64 = 10;

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "hkd [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    async fn run(self, settings: Settings) -> Result<ExitCode> {
        match self.command {
            Command::Alias(opts) => run_alias(opts, settings).await,
            Command::Files(opts) => run_files(opts, settings).await,
            Command::Db(opts) => run_db(opts, settings).await,
            Command::Gen(opts) => run_gen(opts),
            Command::VerifyTools => Ok(run_verify_tools()),
            Command::Version => Ok(run_version()),
            Command::Update(opts) => run_update(opts).await,
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Execute registered alias, or list them all.
    #[command(
        name = "a",
        visible_alias = "alias",
        override_usage = "hkd a [options] [<alias>] [<args>]..."
    )]
    Alias(AliasOptions),

    /// Interact with files.
    #[command(override_usage = "hkd files [options] <files-command>")]
    Files(FilesOptions),

    /// Backup and restore databases.
    #[command(override_usage = "hkd db [options] <db-command>")]
    Db(DbOptions),

    /// Generate configuration snippets.
    #[command(override_usage = "hkd gen <gen-command>")]
    Gen(GenOptions),

    /// Check that required tools are installed.
    #[command(visible_alias = "verify", override_usage = "hkd verify-tools")]
    VerifyTools,

    /// Show binary version.
    #[command(visible_alias = "v", override_usage = "hkd version")]
    Version,

    /// Update house-keeper to latest or target version.
    #[command(visible_alias = "u", override_usage = "hkd update [<version>]")]
    Update(UpdateOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct AliasOptions {
    /// Skip confirmation, execute after a 10 second countdown.
    #[arg(long)]
    pub yes: bool,

    /// Alias to execute.
    #[arg(value_name = "alias")]
    pub alias: Option<String>,

    /// Extra arguments handed to alias.
    #[arg(value_name = "args", trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct FilesOptions {
    /// Directory to work in, defaults to current directory.
    #[arg(long, global = true, value_name = "dir")]
    pub working_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: FilesCommand,
}

#[derive(Debug, Clone, Subcommand)]
enum FilesCommand {
    /// List files and print them with absolute path.
    #[command(override_usage = "hkd files list [options]")]
    List(ListFilesOptions),

    /// Transfer files locally or remotely using rsync.
    #[command(override_usage = "hkd files rsync [options] <src> <dest>")]
    Rsync(RsyncOptions),

    /// Checksum files using sha1sum or shasum.
    #[command(
        visible_aliases = ["shasum", "sha1sum"],
        override_usage = "hkd files checksum [options] <file>..."
    )]
    Checksum(ChecksumOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ListFilesOptions {
    /// On error exit with code 0 and print nothing.
    #[arg(long)]
    pub silent: bool,

    /// Only keep files whose name contains text, can be repeated.
    #[arg(long, value_name = "text")]
    pub contains: Vec<String>,

    /// Order files by "name" or "date" (modification time).
    #[arg(long, value_name = "order", default_value = "name")]
    pub order_by: OrderBy,

    /// List files in descending order.
    #[arg(long)]
    pub desc: bool,

    /// Skip first N results.
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub skip: usize,

    /// Delete files in result.
    #[arg(long)]
    pub delete: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct RsyncOptions {
    /// Source file or directory, `host:path` for remote.
    #[arg(value_name = "src")]
    pub src: String,

    /// Destination file or directory, `host:path` for remote.
    #[arg(value_name = "dest")]
    pub dest: String,

    /// Confirm transfer from local to remote server.
    #[arg(long)]
    pub local_to_remote: bool,

    /// Confirm transfer from remote server to local.
    #[arg(long)]
    pub remote_to_local: bool,

    /// Confirm transfer from local to local.
    #[arg(long)]
    pub local_to_local: bool,

    /// Options passed to rsync, comma separated.
    #[arg(long, value_name = "options", value_delimiter = ',', allow_hyphen_values = true)]
    pub options: Option<Vec<String>>,

    /// Custom rsync file path.
    #[arg(long, value_name = "path")]
    pub tool_file: Option<String>,

    /// File holding password of remote server.
    #[arg(long, value_name = "path")]
    pub password_file: Option<String>,

    /// Connect to remote server without password.
    #[arg(long)]
    pub no_password: bool,

    /// Make sshpass match passphrase prompt instead of password prompt.
    #[arg(long)]
    pub passphrase: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ChecksumOptions {
    /// Files to checksum.
    #[arg(required = true, value_name = "file")]
    pub files: Vec<PathBuf>,

    /// Custom checksum tool file path.
    #[arg(long, value_name = "path")]
    pub tool_file: Option<String>,

    /// Append output to file.
    #[arg(long, value_name = "path")]
    pub output_file: Option<PathBuf>,

    /// Trust cached checksums, and cache new ones.
    #[arg(long)]
    pub cache_and_trust: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct DbOptions {
    /// Directory to work in, defaults to current directory.
    #[arg(long, global = true, value_name = "dir")]
    pub working_dir: Option<PathBuf>,

    /// Database type, only "postgres" is supported.
    #[arg(long = "type", global = true, value_name = "type", default_value = "postgres")]
    pub db_type: DbType,

    /// Database host.
    #[arg(long, global = true, value_name = "host")]
    pub host: Option<String>,

    /// Database port.
    #[arg(long, global = true, value_name = "port")]
    pub port: Option<u16>,

    /// Database name.
    #[arg(long, global = true, value_name = "name")]
    pub dbname: Option<String>,

    /// User name to connect with.
    #[arg(long, global = true, value_name = "user")]
    pub username: Option<String>,

    /// File holding database password.
    #[arg(long, global = true, value_name = "path")]
    pub password_file: Option<String>,

    #[command(subcommand)]
    pub command: DbCommand,
}

#[derive(Debug, Clone, Subcommand)]
enum DbCommand {
    /// Backup database using pg_dump.
    #[command(name = "pg_dump", override_usage = "hkd db pg_dump [options]")]
    PgDump(PgDumpOptions),

    /// Restore database using pg_restore.
    #[command(name = "pg_restore", override_usage = "hkd db pg_restore [options] <file>")]
    PgRestore(PgRestoreOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct PgDumpOptions {
    /// Name of dump file, defaults to db-YYYY-MM-DD.dump.
    #[arg(long, value_name = "name")]
    pub output_file: Option<String>,

    /// Schema to backup.
    #[arg(long, value_name = "schema", default_value = DEFAULT_SCHEMA)]
    pub schema: String,

    /// Custom pg_dump file path.
    #[arg(long, value_name = "path")]
    pub tool_file: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct PgRestoreOptions {
    /// Dump file to restore.
    #[arg(value_name = "file")]
    pub file: PathBuf,

    /// Custom pg_restore file path.
    #[arg(long, value_name = "path")]
    pub tool_file: Option<String>,

    /// Restore data only, requires --superuser.
    #[arg(long, value_name = "bool", default_value_t = true, action = ArgAction::Set)]
    pub data_only: bool,

    /// Superuser used to disable triggers during data-only restore.
    #[arg(long, value_name = "user")]
    pub superuser: Option<String>,

    /// Skip publications and subscriptions.
    #[arg(long, value_name = "bool", default_value_t = true, action = ArgAction::Set)]
    pub no_pub_sub: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct GenOptions {
    #[command(subcommand)]
    pub command: GenCommand,
}

#[derive(Debug, Clone, Subcommand)]
enum GenCommand {
    /// Generate sudoers config for user to manage a service.
    #[command(override_usage = "hkd gen visudo <service> [<user>]")]
    Visudo(VisudoOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct VisudoOptions {
    /// Service to manage.
    #[arg(value_name = "service")]
    pub service: String,

    /// User allowed to manage service, defaults to current user.
    #[arg(value_name = "user")]
    pub user: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct UpdateOptions {
    /// Version to install, e.g., v1.2.3.
    #[arg(value_name = "version")]
    pub version: Option<String>,
}

#[tokio::main]
async fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    match run().await {
        Ok(code) => exit(code.code()),
        Err(error) => {
            error!("{error:?}");
            exit(1);
        }
    }
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let settings = match default_settings_file() {
        Ok(path) => Settings::load(path)?,
        Err(err) => {
            debug!("{err}, using default settings");
            Settings::default()
        }
    };
    debug!("effective settings:\n{settings}");

    cli.run(settings).await
}

async fn run_alias(opts: AliasOptions, settings: Settings) -> Result<ExitCode> {
    let mut registry = AliasRegistry::new();
    registry.register_builtin(&SystemHost);

    let alias_file = match settings.alias_file {
        Some(path) => path,
        None => default_alias_file()?,
    };
    registry.load_file(&alias_file)?;

    let Some(name) = opts.alias else {
        print!("{}", registry.listing());
        println!();
        println!(
            "Custom aliases can be added to {} with format \"<alias><tab><command>\"",
            alias_file.display()
        );
        return Ok(ExitCode::SUCCESS);
    };

    let command = registry.resolve(&name, &opts.args)?.join(" ");
    if opts.yes {
        alias::countdown(&command, ALIAS_COUNTDOWN_SECS).await?;
    } else {
        match alias::confirm(&command)? {
            Answer::Yes => {}
            Answer::No => {
                println!("Aborted");
                return Ok(ExitCode::FAILURE);
            }
            Answer::Invalid(answer) => {
                error!("not a valid answer {answer:?}, expect y/yes or n/no");
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(alias::execute(&command).await)
}

async fn run_files(opts: FilesOptions, settings: Settings) -> Result<ExitCode> {
    match opts.command {
        FilesCommand::List(list) => run_list(list, opts.working_dir),
        FilesCommand::Rsync(rsync) => run_rsync(rsync, opts.working_dir, settings).await,
        FilesCommand::Checksum(checksum) => {
            run_checksum(checksum, opts.working_dir, settings).await
        }
    }
}

fn run_list(opts: ListFilesOptions, working_dir: Option<PathBuf>) -> Result<ExitCode> {
    let silent = opts.silent;
    let listing = path::working_dir(working_dir.as_deref())
        .map_err(anyhow::Error::from)
        .and_then(|dir| {
            let options = ListOptions {
                contains: opts.contains,
                order_by: opts.order_by,
                desc: opts.desc,
                skip: opts.skip,
                delete: opts.delete,
            };
            Ok(list_files(dir, &options)?)
        });

    match listing {
        Ok(files) => {
            for file in files {
                println!("{}", file.display());
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(err) if silent => {
            debug!("silenced: {err:?}");
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => Err(err),
    }
}

async fn run_rsync(
    opts: RsyncOptions,
    working_dir: Option<PathBuf>,
    settings: Settings,
) -> Result<ExitCode> {
    let confirmed = [
        (opts.local_to_local, Direction::LocalToLocal),
        (opts.local_to_remote, Direction::LocalToRemote),
        (opts.remote_to_local, Direction::RemoteToLocal),
    ]
    .into_iter()
    .filter_map(|(confirmed, direction)| confirmed.then_some(direction))
    .collect();

    let request = RsyncRequest {
        src: opts.src,
        dest: opts.dest,
        confirmed,
        options: opts
            .options
            .filter(|options| !options.is_empty())
            .unwrap_or(settings.rsync.options),
        tool: resolve_tool(opts.tool_file.as_deref(), "rsync")?,
        working_dir: path::working_dir(working_dir.as_deref())?,
        password_file: opts.password_file.as_deref().map(path::expand).transpose()?,
        no_password: opts.no_password,
        passphrase: opts.passphrase,
    };

    let launch = request.plan(&SystemToolbox, env_password)?;
    info!("launch {launch}");
    Ok(launch.run_captured(OutputSinks::new()).await)
}

async fn run_checksum(
    opts: ChecksumOptions,
    working_dir: Option<PathBuf>,
    settings: Settings,
) -> Result<ExitCode> {
    let tool = match (opts.tool_file, settings.checksum.tool) {
        (Some(custom), _) => resolve_tool(Some(custom.as_str()), "sha1sum")?,
        (None, Some(custom)) => {
            resolve_tool(Some(custom.to_string_lossy().as_ref()), "sha1sum")?
        }
        (None, None) => SystemToolbox.checksum_tool()?,
    };

    let request = ChecksumRequest {
        files: opts.files,
        tool,
        working_dir: path::working_dir(working_dir.as_deref())?,
        output_file: opts.output_file,
        cache_and_trust: opts.cache_and_trust,
    };

    Ok(request.run().await?)
}

async fn run_db(opts: DbOptions, settings: Settings) -> Result<ExitCode> {
    let DbType::Postgres = opts.db_type;
    let working_dir = path::working_dir(opts.working_dir.as_deref())?;
    let connection = Connection {
        host: opts.host.unwrap_or(settings.db.host),
        port: opts.port.unwrap_or(settings.db.port),
        dbname: opts.dbname.unwrap_or(settings.db.dbname),
        username: opts.username.unwrap_or(settings.db.username),
    };
    connection.validate()?;

    let password_file = opts.password_file.as_deref().map(path::expand).transpose()?;
    let env = db::password_env(password_file, &connection.username, env_password)?;

    match opts.command {
        DbCommand::PgDump(dump) => {
            let request = PgDumpRequest {
                connection,
                working_dir,
                output_file: dump
                    .output_file
                    .unwrap_or_else(|| default_output_file(Local::now().date_naive())),
                schema: dump.schema,
                tool: resolve_tool(dump.tool_file.as_deref(), "pg_dump")?,
            };
            Ok(request.plan(env)?.run().await)
        }
        DbCommand::PgRestore(restore) => {
            let request = PgRestoreRequest {
                connection,
                working_dir,
                input_file: restore.file,
                tool: resolve_tool(restore.tool_file.as_deref(), "pg_restore")?,
                data_only: restore.data_only,
                superuser: restore.superuser,
                no_pub_sub: restore.no_pub_sub,
            };
            Ok(request.plan(env)?.run().await)
        }
    }
}

fn run_gen(opts: GenOptions) -> Result<ExitCode> {
    match opts.command {
        GenCommand::Visudo(visudo) => {
            let user = match visudo.user {
                Some(user) => user,
                None => gen::current_user()?,
            };

            println!("Generating visudo config...");
            println!("Username: {user}");
            println!("Service : {}", visudo.service);
            println!();
            print!("{}", gen::visudo(&visudo.service, &user));
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn run_verify_tools() -> ExitCode {
    let report = verify_tools(&SystemToolbox);

    for tool in &report.missing_mandatory {
        error!("{tool} might not exist");
    }

    if !report.missing_optional.is_empty() {
        warn!("some optional tools might not exist");
        for (tool, hint) in &report.missing_optional {
            println!("- {tool}: {hint}");
        }
    }

    if !report.is_ok() {
        return ExitCode::FAILURE;
    }

    info!("all mandatory tools were installed");
    ExitCode::SUCCESS
}

fn run_version() -> ExitCode {
    println!("{}", BuildInfo::current());
    ExitCode::SUCCESS
}

async fn run_update(opts: UpdateOptions) -> Result<ExitCode> {
    let launch = release::update_launch(opts.version.as_deref())?;
    let code = launch.run_direct().await;
    if !code.is_success() {
        error!("exited with status code: {code}");
        return Ok(code);
    }

    println!("Updated {}", release::CRATE_NAME);
    println!("{} =>", BuildInfo::current().version);
    Ok(Launch::new("hkd").arg("version").run_direct().await)
}
